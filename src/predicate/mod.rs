//! Boolean match conditions over an exchange.
//!
//! A [`Predicate`] is a pure test of one request attribute. Predicates
//! compose with [`RoutePredicate::and`], [`RoutePredicate::or`], and
//! [`RoutePredicate::negate`]; composition is persistent: each combinator
//! returns a new predicate sharing the originals, so a predicate tree can be
//! reused across routes and is never mutated after construction.
//!
//! `AND` and `OR` short-circuit: the right operand is not evaluated when the
//! left result already determines the outcome. Evaluation failures propagate
//! as [`PredicateError`] rather than being folded into `false` here; the
//! route matcher decides how to recover.

pub mod asynchronous;
pub mod builtin;

pub use asynchronous::AsyncPredicate;

use crate::error::PredicateError;
use crate::exchange::Exchange;
use std::fmt;
use std::sync::Arc;

/// A boolean test over a request's attributes.
pub trait Predicate: fmt::Debug + Send + Sync {
    fn apply(&self, exchange: &Exchange) -> Result<bool, PredicateError>;
}

/// A shareable, composable predicate handle.
#[derive(Clone, Debug)]
pub struct RoutePredicate {
    inner: Arc<dyn Predicate>,
}

impl RoutePredicate {
    pub fn new(predicate: impl Predicate + 'static) -> Self {
        Self {
            inner: Arc::new(predicate),
        }
    }

    /// Build a predicate from a closure. The name is used in debug output.
    pub fn from_fn<F>(name: impl Into<String>, eval: F) -> Self
    where
        F: Fn(&Exchange) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        Self::new(FnPredicate {
            name: name.into(),
            eval,
        })
    }

    pub fn apply(&self, exchange: &Exchange) -> Result<bool, PredicateError> {
        self.inner.apply(exchange)
    }

    /// Both this predicate and `other`. `other` is not evaluated when this
    /// predicate yields false.
    pub fn and(&self, other: &RoutePredicate) -> RoutePredicate {
        Self::new(AndPredicate {
            left: self.clone(),
            right: other.clone(),
        })
    }

    /// This predicate or `other`. `other` is not evaluated when this
    /// predicate yields true.
    pub fn or(&self, other: &RoutePredicate) -> RoutePredicate {
        Self::new(OrPredicate {
            left: self.clone(),
            right: other.clone(),
        })
    }

    /// The logical inverse of this predicate.
    pub fn negate(&self) -> RoutePredicate {
        Self::new(NotPredicate {
            inner: self.clone(),
        })
    }
}

#[derive(Debug)]
struct AndPredicate {
    left: RoutePredicate,
    right: RoutePredicate,
}

impl Predicate for AndPredicate {
    fn apply(&self, exchange: &Exchange) -> Result<bool, PredicateError> {
        Ok(self.left.apply(exchange)? && self.right.apply(exchange)?)
    }
}

#[derive(Debug)]
struct OrPredicate {
    left: RoutePredicate,
    right: RoutePredicate,
}

impl Predicate for OrPredicate {
    fn apply(&self, exchange: &Exchange) -> Result<bool, PredicateError> {
        if self.left.apply(exchange)? {
            Ok(true)
        } else {
            self.right.apply(exchange)
        }
    }
}

#[derive(Debug)]
struct NotPredicate {
    inner: RoutePredicate,
}

impl Predicate for NotPredicate {
    fn apply(&self, exchange: &Exchange) -> Result<bool, PredicateError> {
        Ok(!self.inner.apply(exchange)?)
    }
}

struct FnPredicate<F> {
    name: String,
    eval: F,
}

impl<F> fmt::Debug for FnPredicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.name)
    }
}

impl<F> Predicate for FnPredicate<F>
where
    F: Fn(&Exchange) -> Result<bool, PredicateError> + Send + Sync,
{
    fn apply(&self, exchange: &Exchange) -> Result<bool, PredicateError> {
        (self.eval)(exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn exchange() -> Exchange {
        Exchange::new(Method::GET, "/".parse().expect("valid uri"), HeaderMap::new())
    }

    fn constant(value: bool) -> RoutePredicate {
        RoutePredicate::from_fn(format!("const({value})"), move |_| Ok(value))
    }

    fn counting(value: bool, counter: Arc<AtomicUsize>) -> RoutePredicate {
        RoutePredicate::from_fn("counting", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        })
    }

    #[test]
    fn and_matches_boolean_conjunction() {
        let exchange = exchange();
        for (left, right) in [(false, false), (false, true), (true, false), (true, true)] {
            let combined = constant(left).and(&constant(right));
            assert_eq!(combined.apply(&exchange).expect("no error"), left && right);
        }
    }

    #[test]
    fn or_matches_boolean_disjunction() {
        let exchange = exchange();
        for (left, right) in [(false, false), (false, true), (true, false), (true, true)] {
            let combined = constant(left).or(&constant(right));
            assert_eq!(combined.apply(&exchange).expect("no error"), left || right);
        }
    }

    #[test]
    fn and_skips_right_operand_when_left_is_false() {
        let exchange = exchange();
        let evaluations = Arc::new(AtomicUsize::new(0));
        let combined = constant(false).and(&counting(true, Arc::clone(&evaluations)));

        assert!(!combined.apply(&exchange).expect("no error"));
        assert_eq!(evaluations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn or_skips_right_operand_when_left_is_true() {
        let exchange = exchange();
        let evaluations = Arc::new(AtomicUsize::new(0));
        let combined = constant(true).or(&counting(false, Arc::clone(&evaluations)));

        assert!(combined.apply(&exchange).expect("no error"));
        assert_eq!(evaluations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn double_negation_restores_the_original() {
        let exchange = exchange();
        for value in [false, true] {
            let predicate = constant(value);
            assert_eq!(
                predicate.negate().negate().apply(&exchange).expect("no error"),
                predicate.apply(&exchange).expect("no error"),
            );
        }
    }

    #[test]
    fn composition_leaves_originals_untouched() {
        let exchange = exchange();
        let left = constant(true);
        let right = constant(false);
        let _combined = left.and(&right);

        // Originals still evaluate on their own.
        assert!(left.apply(&exchange).expect("no error"));
        assert!(!right.apply(&exchange).expect("no error"));
    }

    #[test]
    fn failure_propagates_out_of_combinators() {
        let exchange = exchange();
        let failing = RoutePredicate::from_fn("failing", |_| {
            Err(PredicateError::LookupFailed("remote unavailable".to_string()))
        });
        let combined = constant(true).and(&failing);
        assert!(combined.apply(&exchange).is_err());
    }
}
