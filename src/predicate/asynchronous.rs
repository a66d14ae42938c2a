//! Non-blocking predicate evaluation.
//!
//! An [`AsyncPredicate`] evaluates to a deferred boolean so matching never
//! blocks the event loop, even when a leaf needs I/O (a remote lookup, a
//! token introspection call). Synchronous predicates are wrapped for uniform
//! composition.
//!
//! Combinators preserve short-circuit semantics deterministically: operands
//! are evaluated in tree position order, left to right, and the right
//! operand's future is never constructed when the left result already
//! decides the outcome, regardless of which side's I/O would have finished
//! first.

use super::{Predicate, RoutePredicate};
use crate::error::PredicateError;
use crate::exchange::Exchange;
use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// An asynchronous leaf reads what it needs from the exchange synchronously
/// and returns an owned future for the I/O part.
type AsyncEval =
    dyn Fn(&Exchange) -> BoxFuture<'static, Result<bool, PredicateError>> + Send + Sync;

/// A composable asynchronous match condition.
#[derive(Clone)]
pub struct AsyncPredicate {
    kind: Arc<Kind>,
}

enum Kind {
    Sync(RoutePredicate),
    Leaf { name: String, eval: Box<AsyncEval> },
    And(AsyncPredicate, AsyncPredicate),
    Or(AsyncPredicate, AsyncPredicate),
    Not(AsyncPredicate),
}

impl AsyncPredicate {
    /// Lift a synchronous predicate into the async model.
    pub fn from_sync(predicate: RoutePredicate) -> Self {
        Self {
            kind: Arc::new(Kind::Sync(predicate)),
        }
    }

    /// Lift a plain predicate value into the async model.
    pub fn of(predicate: impl Predicate + 'static) -> Self {
        Self::from_sync(RoutePredicate::new(predicate))
    }

    /// Build an inherently asynchronous leaf. The closure runs on every
    /// evaluation: it reads request attributes synchronously and returns the
    /// deferred part. The name is used in debug output.
    pub fn from_fn<F, Fut>(name: impl Into<String>, eval: F) -> Self
    where
        F: Fn(&Exchange) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, PredicateError>> + Send + 'static,
    {
        let eval = Box::new(
            move |exchange: &Exchange| -> BoxFuture<'static, Result<bool, PredicateError>> {
                Box::pin(eval(exchange))
            },
        );
        Self {
            kind: Arc::new(Kind::Leaf {
                name: name.into(),
                eval,
            }),
        }
    }

    /// Evaluate against an exchange, yielding a deferred boolean.
    pub fn apply<'a>(
        &'a self,
        exchange: &'a Exchange,
    ) -> BoxFuture<'a, Result<bool, PredicateError>> {
        Box::pin(async move {
            match self.kind.as_ref() {
                Kind::Sync(predicate) => predicate.apply(exchange),
                Kind::Leaf { eval, .. } => eval(exchange).await,
                Kind::And(left, right) => {
                    if left.apply(exchange).await? {
                        right.apply(exchange).await
                    } else {
                        Ok(false)
                    }
                }
                Kind::Or(left, right) => {
                    if left.apply(exchange).await? {
                        Ok(true)
                    } else {
                        right.apply(exchange).await
                    }
                }
                Kind::Not(inner) => Ok(!inner.apply(exchange).await?),
            }
        })
    }

    /// Both this predicate and `other`, evaluated left to right with
    /// short-circuit on false.
    pub fn and(&self, other: &AsyncPredicate) -> AsyncPredicate {
        Self {
            kind: Arc::new(Kind::And(self.clone(), other.clone())),
        }
    }

    /// This predicate or `other`, evaluated left to right with
    /// short-circuit on true.
    pub fn or(&self, other: &AsyncPredicate) -> AsyncPredicate {
        Self {
            kind: Arc::new(Kind::Or(self.clone(), other.clone())),
        }
    }

    /// The logical inverse of this predicate.
    pub fn negate(&self) -> AsyncPredicate {
        Self {
            kind: Arc::new(Kind::Not(self.clone())),
        }
    }
}

impl From<RoutePredicate> for AsyncPredicate {
    fn from(predicate: RoutePredicate) -> Self {
        Self::from_sync(predicate)
    }
}

impl fmt::Debug for AsyncPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.as_ref() {
            Kind::Sync(predicate) => write!(f, "{predicate:?}"),
            Kind::Leaf { name, .. } => write!(f, "AsyncPredicate({name})"),
            Kind::And(left, right) => f.debug_tuple("And").field(left).field(right).finish(),
            Kind::Or(left, right) => f.debug_tuple("Or").field(left).field(right).finish(),
            Kind::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
        }
    }
}
