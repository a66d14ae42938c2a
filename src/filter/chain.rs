//! Indexed execution of a composed filter chain.
//!
//! The chain is an ephemeral cursor over the sorted filter list for one
//! request: invoking it at index `i` invokes filter `i` with a view advanced
//! to `i + 1`. The call/return structure enforces the phase symmetry
//! (pre-phase ascending, post-phase in exact reverse) without any separate
//! bookkeeping.

use super::{GatewayFilter, OrderedGatewayFilter};
use crate::error::{GatewayError, GatewayResult};
use crate::exchange::Exchange;
use tracing::trace;

/// Cursor over the composed filter list for one in-flight request. Never
/// shared across requests.
#[derive(Clone, Copy, Debug)]
pub struct FilterChain<'a> {
    filters: &'a [&'a OrderedGatewayFilter],
    index: usize,
}

impl<'a> FilterChain<'a> {
    pub fn new(filters: &'a [&'a OrderedGatewayFilter]) -> Self {
        Self { filters, index: 0 }
    }

    /// Invoke the filter at the cursor, handing it a chain advanced by one.
    ///
    /// Running past the end of the list is a configuration defect: a
    /// correctly composed chain ends in a terminal dispatch filter or a
    /// short-circuit before that.
    pub async fn next(self, exchange: &mut Exchange) -> GatewayResult<()> {
        if exchange.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }
        match self.filters.get(self.index) {
            Some(entry) => {
                trace!(index = self.index, order = %entry.order(), "invoking filter");
                let advanced = Self {
                    filters: self.filters,
                    index: self.index + 1,
                };
                entry.filter(exchange, advanced).await
            }
            None => Err(GatewayError::ChainExhausted { index: self.index }),
        }
    }
}

/// Merge global and route filters into one deterministically ordered list:
/// ascending by order, ties broken by discovery order (globals first, then
/// route filters), terminal dispatch always last.
pub(crate) fn compose<'a>(
    global: &'a [OrderedGatewayFilter],
    route: &'a [OrderedGatewayFilter],
    terminal: &'a OrderedGatewayFilter,
) -> Vec<&'a OrderedGatewayFilter> {
    let mut merged: Vec<&OrderedGatewayFilter> = global.iter().chain(route.iter()).collect();
    merged.sort_by_key(|entry| entry.order());
    merged.push(terminal);
    merged
}
