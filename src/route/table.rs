//! Atomically swapped route-table snapshots.
//!
//! The table holds an immutable, priority-sorted snapshot behind an
//! [`ArcSwap`]. Readers load the snapshot once per matching pass and never
//! re-read mid-pass, so a concurrent swap is invisible to in-flight
//! requests: they see either the old table or the new one as a whole, never
//! a mix.

use super::Route;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::info;

/// Supplier of the ordered route table.
pub trait RouteLocator: Send + Sync {
    /// One immutable snapshot of the ordered route table.
    fn routes(&self) -> Arc<Vec<Arc<Route>>>;
}

/// Route table with atomic whole-table replacement.
#[derive(Debug)]
pub struct RouteTable {
    routes: ArcSwap<Vec<Arc<Route>>>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes: ArcSwap::from_pointee(Self::sorted(routes)),
        }
    }

    /// Replace the whole table. In-flight matching passes keep the snapshot
    /// they started with.
    pub fn swap(&self, routes: Vec<Route>) {
        let sorted = Self::sorted(routes);
        info!(routes = sorted.len(), "route table swapped");
        self.routes.store(Arc::new(sorted));
    }

    fn sorted(routes: Vec<Route>) -> Vec<Arc<Route>> {
        let mut routes: Vec<Arc<Route>> = routes.into_iter().map(Arc::new).collect();
        // Stable: equal orders keep their declaration order.
        routes.sort_by_key(|route| route.order());
        routes
    }
}

impl RouteLocator for RouteTable {
    fn routes(&self) -> Arc<Vec<Arc<Route>>> {
        self.routes.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::RoutePredicate;
    use crate::types::RouteId;

    fn route(id: &str, order: i32) -> Route {
        Route::builder(RouteId::try_new(id.to_string()).expect("non-empty id"))
            .order(order)
            .predicate(RoutePredicate::from_fn("always", |_| Ok(true)))
            .build()
            .expect("valid route")
    }

    #[test]
    fn table_sorts_by_route_order_with_stable_ties() {
        let table = RouteTable::new(vec![
            route("third", 20),
            route("first", 1),
            route("second-a", 10),
            route("second-b", 10),
        ]);

        let ids: Vec<String> = table
            .routes()
            .iter()
            .map(|route| route.id().to_string())
            .collect();
        assert_eq!(ids, vec!["first", "second-a", "second-b", "third"]);
    }

    #[test]
    fn swap_replaces_the_whole_snapshot() {
        let table = RouteTable::new(vec![route("old", 0)]);
        let before = table.routes();

        table.swap(vec![route("new", 0)]);
        let after = table.routes();

        assert_eq!(before[0].id().to_string(), "old");
        assert_eq!(after[0].id().to_string(), "new");
        // The old snapshot is still intact for any pass that started on it.
        assert_eq!(before.len(), 1);
    }
}
