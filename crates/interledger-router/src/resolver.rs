use std::sync::Arc;

use interledger_packet::{Address, AddressPrefix};
use interledger_service::{AccountId, StaticRoute};
use parking_lot::RwLock;

/// Maps a destination address to the account packets for it should be
/// forwarded to.
pub trait RouteResolver: Send + Sync {
    fn resolve(&self, destination: &Address) -> Option<AccountId>;
}

impl<R: RouteResolver + ?Sized> RouteResolver for Arc<R> {
    fn resolve(&self, destination: &Address) -> Option<AccountId> {
        (**self).resolve(destination)
    }
}

/// Operator-configured routes. The most specific matching prefix wins.
#[derive(Clone, Debug, Default)]
pub struct StaticRoutingTable {
    routes: Arc<RwLock<Vec<StaticRoute>>>,
}

impl StaticRoutingTable {
    pub fn new<I: IntoIterator<Item = StaticRoute>>(routes: I) -> Self {
        let table = StaticRoutingTable::default();
        for route in routes {
            table.add_route(route);
        }
        table
    }

    /// Adds a route, replacing any existing route for the same prefix.
    pub fn add_route(&self, route: StaticRoute) {
        let mut routes = self.routes.write();
        routes.retain(|existing| existing.target_prefix != route.target_prefix);
        routes.push(route);
    }

    pub fn remove_route(&self, target_prefix: &AddressPrefix) -> Option<StaticRoute> {
        let mut routes = self.routes.write();
        let index = routes
            .iter()
            .position(|route| &route.target_prefix == target_prefix)?;
        Some(routes.remove(index))
    }

    pub fn routes(&self) -> Vec<StaticRoute> {
        self.routes.read().clone()
    }
}

impl RouteResolver for StaticRoutingTable {
    fn resolve(&self, destination: &Address) -> Option<AccountId> {
        self.routes
            .read()
            .iter()
            .filter(|route| route.target_prefix.matches(destination))
            .max_by_key(|route| route.target_prefix.depth())
            .map(|route| route.peer_account_id.clone())
    }
}
