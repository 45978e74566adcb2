use std::collections::HashMap;
use std::fmt;

use interledger_packet::{Address, AddressPrefix};
use interledger_router::RouteResolver;
use interledger_service::AccountId;
use parking_lot::RwLock;
use ring::{digest, hmac};
use tracing::{debug, trace};
use uuid::Uuid;

/// Identifies one incarnation of a routing table. A new id is generated
/// whenever the table is reset, telling peers to resync from epoch 0.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutingTableId(Uuid);

impl RoutingTableId {
    pub fn random() -> Self {
        RoutingTableId(Uuid::new_v4())
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        RoutingTableId(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for RoutingTableId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RoutingTableId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RoutingTableId({})", self)
    }
}

/// An entry in the forwarding table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub prefix: AddressPrefix,
    pub next_hop_account_id: AccountId,
    /// Opaque tag proving where the route came from.
    pub auth: [u8; 32],
    /// Connectors the route was announced through, nearest last.
    pub path: Vec<Address>,
}

impl Route {
    /// A route to one of this node's own accounts. The auth tag is an HMAC of
    /// the prefix under the node's routing secret.
    pub fn local(prefix: AddressPrefix, next_hop_account_id: AccountId, secret: &hmac::Key) -> Self {
        let tag = hmac::sign(secret, prefix.as_str().as_bytes());
        let mut auth = [0; 32];
        auth.copy_from_slice(tag.as_ref());
        Route {
            prefix,
            next_hop_account_id,
            auth,
            path: Vec::new(),
        }
    }

    /// The auth tag to use when re-announcing a route learned from a peer.
    pub fn rehash_auth(auth: &[u8; 32]) -> [u8; 32] {
        let mut rehashed = [0; 32];
        rehashed.copy_from_slice(digest::digest(&digest::SHA256, auth).as_ref());
        rehashed
    }
}

/// One entry of the epoch log: the route that became active for `prefix` at
/// `epoch`, or `None` if the prefix was withdrawn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteUpdate {
    pub epoch: u32,
    pub prefix: AddressPrefix,
    pub route: Option<Route>,
}

struct TableState {
    id: RoutingTableId,
    routes: HashMap<AddressPrefix, Route>,
    log: Vec<RouteUpdate>,
}

impl TableState {
    fn new() -> Self {
        TableState {
            id: RoutingTableId::random(),
            routes: HashMap::new(),
            log: Vec::new(),
        }
    }

    fn current_epoch(&self) -> u32 {
        self.log.len() as u32
    }

    fn append(&mut self, prefix: AddressPrefix, route: Option<Route>) {
        let epoch = self.current_epoch();
        trace!("Routing table {} epoch {}: {} -> {:?}", self.id, epoch, prefix, route);
        self.log.push(RouteUpdate {
            epoch,
            prefix,
            route,
        });
    }
}

/// # Forwarding Routing Table
///
/// The node's routes keyed by prefix, plus an append-only log of every
/// change. Each change consumes one epoch: the update recorded at epoch `n`
/// is the `n`th change since the table was created or last reset, and
/// [`current_epoch`](ForwardingRoutingTable::current_epoch) is the number of
/// changes so far.
///
/// Route changes and their log entries are written under one lock, so no
/// reader sees one without the other.
pub struct ForwardingRoutingTable {
    state: RwLock<TableState>,
}

impl Default for ForwardingRoutingTable {
    fn default() -> Self {
        ForwardingRoutingTable::new()
    }
}

impl ForwardingRoutingTable {
    pub fn new() -> Self {
        ForwardingRoutingTable {
            state: RwLock::new(TableState::new()),
        }
    }

    pub fn routing_table_id(&self) -> RoutingTableId {
        self.state.read().id
    }

    pub fn current_epoch(&self) -> u32 {
        self.state.read().current_epoch()
    }

    /// Log entries with epochs in `[from_epoch, from_epoch + max_count)`.
    /// May return fewer than `max_count` entries.
    pub fn partial_route_log(&self, from_epoch: u32, max_count: u32) -> Vec<RouteUpdate> {
        let state = self.state.read();
        let start = (from_epoch as usize).min(state.log.len());
        let end = start
            .saturating_add(max_count as usize)
            .min(state.log.len());
        state.log[start..end].to_vec()
    }

    /// Adds or replaces the route for `route.prefix`. Returns false, and uses
    /// no epoch, if the identical route is already present.
    pub fn set_route(&self, route: Route) -> bool {
        let mut state = self.state.write();
        if state.routes.get(&route.prefix) == Some(&route) {
            return false;
        }
        debug!(
            "Setting route for {} via {}",
            route.prefix, route.next_hop_account_id
        );
        state.routes.insert(route.prefix.clone(), route.clone());
        state.append(route.prefix.clone(), Some(route));
        true
    }

    /// Removes the route for `prefix`, recording the withdrawal.
    pub fn withdraw_route(&self, prefix: &AddressPrefix) -> Option<Route> {
        let mut state = self.state.write();
        let removed = state.routes.remove(prefix)?;
        debug!("Withdrawing route for {}", prefix);
        state.append(prefix.clone(), None);
        Some(removed)
    }

    /// Withdraws every route whose next hop is `account_id`.
    pub fn withdraw_routes_via(&self, account_id: &AccountId) -> Vec<AddressPrefix> {
        let mut state = self.state.write();
        let mut prefixes: Vec<AddressPrefix> = state
            .routes
            .values()
            .filter(|route| &route.next_hop_account_id == account_id)
            .map(|route| route.prefix.clone())
            .collect();
        prefixes.sort();
        for prefix in prefixes.iter() {
            state.routes.remove(prefix);
            state.append(prefix.clone(), None);
        }
        prefixes
    }

    /// Drops every route and the log, and starts over under a new id.
    pub fn reset(&self) {
        let mut state = self.state.write();
        *state = TableState::new();
        debug!("Routing table reset, new id {}", state.id);
    }

    pub fn get_route(&self, prefix: &AddressPrefix) -> Option<Route> {
        self.state.read().routes.get(prefix).cloned()
    }

    pub fn routes(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self.state.read().routes.values().cloned().collect();
        routes.sort_by(|a, b| a.prefix.cmp(&b.prefix));
        routes
    }

    /// The route with the longest prefix matching `destination`.
    pub fn best_route(&self, destination: &Address) -> Option<Route> {
        self.state
            .read()
            .routes
            .values()
            .filter(|route| route.prefix.matches(destination))
            .max_by_key(|route| route.prefix.depth())
            .cloned()
    }
}

impl RouteResolver for ForwardingRoutingTable {
    fn resolve(&self, destination: &Address) -> Option<AccountId> {
        self.best_route(destination)
            .map(|route| route.next_hop_account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::route;

    #[test]
    fn each_change_uses_one_epoch() {
        let table = ForwardingRoutingTable::new();
        assert_eq!(table.current_epoch(), 0);

        assert!(table.set_route(route("example.a", "alice")));
        assert!(table.set_route(route("example.b", "bob")));
        assert!(!table.set_route(route("example.b", "bob")));
        assert!(table.withdraw_route(&AddressPrefix::new("example.a")).is_some());
        assert!(table.withdraw_route(&AddressPrefix::new("example.a")).is_none());

        assert_eq!(table.current_epoch(), 3);
        let log = table.partial_route_log(0, 10);
        assert_eq!(log.len(), 3);
        assert_eq!(
            log.iter().map(|update| update.epoch).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(log[2].prefix, AddressPrefix::new("example.a"));
        assert!(log[2].route.is_none());
    }

    #[test]
    fn partial_log_is_bounded_by_what_exists() {
        let table = ForwardingRoutingTable::new();
        for (i, prefix) in ["example.a", "example.b", "example.c", "example.d", "example.e"]
            .iter()
            .enumerate()
        {
            let prefix: AddressPrefix = prefix.parse().unwrap();
            table.set_route(Route {
                prefix,
                next_hop_account_id: AccountId::new("alice"),
                auth: [i as u8; 32],
                path: Vec::new(),
            });
        }

        for &(from, max) in &[(0, 2), (0, 50), (3, 50), (4, 1), (5, 10), (9, 3)] {
            let log = table.partial_route_log(from, max);
            let expected = std::cmp::min(max, table.current_epoch().saturating_sub(from));
            assert_eq!(log.len() as u32, expected, "from={} max={}", from, max);
            if let Some(first) = log.first() {
                assert_eq!(first.epoch, from);
            }
        }
        // Restartable: reading twice gives the same entries
        assert_eq!(table.partial_route_log(1, 3), table.partial_route_log(1, 3));
    }

    #[test]
    fn resolves_longest_prefix() {
        let table = ForwardingRoutingTable::new();
        table.set_route(route("example.a", "one"));
        table.set_route(route("example.a.b.c", "two"));
        table.set_route(route("example.a.b", "three"));

        assert_eq!(table.resolve(&Address::new("example.a")), Some(AccountId::new("one")));
        assert_eq!(table.resolve(&Address::new("example.a.b.c")), Some(AccountId::new("two")));
        assert_eq!(
            table.resolve(&Address::new("example.a.b.c.d.e")),
            Some(AccountId::new("two"))
        );
        assert_eq!(table.resolve(&Address::new("example.a.bb")), Some(AccountId::new("one")));
        assert!(table.resolve(&Address::new("example.other")).is_none());
    }

    #[test]
    fn reset_changes_the_id() {
        let table = ForwardingRoutingTable::new();
        let id = table.routing_table_id();
        table.set_route(route("example.a", "alice"));
        table.reset();
        assert_ne!(table.routing_table_id(), id);
        assert_eq!(table.current_epoch(), 0);
        assert!(table.routes().is_empty());
    }

    #[test]
    fn withdraws_everything_via_an_account() {
        let table = ForwardingRoutingTable::new();
        table.set_route(route("example.a", "alice"));
        table.set_route(route("example.b", "bob"));
        table.set_route(route("example.c", "alice"));

        let withdrawn = table.withdraw_routes_via(&AccountId::new("alice"));
        assert_eq!(
            withdrawn,
            vec![AddressPrefix::new("example.a"), AddressPrefix::new("example.c")]
        );
        assert_eq!(table.current_epoch(), 5);
        assert_eq!(table.routes().len(), 1);
    }

    #[test]
    fn local_routes_are_authenticated_per_prefix() {
        let key = hmac::Key::new(hmac::HMAC_SHA256, b"routing secret");
        let a = Route::local(AddressPrefix::new("example.a"), AccountId::new("alice"), &key);
        let b = Route::local(AddressPrefix::new("example.b"), AccountId::new("alice"), &key);
        assert_ne!(a.auth, b.auth);
        assert!(a.path.is_empty());
        assert_ne!(Route::rehash_auth(&a.auth), a.auth);
    }
}
