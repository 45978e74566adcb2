use crate::AccountId;

use std::sync::Arc;
use std::time::Duration;

use interledger_packet::{Address, AddressPrefix};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Stamped on rejects while the node does not know its own address yet.
pub static UNSET_OPERATOR_ADDRESS: Lazy<Address> =
    Lazy::new(|| Address::new("private.unset-operator-address"));

fn default_true() -> bool {
    true
}

fn default_route_broadcast_interval_ms() -> u64 {
    30_000
}

fn default_route_expiry_ms() -> u64 {
    45_000
}

fn default_max_epochs_per_routing_table() -> u32 {
    50
}

/// Settings for the route broadcast protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalRoutingSettings {
    #[serde(default = "default_true")]
    pub route_broadcast_enabled: bool,
    /// How often a syncing peer is sent a route update.
    #[serde(default = "default_route_broadcast_interval_ms")]
    pub route_broadcast_interval_ms: u64,
    /// Hold-down time advertised with each update; also bounds how long an
    /// update Prepare is valid for.
    #[serde(default = "default_route_expiry_ms")]
    pub route_expiry_ms: u64,
    /// Upper bound on the log entries carried by a single update.
    #[serde(default = "default_max_epochs_per_routing_table")]
    pub max_epochs_per_routing_table: u32,
}

impl GlobalRoutingSettings {
    pub fn route_broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.route_broadcast_interval_ms)
    }

    pub fn route_expiry(&self) -> Duration {
        Duration::from_millis(self.route_expiry_ms)
    }
}

impl Default for GlobalRoutingSettings {
    fn default() -> Self {
        GlobalRoutingSettings {
            route_broadcast_enabled: true,
            route_broadcast_interval_ms: default_route_broadcast_interval_ms(),
            route_expiry_ms: default_route_expiry_ms(),
            max_epochs_per_routing_table: default_max_epochs_per_routing_table(),
        }
    }
}

/// A route configured by the operator rather than learned over CCP.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRoute {
    pub target_prefix: AddressPrefix,
    pub peer_account_id: AccountId,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorSettings {
    #[serde(default)]
    pub operator_address: Option<Address>,
    #[serde(default)]
    pub global_routing_settings: GlobalRoutingSettings,
    #[serde(default)]
    pub static_routes: Vec<StaticRoute>,
}

/// Shared handle to this node's own ILP address, which may only become known
/// after the node has started (for example via IL-DCP from a parent).
#[derive(Clone, Debug, Default)]
pub struct OperatorAddress(Arc<RwLock<Option<Address>>>);

impl OperatorAddress {
    pub fn new(address: Option<Address>) -> Self {
        OperatorAddress(Arc::new(RwLock::new(address)))
    }

    pub fn get(&self) -> Option<Address> {
        self.0.read().clone()
    }

    /// The operator address, or [`UNSET_OPERATOR_ADDRESS`] if it is not known yet.
    pub fn get_or_unset(&self) -> Address {
        self.get().unwrap_or_else(|| UNSET_OPERATOR_ADDRESS.clone())
    }

    pub fn set(&self, address: Address) {
        *self.0.write() = Some(address);
    }

    pub fn is_set(&self) -> bool {
        self.0.read().is_some()
    }
}

impl From<Address> for OperatorAddress {
    fn from(address: Address) -> Self {
        OperatorAddress::new(Some(address))
    }
}
