use crate::packet::{Mode, RouteControlRequest, RouteUpdateRequest};
use crate::{CcpError, ForwardingRoutingTable, Route, RoutingTableId};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use interledger_link::Link;
use interledger_packet::AddressPrefix;
use interledger_service::{AccountId, IlpResult, OperatorAddress};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

const CONTROL_REQUEST_EXPIRY: Duration = Duration::from_secs(60);

struct ReceiverState {
    routing_table_id: RoutingTableId,
    epoch: u32,
    /// Every route the peer currently announces, whether or not it is the
    /// one in the forwarding table.
    routes: HashMap<AddressPrefix, Route>,
}

/// # CCP Receiver
///
/// Applies one peer's route updates to the forwarding table. Tracks the
/// peer's routing table id and the next epoch expected from it; an update
/// that skips epochs is refused so the peer can be asked to resend.
pub struct CcpReceiver {
    peer_account_id: AccountId,
    link: Arc<Link>,
    routing_table: Arc<ForwardingRoutingTable>,
    operator_address: OperatorAddress,
    state: Mutex<ReceiverState>,
}

impl CcpReceiver {
    pub fn new(
        peer_account_id: AccountId,
        link: Arc<Link>,
        routing_table: Arc<ForwardingRoutingTable>,
        operator_address: OperatorAddress,
    ) -> Self {
        CcpReceiver {
            peer_account_id,
            link,
            routing_table,
            operator_address,
            state: Mutex::new(ReceiverState {
                routing_table_id: RoutingTableId::random(),
                epoch: 0,
                routes: HashMap::new(),
            }),
        }
    }

    pub fn peer_account_id(&self) -> &AccountId {
        &self.peer_account_id
    }

    pub fn routing_table_id(&self) -> RoutingTableId {
        self.state.lock().routing_table_id
    }

    pub fn epoch(&self) -> u32 {
        self.state.lock().epoch
    }

    /// The route this peer announces for `prefix`, if any.
    pub fn learned_route(&self, prefix: &AddressPrefix) -> Option<Route> {
        self.state.lock().routes.get(prefix).cloned()
    }

    pub fn learned_prefixes(&self) -> Vec<AddressPrefix> {
        self.state.lock().routes.keys().cloned().collect()
    }

    /// Applies an update, returning the prefixes whose routes changed.
    pub fn handle_route_update_request(
        &self,
        request: RouteUpdateRequest,
    ) -> Result<Vec<AddressPrefix>, CcpError> {
        let mut state = self.state.lock();

        if state.routing_table_id != request.routing_table_id {
            debug!(
                "Peer {} has a new routing table. Old id: {}, new id: {}",
                self.peer_account_id, state.routing_table_id, request.routing_table_id
            );
            state.routing_table_id = request.routing_table_id;
            state.epoch = 0;
            state.routes.clear();
            self.routing_table.withdraw_routes_via(&self.peer_account_id);
        }

        if request.from_epoch_index > state.epoch {
            return Err(CcpError::EpochGap {
                routing_table_id: state.routing_table_id,
                expected_epoch: state.epoch,
                from_epoch: request.from_epoch_index,
            });
        }

        if request.to_epoch_index <= state.epoch {
            trace!(
                "Ignoring duplicate route update from {} for epoch {}",
                self.peer_account_id,
                state.epoch
            );
            return Ok(Vec::new());
        }

        if request.is_heartbeat() {
            trace!(
                "Heartbeat from {} for table {}, epoch {}",
                self.peer_account_id,
                state.routing_table_id,
                request.to_epoch_index
            );
            state.epoch = request.to_epoch_index;
            return Ok(Vec::new());
        }

        let own_address = self.operator_address.get();
        let mut changed = Vec::new();

        for prefix in request.withdrawn_routes {
            if state.routes.remove(&prefix).is_some() && self.withdraw_if_ours(&prefix) {
                changed.push(prefix);
            }
        }

        for announced in request.new_routes {
            if let Some(own_address) = own_address.as_ref() {
                if announced.path.contains(own_address) {
                    debug!(
                        "Ignoring route for {} from {}: its path already includes this node",
                        announced.prefix, self.peer_account_id
                    );
                    continue;
                }
            }

            let mut path = Vec::with_capacity(announced.path.len() + 1);
            if let Some(own_address) = own_address.as_ref() {
                path.push(own_address.clone());
            }
            path.extend(announced.path.iter().cloned());
            let route = Route {
                prefix: announced.prefix.clone(),
                next_hop_account_id: self.peer_account_id.clone(),
                auth: Route::rehash_auth(&announced.auth),
                path,
            };
            let prefix = announced.prefix;
            state.routes.insert(prefix.clone(), route.clone());
            if self.prefer(&route) && self.routing_table.set_route(route) {
                changed.push(prefix);
            }
        }

        state.epoch = request.to_epoch_index;
        debug!(
            "Applied route update from {}: table {} now at epoch {}, {} prefixes changed",
            self.peer_account_id,
            state.routing_table_id,
            state.epoch,
            changed.len()
        );
        Ok(changed)
    }

    /// Only routes learned from this peer are withdrawn on its behalf.
    fn withdraw_if_ours(&self, prefix: &AddressPrefix) -> bool {
        self.is_ours(prefix) && self.routing_table.withdraw_route(prefix).is_some()
    }

    fn is_ours(&self, prefix: &AddressPrefix) -> bool {
        self.routing_table
            .get_route(prefix)
            .map_or(false, |existing| existing.next_hop_account_id == self.peer_account_id)
    }

    /// A route from this peer replaces an existing one when the existing one
    /// also came from this peer or has a longer path.
    fn prefer(&self, candidate: &Route) -> bool {
        match self.routing_table.get_route(&candidate.prefix) {
            None => true,
            Some(existing) => {
                existing.next_hop_account_id == self.peer_account_id
                    || candidate.path.len() < existing.path.len()
            }
        }
    }

    /// The control request asking the peer to (re)send updates after the
    /// last epoch we applied.
    pub fn route_control_request(&self) -> RouteControlRequest {
        let state = self.state.lock();
        RouteControlRequest {
            mode: Mode::Sync,
            last_known_routing_table_id: state.routing_table_id,
            last_known_epoch: state.epoch,
            features: Vec::new(),
        }
    }

    pub async fn send_route_control_request(&self) -> Result<IlpResult, CcpError> {
        let request = self.route_control_request();
        debug!(
            "Asking {} for routes after epoch {} of table {}",
            self.peer_account_id, request.last_known_epoch, request.last_known_routing_table_id
        );
        let prepare = request.to_prepare(SystemTime::now() + CONTROL_REQUEST_EXPIRY);
        let result = self.link.send_packet(prepare).await?;
        if let Err(reject) = &result {
            warn!(
                "Route control request to {} was rejected: {} {}",
                self.peer_account_id,
                reject.code(),
                String::from_utf8_lossy(reject.message())
            );
        }
        Ok(result)
    }
}
