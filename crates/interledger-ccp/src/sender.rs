use crate::packet::{Mode, NewRoute, RouteControlRequest, RouteUpdateRequest};
use crate::{CcpError, ForwardingRoutingTable, Route};

use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::sync::Arc;
use std::time::SystemTime;

use interledger_link::Link;
use interledger_packet::AddressPrefix;
use interledger_service::{
    AccountId, AccountSettingsStore, GlobalRoutingSettings, IlpResult, OperatorAddress,
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

#[derive(Debug)]
struct SyncState {
    mode: Mode,
    /// The next epoch the peer expects from us.
    last_known_epoch: u32,
    last_known_routing_table_id: Option<crate::RoutingTableId>,
}

struct SenderInner {
    peer_account_id: AccountId,
    link: Arc<Link>,
    routing_table: Arc<ForwardingRoutingTable>,
    accounts: Arc<dyn AccountSettingsStore>,
    routing_settings: GlobalRoutingSettings,
    operator_address: OperatorAddress,
    sync: Mutex<SyncState>,
    broadcast_task: Mutex<Option<JoinHandle<()>>>,
}

/// # CCP Sender
///
/// Streams this node's routing table to one peer. The peer drives the
/// sender with route control requests: `Sync` starts a broadcast every
/// `route_broadcast_interval`, `Idle` stops it.
///
/// Each broadcast carries the log entries after the epoch the peer last
/// acknowledged, at most `max_epochs_per_routing_table` at a time. The
/// acknowledged epoch is advanced as soon as the update is built, not when
/// the peer confirms it: a peer that misses an update asks for the range
/// again with its next control request.
#[derive(Clone)]
pub struct CcpSender {
    inner: Arc<SenderInner>,
}

impl CcpSender {
    pub fn new(
        peer_account_id: AccountId,
        link: Arc<Link>,
        routing_table: Arc<ForwardingRoutingTable>,
        accounts: Arc<dyn AccountSettingsStore>,
        routing_settings: GlobalRoutingSettings,
        operator_address: OperatorAddress,
    ) -> Self {
        CcpSender {
            inner: Arc::new(SenderInner {
                peer_account_id,
                link,
                routing_table,
                accounts,
                routing_settings,
                operator_address,
                sync: Mutex::new(SyncState {
                    mode: Mode::Idle,
                    last_known_epoch: 0,
                    last_known_routing_table_id: None,
                }),
                broadcast_task: Mutex::new(None),
            }),
        }
    }

    pub fn peer_account_id(&self) -> &AccountId {
        &self.inner.peer_account_id
    }

    pub fn sync_mode(&self) -> Mode {
        self.inner.sync.lock().mode
    }

    pub fn last_known_epoch(&self) -> u32 {
        self.inner.sync.lock().last_known_epoch
    }

    pub fn is_broadcasting(&self) -> bool {
        self.inner
            .broadcast_task
            .lock()
            .as_ref()
            .map_or(false, |task| !task.is_finished())
    }

    pub fn handle_route_control_request(&self, request: &RouteControlRequest) {
        let current_table_id = self.inner.routing_table.routing_table_id();
        // The schedule is started or stopped under the sync lock so it always
        // matches `mode`
        let mut sync = self.inner.sync.lock();
        debug!(
            "Peer {} sent route control request: {:?}",
            self.inner.peer_account_id, request
        );
        if sync.mode != request.mode {
            debug!(
                "Peer {} changed routing mode from {:?} to {:?}",
                self.inner.peer_account_id, sync.mode, request.mode
            );
        }
        sync.mode = request.mode;
        sync.last_known_routing_table_id = Some(request.last_known_routing_table_id);

        if request.last_known_routing_table_id != current_table_id {
            debug!(
                "Peer {} has an old routing table id, resending from epoch 0. Their table id: {}, ours: {}",
                self.inner.peer_account_id, request.last_known_routing_table_id, current_table_id
            );
            sync.last_known_epoch = 0;
        } else {
            debug!(
                "Peer {} knows epoch {} (current epoch: {})",
                self.inner.peer_account_id,
                request.last_known_epoch,
                self.inner.routing_table.current_epoch()
            );
            sync.last_known_epoch = request.last_known_epoch;
        }

        // Features are ignored since none are supported
        match sync.mode {
            Mode::Sync => self.start_broadcasting(),
            Mode::Idle => self.stop_broadcasting(),
        }
    }

    /// Schedules the broadcast loop unless one is already running.
    pub fn start_broadcasting(&self) {
        let mut task = self.inner.broadcast_task.lock();
        if let Some(existing) = task.as_ref() {
            if !existing.is_finished() {
                return;
            }
        }

        let inner = Arc::clone(&self.inner);
        let interval = self.inner.routing_settings.route_broadcast_interval();
        *task = Some(tokio::spawn(async move {
            loop {
                // Sends run as their own task so stopping the loop never
                // interrupts one that is underway
                let tick = Arc::clone(&inner);
                let send = tokio::spawn(async move { tick.send_route_update_request().await });
                match send.await {
                    Ok(_) => {}
                    Err(err) => error!(
                        "Route broadcast to {} failed: {}",
                        inner.peer_account_id, err
                    ),
                }
                tokio::time::sleep(interval).await;
            }
        }));
        info!("CcpSender now broadcasting to peer {}", self.inner.peer_account_id);
    }

    pub fn stop_broadcasting(&self) {
        if let Some(task) = self.inner.broadcast_task.lock().take() {
            task.abort();
            info!(
                "CcpSender no longer broadcasting to peer {}",
                self.inner.peer_account_id
            );
        }
    }

    /// Sends one route update to the peer, covering the epochs it has not
    /// yet been sent.
    pub async fn send_route_update_request(&self) -> Result<IlpResult, CcpError> {
        self.inner.send_route_update_request().await
    }
}

impl SenderInner {
    async fn send_route_update_request(&self) -> Result<IlpResult, CcpError> {
        let request = match self.next_route_update() {
            Ok(request) => request,
            Err(err) => {
                error!(
                    "Failed to build route update for peer {}: {}",
                    self.peer_account_id, err
                );
                return Err(err);
            }
        };
        let expires_at = SystemTime::now() + self.routing_settings.route_expiry();
        let prepare = request.to_prepare(expires_at);
        debug!(
            "Sending route update to {}: epochs {}..{}, {} new routes, {} withdrawn",
            self.peer_account_id,
            request.from_epoch_index,
            request.to_epoch_index,
            request.new_routes.len(),
            request.withdrawn_routes.len()
        );

        match self.link.send_packet(prepare).await {
            Ok(Ok(fulfill)) => {
                debug!("Route update to {} succeeded", self.peer_account_id);
                Ok(Ok(fulfill))
            }
            Ok(Err(reject)) => {
                error!(
                    "Route update to {} was rejected: {} {}",
                    self.peer_account_id,
                    reject.code(),
                    String::from_utf8_lossy(reject.message())
                );
                Ok(Err(reject))
            }
            Err(err) => {
                error!(
                    "Failed to send route update to {}: {}",
                    self.peer_account_id, err
                );
                Err(err.into())
            }
        }
    }

    /// Builds the next update and marks its epochs as sent.
    fn next_route_update(&self) -> Result<RouteUpdateRequest, CcpError> {
        let from_epoch = self.sync.lock().last_known_epoch;
        let updates = self.routing_table.partial_route_log(
            from_epoch,
            self.routing_settings.max_epochs_per_routing_table,
        );
        let to_epoch = from_epoch + updates.len() as u32;

        let peer_is_parent = self
            .accounts
            .find_account_settings(&self.peer_account_id)
            .map_or(false, |peer| peer.relationship.is_parent());

        // Later entries for a prefix supersede earlier ones
        let mut latest: BTreeMap<AddressPrefix, Option<Route>> = BTreeMap::new();
        for update in updates {
            let route = update
                .route
                .and_then(|route| self.advertisable(route, peer_is_parent));
            latest.insert(update.prefix, route);
        }

        let mut new_routes = Vec::new();
        let mut withdrawn_routes = Vec::new();
        for (prefix, route) in latest {
            match route {
                Some(route) => new_routes.push(NewRoute {
                    prefix,
                    path: route.path,
                    auth: route.auth,
                    props: Vec::new(),
                }),
                None => withdrawn_routes.push(prefix),
            }
        }

        let request = RouteUpdateRequest {
            routing_table_id: self.routing_table.routing_table_id(),
            current_epoch_index: self.routing_table.current_epoch(),
            from_epoch_index: from_epoch,
            to_epoch_index: to_epoch,
            hold_down_time: u32::try_from(self.routing_settings.route_expiry_ms)
                .unwrap_or(u32::max_value()),
            speaker: self.operator_address.get_or_unset(),
            new_routes,
            withdrawn_routes,
        };

        let mut sync = self.sync.lock();
        if sync.last_known_epoch == from_epoch {
            sync.last_known_epoch = to_epoch;
        } else {
            trace!(
                "Peer {} epoch changed to {} while building an update, keeping it",
                self.peer_account_id,
                sync.last_known_epoch
            );
        }
        Ok(request)
    }

    /// Applies the advertisement policy: never send a peer its own routes,
    /// never send anything to a parent, and only advertise routes whose next
    /// hop is a child.
    fn advertisable(&self, route: Route, peer_is_parent: bool) -> Option<Route> {
        if route.next_hop_account_id == self.peer_account_id {
            return None;
        }

        let next_hop_is_peer_or_parent = match self
            .accounts
            .find_account_settings(&route.next_hop_account_id)
        {
            Some(next_hop) => next_hop.relationship.is_peer_or_parent(),
            None => {
                error!(
                    "Next hop {} for route {} is not a known account",
                    route.next_hop_account_id, route.prefix
                );
                false
            }
        };

        if peer_is_parent || next_hop_is_peer_or_parent {
            None
        } else {
            Some(route)
        }
    }
}
