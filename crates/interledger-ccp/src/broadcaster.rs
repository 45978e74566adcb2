use crate::packet::RouteUpdateRequest;
use crate::{CcpError, CcpReceiver, CcpSender, ForwardingRoutingTable, Route};

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use interledger_link::Link;
use interledger_packet::AddressPrefix;
use interledger_service::{
    AccountId, AccountSettings, AccountSettingsStore, GlobalRoutingSettings, OperatorAddress,
};
use parking_lot::RwLock;
use tracing::{debug, info};

/// Keeps the [`CcpSender`] and [`CcpReceiver`] of every account that
/// exchanges routes with this node.
pub struct RouteBroadcaster {
    routing_table: Arc<ForwardingRoutingTable>,
    accounts: Arc<dyn AccountSettingsStore>,
    routing_settings: GlobalRoutingSettings,
    operator_address: OperatorAddress,
    senders: RwLock<HashMap<AccountId, CcpSender>>,
    receivers: RwLock<HashMap<AccountId, Arc<CcpReceiver>>>,
}

impl RouteBroadcaster {
    pub fn new(
        routing_table: Arc<ForwardingRoutingTable>,
        accounts: Arc<dyn AccountSettingsStore>,
        routing_settings: GlobalRoutingSettings,
        operator_address: OperatorAddress,
    ) -> Self {
        RouteBroadcaster {
            routing_table,
            accounts,
            routing_settings,
            operator_address,
            senders: RwLock::new(HashMap::new()),
            receivers: RwLock::new(HashMap::new()),
        }
    }

    pub fn routing_table(&self) -> &Arc<ForwardingRoutingTable> {
        &self.routing_table
    }

    /// Creates a sender and/or receiver for `account`, as its
    /// `send_routes`/`receive_routes` settings allow. Returns false when
    /// route broadcasting is disabled or the account exchanges no routes.
    pub fn register_ccp_enabled_account(&self, account: &AccountSettings, link: Arc<Link>) -> bool {
        if !self.routing_settings.route_broadcast_enabled {
            debug!("Route broadcasting disabled, not registering {}", account.id);
            return false;
        }

        let mut registered = false;
        if account.should_send_routes() {
            let sender = CcpSender::new(
                account.id.clone(),
                link.clone(),
                self.routing_table.clone(),
                self.accounts.clone(),
                self.routing_settings.clone(),
                self.operator_address.clone(),
            );
            if let Some(previous) = self.senders.write().insert(account.id.clone(), sender) {
                previous.stop_broadcasting();
            }
            registered = true;
        }
        if account.should_receive_routes() {
            let receiver = CcpReceiver::new(
                account.id.clone(),
                link,
                self.routing_table.clone(),
                self.operator_address.clone(),
            );
            self.receivers
                .write()
                .insert(account.id.clone(), Arc::new(receiver));
            registered = true;
        }

        if registered {
            info!(
                "Exchanging routes with {} ({}): send={}, receive={}",
                account.id,
                account.relationship.as_str(),
                account.should_send_routes(),
                account.should_receive_routes()
            );
        }
        registered
    }

    pub fn ccp_sender(&self, account_id: &AccountId) -> Option<CcpSender> {
        self.senders.read().get(account_id).cloned()
    }

    pub fn ccp_receiver(&self, account_id: &AccountId) -> Option<Arc<CcpReceiver>> {
        self.receivers.read().get(account_id).cloned()
    }

    pub fn receivers(&self) -> Vec<Arc<CcpReceiver>> {
        self.receivers.read().values().cloned().collect()
    }

    /// Stops routing with `account_id` and withdraws the routes learned from
    /// it, falling back to other peers' routes where they have one.
    pub fn remove_account(&self, account_id: &AccountId) {
        if let Some(sender) = self.senders.write().remove(account_id) {
            sender.stop_broadcasting();
        }
        if self.receivers.write().remove(account_id).is_some() {
            let withdrawn = self.routing_table.withdraw_routes_via(account_id);
            debug!("Withdrew {} routes via {}", withdrawn.len(), account_id);
            self.update_best_routes(withdrawn);
        }
    }

    /// Applies a route update through `receiver`, then re-selects the best
    /// route for every prefix it touched. Returns the prefixes whose
    /// forwarding entry changed.
    pub fn handle_route_update_request(
        &self,
        receiver: &CcpReceiver,
        request: RouteUpdateRequest,
    ) -> Result<Vec<AddressPrefix>, CcpError> {
        // A new table id drops everything the peer announced before,
        // even when the update itself is then refused
        let mut touched: BTreeSet<AddressPrefix> =
            if receiver.routing_table_id() != request.routing_table_id {
                receiver.learned_prefixes().into_iter().collect()
            } else {
                BTreeSet::new()
            };
        let result = receiver.handle_route_update_request(request);
        if let Ok(changed) = result.as_ref() {
            touched.extend(changed.iter().cloned());
        }
        let reselected = self.update_best_routes(touched);
        result.map(|changed| {
            let mut all: BTreeSet<AddressPrefix> = changed.into_iter().collect();
            all.extend(reselected);
            all.into_iter().collect()
        })
    }

    /// Points each prefix at the shortest route any receiver has learned for
    /// it, or withdraws it when none has. Prefixes routed to an account we
    /// do not receive routes from (local and child routes) are left alone.
    pub fn update_best_routes<I>(&self, prefixes: I) -> Vec<AddressPrefix>
    where
        I: IntoIterator<Item = AddressPrefix>,
    {
        let receivers = self.receivers.read();
        let mut changed = Vec::new();
        for prefix in prefixes {
            let current = self.routing_table.get_route(&prefix);
            let current_next_hop = current.as_ref().map(|route| &route.next_hop_account_id);
            if let Some(next_hop) = current_next_hop {
                if !receivers.contains_key(next_hop) {
                    continue;
                }
            }

            let best: Option<Route> = receivers
                .values()
                .filter_map(|receiver| receiver.learned_route(&prefix))
                .min_by(|a, b| {
                    a.path
                        .len()
                        .cmp(&b.path.len())
                        .then_with(|| {
                            let a_current = Some(&a.next_hop_account_id) == current_next_hop;
                            let b_current = Some(&b.next_hop_account_id) == current_next_hop;
                            b_current.cmp(&a_current)
                        })
                        .then_with(|| a.next_hop_account_id.cmp(&b.next_hop_account_id))
                });

            match best {
                Some(route) => {
                    let next_hop = route.next_hop_account_id.clone();
                    if self.routing_table.set_route(route) {
                        debug!("Best route for {} is now via {}", prefix, next_hop);
                        changed.push(prefix);
                    }
                }
                None if current.is_some() => {
                    if self.routing_table.withdraw_route(&prefix).is_some() {
                        debug!("No peer has a route for {} anymore", prefix);
                        changed.push(prefix);
                    }
                }
                None => {}
            }
        }
        changed
    }

    pub fn shutdown(&self) {
        for sender in self.senders.read().values() {
            sender.stop_broadcasting();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::NewRoute;
    use crate::test_helpers::*;
    use crate::RoutingTableId;
    use interledger_packet::Address;
    use interledger_service::AccountRelationship;

    fn broadcaster(settings: GlobalRoutingSettings) -> RouteBroadcaster {
        RouteBroadcaster::new(
            Arc::new(ForwardingRoutingTable::new()),
            Arc::new(accounts(AccountRelationship::Peer)),
            settings,
            operator_address(),
        )
    }

    #[tokio::test]
    async fn registers_by_relationship() {
        let broadcaster = broadcaster(GlobalRoutingSettings::default());
        let (link, _) = recording_link(true, false).await;

        assert!(broadcaster.register_ccp_enabled_account(
            &account("peer", AccountRelationship::Peer),
            link.clone()
        ));
        assert!(broadcaster.register_ccp_enabled_account(
            &account("parent", AccountRelationship::Parent),
            link.clone()
        ));
        assert!(broadcaster.register_ccp_enabled_account(
            &account("child", AccountRelationship::Child),
            link.clone()
        ));

        let peer = AccountId::new("peer");
        let parent = AccountId::new("parent");
        let child = AccountId::new("child");
        assert!(broadcaster.ccp_sender(&peer).is_some());
        assert!(broadcaster.ccp_receiver(&peer).is_some());
        assert!(broadcaster.ccp_sender(&parent).is_none());
        assert!(broadcaster.ccp_receiver(&parent).is_some());
        assert!(broadcaster.ccp_sender(&child).is_some());
        assert!(broadcaster.ccp_receiver(&child).is_none());

        let mut quiet = account("other-peer", AccountRelationship::Peer);
        quiet.send_routes = Some(false);
        quiet.receive_routes = Some(false);
        assert!(!broadcaster.register_ccp_enabled_account(&quiet, link));
    }

    #[tokio::test]
    async fn nothing_registers_when_disabled() {
        let broadcaster = broadcaster(GlobalRoutingSettings {
            route_broadcast_enabled: false,
            ..GlobalRoutingSettings::default()
        });
        let (link, _) = recording_link(true, false).await;
        assert!(!broadcaster
            .register_ccp_enabled_account(&account("peer", AccountRelationship::Peer), link));
        assert!(broadcaster.ccp_sender(&AccountId::new("peer")).is_none());
    }

    #[tokio::test]
    async fn removing_an_account_stops_its_sender_and_withdraws_its_routes() {
        let broadcaster = broadcaster(GlobalRoutingSettings::default());
        let (link, _) = recording_link(true, false).await;
        broadcaster
            .register_ccp_enabled_account(&account("peer", AccountRelationship::Peer), link);
        let peer = AccountId::new("peer");
        let sender = broadcaster.ccp_sender(&peer).unwrap();
        sender.start_broadcasting();
        broadcaster.routing_table().set_route(route("example.learned", "peer"));

        broadcaster.remove_account(&peer);
        assert!(!sender.is_broadcasting());
        assert!(broadcaster.ccp_sender(&peer).is_none());
        assert!(broadcaster.routing_table().routes().is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_every_sender() {
        let broadcaster = broadcaster(GlobalRoutingSettings::default());
        let (link, _) = recording_link(true, false).await;
        broadcaster.register_ccp_enabled_account(
            &account("peer", AccountRelationship::Peer),
            link.clone(),
        );
        broadcaster
            .register_ccp_enabled_account(&account("child", AccountRelationship::Child), link);
        let senders: Vec<CcpSender> = vec![
            broadcaster.ccp_sender(&AccountId::new("peer")).unwrap(),
            broadcaster.ccp_sender(&AccountId::new("child")).unwrap(),
        ];
        for sender in senders.iter() {
            sender.start_broadcasting();
        }
        broadcaster.shutdown();
        assert!(senders.iter().all(|sender| !sender.is_broadcasting()));
    }

    fn new_route(prefix: &'static str, path: &[&'static str]) -> NewRoute {
        NewRoute {
            prefix: AddressPrefix::new(prefix),
            path: path.iter().copied().map(Address::new).collect(),
            auth: [1; 32],
            props: Vec::new(),
        }
    }

    fn update(
        routing_table_id: RoutingTableId,
        from: u32,
        to: u32,
        new_routes: Vec<NewRoute>,
        withdrawn_routes: Vec<AddressPrefix>,
    ) -> RouteUpdateRequest {
        RouteUpdateRequest {
            routing_table_id,
            current_epoch_index: to,
            from_epoch_index: from,
            to_epoch_index: to,
            hold_down_time: 45000,
            speaker: Address::new("example.remote"),
            new_routes,
            withdrawn_routes,
        }
    }

    /// `peer` announces `example.x` over one hop, `other-peer` over two.
    async fn two_peers_announcing_the_same_prefix() -> (RouteBroadcaster, RoutingTableId) {
        let broadcaster = broadcaster(GlobalRoutingSettings::default());
        let (link, _) = recording_link(true, false).await;
        broadcaster
            .register_ccp_enabled_account(&account("peer", AccountRelationship::Peer), link.clone());
        broadcaster
            .register_ccp_enabled_account(&account("other-peer", AccountRelationship::Peer), link);

        let peer_table = RoutingTableId::random();
        let near = broadcaster.ccp_receiver(&AccountId::new("peer")).unwrap();
        broadcaster
            .handle_route_update_request(
                &near,
                update(peer_table, 0, 1, vec![new_route("example.x", &["example.a"])], vec![]),
            )
            .unwrap();
        let far = broadcaster.ccp_receiver(&AccountId::new("other-peer")).unwrap();
        broadcaster
            .handle_route_update_request(
                &far,
                update(
                    RoutingTableId::random(),
                    0,
                    1,
                    vec![new_route("example.x", &["example.b1", "example.b2"])],
                    vec![],
                ),
            )
            .unwrap();
        (broadcaster, peer_table)
    }

    fn next_hop(broadcaster: &RouteBroadcaster, prefix: &'static str) -> Option<AccountId> {
        broadcaster
            .routing_table()
            .get_route(&AddressPrefix::new(prefix))
            .map(|route| route.next_hop_account_id)
    }

    #[tokio::test]
    async fn falls_back_to_the_next_best_route_on_withdrawal() {
        let (broadcaster, peer_table) = two_peers_announcing_the_same_prefix().await;
        assert_eq!(next_hop(&broadcaster, "example.x"), Some(AccountId::new("peer")));

        let near = broadcaster.ccp_receiver(&AccountId::new("peer")).unwrap();
        let changed = broadcaster
            .handle_route_update_request(
                &near,
                update(peer_table, 1, 2, vec![], vec![AddressPrefix::new("example.x")]),
            )
            .unwrap();
        assert_eq!(changed, vec![AddressPrefix::new("example.x")]);
        let route = broadcaster
            .routing_table()
            .get_route(&AddressPrefix::new("example.x"))
            .unwrap();
        assert_eq!(route.next_hop_account_id, AccountId::new("other-peer"));
        assert_eq!(route.path.len(), 3);

        // Once nobody announces it the prefix is gone
        let far = broadcaster.ccp_receiver(&AccountId::new("other-peer")).unwrap();
        let far_table = far.routing_table_id();
        broadcaster
            .handle_route_update_request(
                &far,
                update(far_table, 1, 2, vec![], vec![AddressPrefix::new("example.x")]),
            )
            .unwrap();
        assert_eq!(next_hop(&broadcaster, "example.x"), None);
    }

    #[tokio::test]
    async fn falls_back_when_a_peer_restarts_its_table() {
        let (broadcaster, _) = two_peers_announcing_the_same_prefix().await;

        // A restarted peer resumes mid-log, so its update is refused
        let near = broadcaster.ccp_receiver(&AccountId::new("peer")).unwrap();
        let result = broadcaster.handle_route_update_request(
            &near,
            update(RoutingTableId::random(), 5, 6, vec![new_route("example.y", &[])], vec![]),
        );
        assert!(matches!(result, Err(CcpError::EpochGap { .. })));
        assert_eq!(next_hop(&broadcaster, "example.x"), Some(AccountId::new("other-peer")));
    }

    #[tokio::test]
    async fn removed_peers_routes_fall_back_to_other_peers() {
        let (broadcaster, _) = two_peers_announcing_the_same_prefix().await;
        broadcaster.remove_account(&AccountId::new("peer"));
        assert_eq!(next_hop(&broadcaster, "example.x"), Some(AccountId::new("other-peer")));
    }
}
