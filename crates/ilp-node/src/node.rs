use crate::{NodeConfig, NodeError};

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use interledger_ccp::{CcpLinkHandler, ForwardingRoutingTable, Route, RouteBroadcaster};
use interledger_link::{
    DefaultLinkSettingsFactory, Link, LinkFactoryProvider, LinkId, LinkSettingsFactory,
};
use interledger_packet::AddressPrefix;
use interledger_router::{LinkRegistry, RouteResolver, Router, StaticRoutingTable};
use interledger_service::{
    AccountId, AccountSettings, AccountSettingsStore, ConnectorSettings,
    InMemoryAccountSettingsStore, OperatorAddress,
};
use interledger_service_util::{PacketRejector, PacketSwitch};
use ring::{
    hmac,
    rand::{SecureRandom, SystemRandom},
};
use tracing::{debug, error, info, warn};

/// A connector: one link per configured account, a packet switch that
/// filters and routes what arrives on them, and route broadcasting with the
/// accounts that exchange routes.
pub struct ConnectorNode {
    operator_address: OperatorAddress,
    accounts: Vec<AccountSettings>,
    account_store: InMemoryAccountSettingsStore,
    routing_table: Arc<ForwardingRoutingTable>,
    static_routes: StaticRoutingTable,
    broadcaster: Arc<RouteBroadcaster>,
    links: LinkRegistry,
    packet_switch: PacketSwitch,
    rejector: PacketRejector,
    link_settings_factory: Arc<dyn LinkSettingsFactory>,
    link_factory_provider: LinkFactoryProvider,
    route_secret: hmac::Key,
    started: AtomicBool,
}

impl ConnectorNode {
    pub fn from_config(config: NodeConfig) -> Result<Self, NodeError> {
        let route_secret = match config.route_secret {
            Some(secret) => secret,
            None => {
                let mut secret = [0; 32];
                SystemRandom::new()
                    .fill(&mut secret)
                    .map_err(|_| NodeError::RouteSecret)?;
                secret
            }
        };
        let settings = config.connector_settings();
        Self::new(settings, config.accounts, &route_secret)
    }

    pub fn new(
        settings: ConnectorSettings,
        accounts: Vec<AccountSettings>,
        route_secret: &[u8],
    ) -> Result<Self, NodeError> {
        let mut ids = HashSet::new();
        for account in &accounts {
            if !ids.insert(account.id.clone()) {
                return Err(NodeError::DuplicateAccount(account.id.clone()));
            }
        }
        for route in &settings.static_routes {
            if !ids.contains(&route.peer_account_id) {
                return Err(NodeError::UnknownStaticRouteAccount {
                    prefix: route.target_prefix.to_string(),
                    account_id: route.peer_account_id.clone(),
                });
            }
        }

        let operator_address = OperatorAddress::new(settings.operator_address.clone());
        let account_store = InMemoryAccountSettingsStore::new(accounts.clone());
        let account_lookup: Arc<dyn AccountSettingsStore> = Arc::new(account_store.clone());
        let routing_table = Arc::new(ForwardingRoutingTable::new());
        let static_routes = StaticRoutingTable::new(settings.static_routes.clone());
        let links = LinkRegistry::new();
        let rejector = PacketRejector::new(operator_address.clone());

        // Static routes win over learned ones
        let resolvers = vec![
            Arc::new(static_routes.clone()) as Arc<dyn RouteResolver>,
            routing_table.clone() as Arc<dyn RouteResolver>,
        ];
        let router = Router::new(resolvers, links.clone(), rejector.clone());
        let packet_switch =
            PacketSwitch::with_default_filters(account_lookup.clone(), Arc::new(router), rejector.clone());
        let broadcaster = Arc::new(RouteBroadcaster::new(
            routing_table.clone(),
            account_lookup,
            settings.global_routing_settings.clone(),
            operator_address.clone(),
        ));

        Ok(ConnectorNode {
            operator_address,
            accounts,
            account_store,
            routing_table,
            static_routes,
            broadcaster,
            links,
            packet_switch,
            rejector,
            link_settings_factory: Arc::new(DefaultLinkSettingsFactory),
            link_factory_provider: LinkFactoryProvider::with_default_factories(),
            route_secret: hmac::Key::new(hmac::HMAC_SHA256, route_secret),
            started: AtomicBool::new(false),
        })
    }

    /// Replaces the factories links are built with. Must be called before `start`.
    pub fn with_link_factory_provider(mut self, provider: LinkFactoryProvider) -> Self {
        self.link_factory_provider = provider;
        self
    }

    pub fn with_link_settings_factory(mut self, factory: Arc<dyn LinkSettingsFactory>) -> Self {
        self.link_settings_factory = factory;
        self
    }

    /// Builds, identifies, connects and registers a handler on the link of
    /// every account, then starts exchanging routes. Connections are made
    /// one after the other; an account whose link fails to connect is kept
    /// but left disconnected.
    pub async fn start(&self) -> Result<(), NodeError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(NodeError::AlreadyStarted);
        }
        info!(
            "Starting connector {} with {} accounts",
            self.operator_address.get_or_unset(),
            self.accounts.len()
        );

        for account in &self.accounts {
            let link = self.build_link(account)?;
            if let Err(err) = link.connect().await {
                error!("Link for account {} failed to connect: {}", account.id, err);
            }
            self.links.insert(account.id.clone(), link.clone());

            if self.broadcaster.register_ccp_enabled_account(account, link) {
                debug!("Account {} exchanges routes", account.id);
            }
            if account.relationship.is_child() {
                self.add_child_route(&account.id)?;
            }
        }

        for receiver in self.broadcaster.receivers() {
            tokio::spawn(async move {
                if let Err(err) = receiver.send_route_control_request().await {
                    warn!(
                        "Unable to request routes from {}: {}",
                        receiver.peer_account_id(),
                        err
                    );
                }
            });
        }
        Ok(())
    }

    /// Stops route broadcasting and disconnects every link.
    pub async fn shutdown(&self) {
        info!("Shutting down connector {}", self.operator_address.get_or_unset());
        self.broadcaster.shutdown();
        for account_id in self.links.account_ids() {
            if let Some(link) = self.links.get(&account_id) {
                if let Err(err) = link.disconnect().await {
                    warn!("Error disconnecting link for {}: {}", account_id, err);
                }
            }
        }
    }

    fn build_link(&self, account: &AccountSettings) -> Result<Arc<Link>, NodeError> {
        let link_error = |source| NodeError::Link {
            account_id: account.id.clone(),
            source,
        };
        let link_settings = self
            .link_settings_factory
            .construct(account)
            .map_err(link_error)?;
        let link = self
            .link_factory_provider
            .construct_link(self.operator_address.clone(), link_settings)
            .map_err(link_error)?;
        link.set_link_id(LinkId::from(&account.id))
            .map_err(link_error)?;
        let handler = CcpLinkHandler::new(
            account.id.clone(),
            self.broadcaster.clone(),
            self.packet_switch.clone(),
            self.rejector.clone(),
        );
        link.register_link_handler(Arc::new(handler))
            .map_err(link_error)?;
        Ok(Arc::new(link))
    }

    /// Children are reached under `<operator address>.<account id>`.
    fn add_child_route(&self, account_id: &AccountId) -> Result<(), NodeError> {
        let operator_address = match self.operator_address.get() {
            Some(address) => address,
            None => {
                debug!(
                    "Operator address not set, not adding a route for child {}",
                    account_id
                );
                return Ok(());
            }
        };
        let address = operator_address
            .with_suffix(account_id.as_str())
            .map_err(|source| NodeError::ChildAddress {
                account_id: account_id.clone(),
                source,
            })?;
        let route = Route::local(
            AddressPrefix::from(address),
            account_id.clone(),
            &self.route_secret,
        );
        debug!("Adding local route {} via child {}", route.prefix, account_id);
        self.routing_table.set_route(route);
        Ok(())
    }

    pub fn operator_address(&self) -> &OperatorAddress {
        &self.operator_address
    }

    pub fn accounts(&self) -> &InMemoryAccountSettingsStore {
        &self.account_store
    }

    pub fn link(&self, account_id: &AccountId) -> Option<Arc<Link>> {
        self.links.get(account_id)
    }

    pub fn routing_table(&self) -> &Arc<ForwardingRoutingTable> {
        &self.routing_table
    }

    pub fn static_routes(&self) -> &StaticRoutingTable {
        &self.static_routes
    }

    pub fn broadcaster(&self) -> &Arc<RouteBroadcaster> {
        &self.broadcaster
    }

    pub fn packet_switch(&self) -> &PacketSwitch {
        &self.packet_switch
    }
}
