use crate::packet::{RouteUpdateRequest, CCP_RESPONSE};
use crate::{CcpSender, ForwardingRoutingTable, Route};

use std::convert::TryFrom;
use std::sync::Arc;

use async_trait::async_trait;
use interledger_link::{Link, LinkError, LinkSettings, LinkTransport};
use interledger_packet::{Address, AddressPrefix, ErrorCode, Prepare, RejectBuilder};
use interledger_service::{
    AccountId, AccountRelationship, AccountSettings, GlobalRoutingSettings, IlpResult,
    InMemoryAccountSettingsStore, LinkType, OperatorAddress,
};
use parking_lot::Mutex;

pub fn route(prefix: &'static str, next_hop: &str) -> Route {
    route_with_auth(prefix, next_hop, 0)
}

pub fn route_with_auth(prefix: &'static str, next_hop: &str, auth: u8) -> Route {
    Route {
        prefix: AddressPrefix::new(prefix),
        next_hop_account_id: AccountId::new(next_hop),
        auth: [auth; 32],
        path: Vec::new(),
    }
}

pub fn account(id: &str, relationship: AccountRelationship) -> AccountSettings {
    AccountSettings::new(AccountId::new(id), relationship, LinkType::loopback())
}

/// `peer` with the given relationship plus one account of every kind.
pub fn accounts(peer_relationship: AccountRelationship) -> InMemoryAccountSettingsStore {
    InMemoryAccountSettingsStore::new(vec![
        account("peer", peer_relationship),
        account("child", AccountRelationship::Child),
        account("parent", AccountRelationship::Parent),
        account("other-peer", AccountRelationship::Peer),
    ])
}

pub fn operator_address() -> OperatorAddress {
    Address::new("example.connector").into()
}

/// Records every Prepare and answers with the CCP Fulfill, or a Reject.
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<Prepare>>>,
    reject: bool,
}

#[async_trait]
impl LinkTransport for RecordingTransport {
    async fn do_connect(&self) -> Result<(), LinkError> {
        Ok(())
    }

    async fn do_disconnect(&self) -> Result<(), LinkError> {
        Ok(())
    }

    async fn send_packet(&self, prepare: Prepare) -> Result<IlpResult, LinkError> {
        self.sent.lock().push(prepare);
        if self.reject {
            Ok(Err(RejectBuilder {
                code: ErrorCode::T02_PEER_BUSY,
                message: b"busy",
                triggered_by: None,
                data: &[],
            }
            .build()))
        } else {
            Ok(Ok(CCP_RESPONSE.clone()))
        }
    }
}

pub async fn recording_link(connected: bool, reject: bool) -> (Arc<Link>, Arc<Mutex<Vec<Prepare>>>) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let link = Link::new(
        operator_address(),
        LinkSettings::new(LinkType::loopback()),
        RecordingTransport {
            sent: sent.clone(),
            reject,
        },
    );
    if connected {
        link.connect().await.unwrap();
    }
    (Arc::new(link), sent)
}

pub struct SenderHarness {
    pub routing_table: Arc<ForwardingRoutingTable>,
    pub link: Arc<Link>,
    pub accounts: InMemoryAccountSettingsStore,
    pub settings: GlobalRoutingSettings,
    sent: Arc<Mutex<Vec<Prepare>>>,
}

impl SenderHarness {
    async fn build(
        relationship: AccountRelationship,
        settings: GlobalRoutingSettings,
        connected: bool,
        reject: bool,
    ) -> Self {
        let (link, sent) = recording_link(connected, reject).await;
        SenderHarness {
            routing_table: Arc::new(ForwardingRoutingTable::new()),
            link,
            accounts: accounts(relationship),
            settings,
            sent,
        }
    }

    pub async fn new(relationship: AccountRelationship) -> Self {
        Self::build(relationship, GlobalRoutingSettings::default(), true, false).await
    }

    pub async fn with_max_epochs(relationship: AccountRelationship, max_epochs: u32) -> Self {
        let settings = GlobalRoutingSettings {
            max_epochs_per_routing_table: max_epochs,
            ..GlobalRoutingSettings::default()
        };
        Self::build(relationship, settings, true, false).await
    }

    pub async fn rejecting(relationship: AccountRelationship) -> Self {
        Self::build(relationship, GlobalRoutingSettings::default(), true, true).await
    }

    pub async fn disconnected(relationship: AccountRelationship) -> Self {
        Self::build(relationship, GlobalRoutingSettings::default(), false, false).await
    }

    /// Disconnected, broadcasting every `interval_ms` once started.
    pub async fn disconnected_with_interval(
        relationship: AccountRelationship,
        interval_ms: u64,
    ) -> Self {
        let settings = GlobalRoutingSettings {
            route_broadcast_interval_ms: interval_ms,
            ..GlobalRoutingSettings::default()
        };
        Self::build(relationship, settings, false, false).await
    }

    pub fn sender(&self) -> CcpSender {
        CcpSender::new(
            AccountId::new("peer"),
            self.link.clone(),
            self.routing_table.clone(),
            Arc::new(self.accounts.clone()),
            self.settings.clone(),
            operator_address(),
        )
    }

    pub fn sent(&self) -> Vec<Prepare> {
        self.sent.lock().clone()
    }

    pub fn sent_updates(&self) -> Vec<RouteUpdateRequest> {
        self.sent()
            .iter()
            .map(|prepare| RouteUpdateRequest::try_from(prepare).unwrap())
            .collect()
    }
}
