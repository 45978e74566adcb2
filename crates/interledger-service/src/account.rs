use crate::AccountId;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// The business relationship with a peer account. Drives which routes are
/// advertised to, and accepted from, that peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AccountRelationship {
    /// The peer is our upstream provider
    Parent,
    /// Peered without a provider/customer relationship
    Peer,
    /// The peer is our customer
    Child,
}

impl AccountRelationship {
    pub fn is_parent(self) -> bool {
        self == AccountRelationship::Parent
    }

    pub fn is_peer(self) -> bool {
        self == AccountRelationship::Peer
    }

    pub fn is_child(self) -> bool {
        self == AccountRelationship::Child
    }

    pub fn is_peer_or_parent(self) -> bool {
        self != AccountRelationship::Child
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountRelationship::Parent => "PARENT",
            AccountRelationship::Peer => "PEER",
            AccountRelationship::Child => "CHILD",
        }
    }
}

impl FromStr for AccountRelationship {
    type Err = String;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string.to_ascii_uppercase().as_str() {
            "PARENT" => Ok(AccountRelationship::Parent),
            "PEER" => Ok(AccountRelationship::Peer),
            "CHILD" => Ok(AccountRelationship::Child),
            _ => Err(format!("Invalid account relationship: {}", string)),
        }
    }
}

impl std::convert::TryFrom<String> for AccountRelationship {
    type Error = String;

    fn try_from(string: String) -> Result<Self, Self::Error> {
        AccountRelationship::from_str(&string)
    }
}

impl From<AccountRelationship> for String {
    fn from(relationship: AccountRelationship) -> Self {
        relationship.as_str().to_owned()
    }
}

impl fmt::Display for AccountRelationship {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names the transport a link uses. Always stored upper-case so `loopback`
/// and `LOOPBACK` select the same link factory.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct LinkType(String);

impl LinkType {
    pub const LOOPBACK: &'static str = "LOOPBACK";
    pub const PING_LOOPBACK: &'static str = "PING_LOOPBACK";
    pub const ILP_OVER_HTTP: &'static str = "ILP_OVER_HTTP";

    pub fn of(value: &str) -> Self {
        LinkType(value.trim().to_uppercase())
    }

    pub fn loopback() -> Self {
        LinkType::of(Self::LOOPBACK)
    }

    pub fn ping_loopback() -> Self {
        LinkType::of(Self::PING_LOOPBACK)
    }

    pub fn ilp_over_http() -> Self {
        LinkType::of(Self::ILP_OVER_HTTP)
    }

    #[inline]
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl From<String> for LinkType {
    fn from(value: String) -> Self {
        LinkType::of(&value)
    }
}

impl From<&str> for LinkType {
    fn from(value: &str) -> Self {
        LinkType::of(value)
    }
}

impl From<LinkType> for String {
    fn from(link_type: LinkType) -> Self {
        link_type.0
    }
}

impl fmt::Debug for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LinkType({})", self.0)
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free-form, link-specific settings such as URLs and shared secrets.
///
/// Values may be secret, so `Debug` only ever prints the keys.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomSettings(BTreeMap<String, String>);

impl CustomSettings {
    pub fn new() -> Self {
        CustomSettings::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> std::iter::FromIterator<(K, V)> for CustomSettings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        CustomSettings(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Debug for CustomSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map()
            .entries(self.0.keys().map(|key| (key, "[redacted]")))
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default)]
    pub max_packets_per_second: Option<u32>,
}

/// Everything the connector knows about a peer account.
///
/// Owned by whatever loads the configuration; the connector only reads it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountSettings {
    pub id: AccountId,
    #[serde(default)]
    pub description: String,
    pub relationship: AccountRelationship,
    pub asset_code: String,
    pub asset_scale: u8,
    #[serde(default)]
    pub maximum_packet_amount: Option<u64>,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    pub link_type: LinkType,
    #[serde(default)]
    pub send_routes: Option<bool>,
    #[serde(default)]
    pub receive_routes: Option<bool>,
    #[serde(default)]
    pub custom_settings: CustomSettings,
}

impl AccountSettings {
    pub fn new(id: AccountId, relationship: AccountRelationship, link_type: LinkType) -> Self {
        AccountSettings {
            id,
            description: String::new(),
            relationship,
            asset_code: "XRP".to_owned(),
            asset_scale: 9,
            maximum_packet_amount: None,
            rate_limit: RateLimitSettings::default(),
            link_type,
            send_routes: None,
            receive_routes: None,
            custom_settings: CustomSettings::default(),
        }
    }

    pub fn with_maximum_packet_amount(mut self, maximum_packet_amount: u64) -> Self {
        self.maximum_packet_amount = Some(maximum_packet_amount);
        self
    }

    pub fn with_max_packets_per_second(mut self, max_packets_per_second: u32) -> Self {
        self.rate_limit.max_packets_per_second = Some(max_packets_per_second);
        self
    }

    pub fn with_custom_settings(mut self, custom_settings: CustomSettings) -> Self {
        self.custom_settings = custom_settings;
        self
    }

    pub fn with_asset(mut self, asset_code: &str, asset_scale: u8) -> Self {
        self.asset_code = asset_code.to_owned();
        self.asset_scale = asset_scale;
        self
    }

    /// Defaults to true for peers and children.
    pub fn should_send_routes(&self) -> bool {
        self.send_routes
            .unwrap_or_else(|| !self.relationship.is_parent())
    }

    /// Defaults to true for peers and parents.
    pub fn should_receive_routes(&self) -> bool {
        self.receive_routes
            .unwrap_or_else(|| !self.relationship.is_child())
    }
}

/// Read-only lookup of account settings, consulted once per packet and once
/// per route broadcast, so implementations must be cheap.
pub trait AccountSettingsStore: Send + Sync {
    fn find_account_settings(&self, account_id: &AccountId) -> Option<AccountSettings>;

    fn all_account_settings(&self) -> Vec<AccountSettings>;
}

impl<S: AccountSettingsStore + ?Sized> AccountSettingsStore for Arc<S> {
    fn find_account_settings(&self, account_id: &AccountId) -> Option<AccountSettings> {
        (**self).find_account_settings(account_id)
    }

    fn all_account_settings(&self) -> Vec<AccountSettings> {
        (**self).all_account_settings()
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAccountSettingsStore {
    accounts: Arc<RwLock<HashMap<AccountId, AccountSettings>>>,
}

impl InMemoryAccountSettingsStore {
    pub fn new<I>(accounts: I) -> Self
    where
        I: IntoIterator<Item = AccountSettings>,
    {
        let accounts = accounts
            .into_iter()
            .map(|account| (account.id.clone(), account))
            .collect();
        InMemoryAccountSettingsStore {
            accounts: Arc::new(RwLock::new(accounts)),
        }
    }

    /// Adds or replaces an account, returning the previous settings.
    pub fn insert(&self, account: AccountSettings) -> Option<AccountSettings> {
        self.accounts.write().insert(account.id.clone(), account)
    }

    pub fn remove(&self, account_id: &AccountId) -> Option<AccountSettings> {
        self.accounts.write().remove(account_id)
    }
}

impl AccountSettingsStore for InMemoryAccountSettingsStore {
    fn find_account_settings(&self, account_id: &AccountId) -> Option<AccountSettings> {
        self.accounts.read().get(account_id).cloned()
    }

    fn all_account_settings(&self) -> Vec<AccountSettings> {
        let mut accounts: Vec<AccountSettings> = self.accounts.read().values().cloned().collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        accounts
    }
}
