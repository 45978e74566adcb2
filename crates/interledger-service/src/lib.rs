//! Types shared by every part of the connector: account identifiers and
//! settings, the account settings lookup, connector-wide settings and the
//! result type of forwarding a Prepare packet.

mod account;
mod account_id;
mod settings;
pub mod trace;

pub use self::account::{
    AccountRelationship, AccountSettings, AccountSettingsStore, CustomSettings,
    InMemoryAccountSettingsStore, LinkType, RateLimitSettings,
};
pub use self::account_id::AccountId;
pub use self::settings::{
    ConnectorSettings, GlobalRoutingSettings, OperatorAddress, StaticRoute,
    UNSET_OPERATOR_ADDRESS,
};

use interledger_packet::{Fulfill, Reject};

/// The outcome of forwarding a Prepare: the peer either fulfilled or rejected it.
pub type IlpResult = Result<Fulfill, Reject>;
