use interledger_link::LinkError;
use interledger_packet::AddressError;
use interledger_service::AccountId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error("Account {0} is configured more than once")]
    DuplicateAccount(AccountId),
    #[error("Static route for {prefix} points to unknown account {account_id}")]
    UnknownStaticRouteAccount { prefix: String, account_id: AccountId },
    #[error("Unable to set up link for account {account_id}: {source}")]
    Link {
        account_id: AccountId,
        #[source]
        source: LinkError,
    },
    #[error("Unable to derive an address for child account {account_id}: {source}")]
    ChildAddress {
        account_id: AccountId,
        #[source]
        source: AddressError,
    },
    #[error("Unable to generate a route secret")]
    RouteSecret,
    #[error("Node has already been started")]
    AlreadyStarted,
    #[error("Unable to install the log subscriber: {0}")]
    Logging(String),
}
