use crate::RoutingTableId;

use interledger_link::LinkError;
use interledger_packet::ParseError;
use interledger_service::AccountId;

#[derive(Debug, thiserror::Error)]
pub enum CcpError {
    #[error("Invalid CCP message: {0}")]
    InvalidMessage(#[from] ParseError),
    #[error("Gap in routing table {routing_table_id}. Expected epoch: {expected_epoch}, got from_epoch: {from_epoch}")]
    EpochGap {
        routing_table_id: RoutingTableId,
        expected_epoch: u32,
        from_epoch: u32,
    },
    #[error("Account {0} not found")]
    AccountNotFound(AccountId),
    #[error("Route updates are not exchanged with account {0}")]
    NotRouting(AccountId),
    #[error("Unable to send CCP message: {0}")]
    Link(#[from] LinkError),
}
