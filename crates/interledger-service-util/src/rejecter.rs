use interledger_packet::{ErrorCode, Prepare, Reject, RejectBuilder};
use interledger_service::{AccountId, OperatorAddress};
use tracing::warn;

/// Builds Reject packets on behalf of this connector.
///
/// Every reject is stamped with the operator address as `triggered_by`, or
/// with the unset-address placeholder while the connector has no address yet.
#[derive(Clone, Debug, Default)]
pub struct PacketRejector {
    operator_address: OperatorAddress,
}

impl PacketRejector {
    pub fn new(operator_address: OperatorAddress) -> Self {
        PacketRejector { operator_address }
    }

    pub fn operator_address(&self) -> &OperatorAddress {
        &self.operator_address
    }

    pub fn reject(
        &self,
        rejecting_account_id: &AccountId,
        prepare: &Prepare,
        code: ErrorCode,
        message: &str,
    ) -> Reject {
        self.reject_with_data(rejecting_account_id, prepare, code, message, &[])
    }

    pub fn reject_with_data(
        &self,
        rejecting_account_id: &AccountId,
        prepare: &Prepare,
        code: ErrorCode,
        message: &str,
        data: &[u8],
    ) -> Reject {
        let triggered_by = self.operator_address.get_or_unset();
        warn!(
            account.id = %rejecting_account_id,
            prepare.destination = %prepare.destination(),
            prepare.amount = prepare.amount(),
            reject.code = %code,
            "Rejecting packet: {}",
            message,
        );
        RejectBuilder {
            code,
            message: message.as_bytes(),
            triggered_by: Some(&triggered_by),
            data,
        }
        .build()
    }
}
