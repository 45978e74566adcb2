use crate::{PacketRejector, PacketSwitchFilter, PacketSwitchFilterChain};

use async_trait::async_trait;
use interledger_packet::{ErrorCode, Prepare};
use interledger_service::{AccountSettings, IlpResult};
use ring::digest::{digest, SHA256};
use tracing::error;

/// Replaces any Fulfill whose fulfillment does not hash to the Prepare's
/// execution condition with an `F09` reject.
#[derive(Clone, Debug)]
pub struct FulfillmentValidatorFilter {
    rejector: PacketRejector,
}

impl FulfillmentValidatorFilter {
    pub fn new(rejector: PacketRejector) -> Self {
        FulfillmentValidatorFilter { rejector }
    }
}

#[async_trait]
impl PacketSwitchFilter for FulfillmentValidatorFilter {
    async fn do_filter(
        &self,
        source_account: &AccountSettings,
        prepare: Prepare,
        chain: PacketSwitchFilterChain,
    ) -> IlpResult {
        let condition = *prepare.execution_condition();
        let fulfill = chain.do_filter(source_account, prepare.clone()).await?;
        let generated = digest(&SHA256, fulfill.fulfillment());
        if generated.as_ref() == &condition[..] {
            Ok(fulfill)
        } else {
            error!(
                "Fulfillment did not match condition. Fulfillment: {}, hash: {}, actual condition: {}",
                hex::encode(fulfill.fulfillment()),
                hex::encode(generated),
                hex::encode(condition),
            );
            Err(self.rejector.reject(
                &source_account.id,
                &prepare,
                ErrorCode::F09_INVALID_PEER_RESPONSE,
                "Fulfillment did not match condition",
            ))
        }
    }
}
