use crate::{
    ExpiryPacketFilter, FulfillmentValidatorFilter, MaxPacketAmountFilter, PacketForwarder,
    PacketRejector, PacketSwitchFilter, PacketSwitchFilterChain, RateLimitFilter,
};

use std::sync::Arc;

use interledger_packet::{ErrorCode, Prepare};
use interledger_service::{
    trace::{incoming_span, trace_response},
    AccountId, AccountSettingsStore, IlpResult,
};
use tracing::Instrument;

/// The stock filters, outermost first: expiry, rate limit, max packet amount,
/// fulfillment validation.
pub fn default_filters(rejector: &PacketRejector) -> Vec<Arc<dyn PacketSwitchFilter>> {
    vec![
        Arc::new(ExpiryPacketFilter::new(rejector.clone())),
        Arc::new(RateLimitFilter::new(rejector.clone())),
        Arc::new(MaxPacketAmountFilter::new(rejector.clone())),
        Arc::new(FulfillmentValidatorFilter::new(rejector.clone())),
    ]
}

/// Entry point for Prepares arriving from any peer. Looks up the source
/// account and runs the packet through the filter chain.
#[derive(Clone)]
pub struct PacketSwitch {
    accounts: Arc<dyn AccountSettingsStore>,
    chain: PacketSwitchFilterChain,
    rejector: PacketRejector,
}

impl PacketSwitch {
    pub fn new(
        accounts: Arc<dyn AccountSettingsStore>,
        filters: Vec<Arc<dyn PacketSwitchFilter>>,
        forwarder: Arc<dyn PacketForwarder>,
        rejector: PacketRejector,
    ) -> Self {
        PacketSwitch {
            accounts,
            chain: PacketSwitchFilterChain::new(filters, forwarder),
            rejector,
        }
    }

    /// A switch using [`default_filters`].
    pub fn with_default_filters(
        accounts: Arc<dyn AccountSettingsStore>,
        forwarder: Arc<dyn PacketForwarder>,
        rejector: PacketRejector,
    ) -> Self {
        let filters = default_filters(&rejector);
        Self::new(accounts, filters, forwarder, rejector)
    }

    pub async fn switch_packet(&self, source_account_id: &AccountId, prepare: Prepare) -> IlpResult {
        let span = incoming_span(source_account_id, &prepare);
        async move {
            let result = match self.accounts.find_account_settings(source_account_id) {
                Some(source_account) => self.chain.clone().do_filter(&source_account, prepare).await,
                None => Err(self.rejector.reject(
                    source_account_id,
                    &prepare,
                    ErrorCode::F00_BAD_REQUEST,
                    &format!("Unknown source account: {}", source_account_id),
                )),
            };
            trace_response(&result);
            result
        }
        .instrument(span)
        .await
    }
}
