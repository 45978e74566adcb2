use crate::{PacketRejector, PacketSwitchFilter, PacketSwitchFilterChain};

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use interledger_packet::{ErrorCode, Prepare};
use interledger_service::{AccountSettings, IlpResult};
use tracing::{debug, error};

const INSUFFICIENT_TIMEOUT_MESSAGE: &str = "The connector could not forward the payment, because the timeout was too low to subtract its safety margin";
const TIMED_OUT_MESSAGE: &str = "Transfer Timed-out";

/// # Expiry Filter
///
/// Rejects Prepares that have already expired (`R02`) and bounds the rest of
/// the chain by the time left until expiry. When the deadline passes first the
/// caller gets an `R00` reject; the downstream work is left running in the
/// background and its eventual result is dropped.
#[derive(Clone, Debug)]
pub struct ExpiryPacketFilter {
    rejector: PacketRejector,
}

impl ExpiryPacketFilter {
    pub fn new(rejector: PacketRejector) -> Self {
        ExpiryPacketFilter { rejector }
    }
}

#[async_trait]
impl PacketSwitchFilter for ExpiryPacketFilter {
    async fn do_filter(
        &self,
        source_account: &AccountSettings,
        prepare: Prepare,
        chain: PacketSwitchFilterChain,
    ) -> IlpResult {
        let remaining = prepare
            .expires_at()
            .duration_since(SystemTime::now())
            .unwrap_or_default();
        if remaining == Duration::from_secs(0) {
            return Err(self.rejector.reject(
                &source_account.id,
                &prepare,
                ErrorCode::R02_INSUFFICIENT_TIMEOUT,
                INSUFFICIENT_TIMEOUT_MESSAGE,
            ));
        }

        let owned_account = source_account.clone();
        let forwarded = prepare.clone();
        let downstream =
            tokio::spawn(async move { chain.do_filter(&owned_account, forwarded).await });

        match tokio::time::timeout(remaining, downstream).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                if join_error.is_panic() {
                    std::panic::resume_unwind(join_error.into_panic());
                }
                error!("Forwarding task was cancelled: {}", join_error);
                Err(self.rejector.reject(
                    &source_account.id,
                    &prepare,
                    ErrorCode::T00_INTERNAL_ERROR,
                    "Forwarding was cancelled",
                ))
            }
            Err(_) => {
                debug!(
                    "Packet expired after waiting {}ms for a response",
                    remaining.as_millis()
                );
                Err(self.rejector.reject(
                    &source_account.id,
                    &prepare,
                    ErrorCode::R00_TRANSFER_TIMED_OUT,
                    TIMED_OUT_MESSAGE,
                ))
            }
        }
    }
}
