use crate::{PacketRejector, PacketSwitchFilter, PacketSwitchFilterChain};

use async_trait::async_trait;
use interledger_packet::{ErrorCode, MaxPacketAmountDetails, Prepare};
use interledger_service::{AccountSettings, IlpResult};

/// # Max Packet Amount Filter
///
/// Limits the size of each packet a peer may send through this connector.
/// Oversized packets are rejected with `F08` and a [`MaxPacketAmountDetails`]
/// payload so the sender can split the payment. Accounts without a maximum
/// are not limited.
#[derive(Clone, Debug)]
pub struct MaxPacketAmountFilter {
    rejector: PacketRejector,
}

impl MaxPacketAmountFilter {
    pub fn new(rejector: PacketRejector) -> Self {
        MaxPacketAmountFilter { rejector }
    }
}

#[async_trait]
impl PacketSwitchFilter for MaxPacketAmountFilter {
    async fn do_filter(
        &self,
        source_account: &AccountSettings,
        prepare: Prepare,
        chain: PacketSwitchFilterChain,
    ) -> IlpResult {
        if let Some(max_amount) = source_account.maximum_packet_amount {
            if prepare.amount() > max_amount {
                let details = MaxPacketAmountDetails::new(prepare.amount(), max_amount).to_bytes();
                let message = format!(
                    "Packet size too large: maxAmount={} actualAmount={}",
                    max_amount,
                    prepare.amount()
                );
                return Err(self.rejector.reject_with_data(
                    &source_account.id,
                    &prepare,
                    ErrorCode::F08_AMOUNT_TOO_LARGE,
                    &message,
                    &details,
                ));
            }
        }
        chain.do_filter(source_account, prepare).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use std::sync::Arc;

    fn chain_to(forwarder: Arc<CountingForwarder>) -> PacketSwitchFilterChain {
        PacketSwitchFilterChain::new(
            vec![Arc::new(MaxPacketAmountFilter::new(PacketRejector::default()))],
            forwarder,
        )
    }

    #[tokio::test]
    async fn rejects_oversized_packets() {
        let forwarder = CountingForwarder::fulfilling();
        let account = test_account().with_maximum_packet_amount(1_000_000);

        let reject = chain_to(forwarder.clone())
            .do_filter(&account, prepare_expiring_in(30_000, 2_000_000))
            .await
            .unwrap_err();
        assert_eq!(reject.code(), ErrorCode::F08_AMOUNT_TOO_LARGE);
        assert_eq!(
            reject.message(),
            &b"Packet size too large: maxAmount=1000000 actualAmount=2000000"[..]
        );
        let details = MaxPacketAmountDetails::from_bytes(reject.data()).unwrap();
        assert_eq!(details.amount_received(), 2_000_000);
        assert_eq!(details.max_amount(), 1_000_000);
        assert_eq!(forwarder.calls(), 0);
    }

    #[tokio::test]
    async fn forwards_packets_at_the_limit() {
        let forwarder = CountingForwarder::fulfilling();
        let account = test_account().with_maximum_packet_amount(1_000_000);
        assert!(chain_to(forwarder.clone())
            .do_filter(&account, prepare_expiring_in(30_000, 1_000_000))
            .await
            .is_ok());
        assert_eq!(forwarder.calls(), 1);
    }

    #[tokio::test]
    async fn unlimited_without_a_maximum() {
        let forwarder = CountingForwarder::fulfilling();
        assert!(chain_to(forwarder.clone())
            .do_filter(&test_account(), prepare_expiring_in(30_000, u64::max_value()))
            .await
            .is_ok());
        assert_eq!(forwarder.calls(), 1);
    }
}
