use std::sync::Arc;

use async_trait::async_trait;
use interledger_packet::Prepare;
use interledger_service::{AccountSettings, IlpResult};

/// One stage of the packet switch.
///
/// A filter either answers the Prepare itself (normally with a Reject) or
/// passes it on with `chain.do_filter(..)`. It may also inspect or replace
/// whatever the rest of the chain returns.
#[async_trait]
pub trait PacketSwitchFilter: Send + Sync {
    async fn do_filter(
        &self,
        source_account: &AccountSettings,
        prepare: Prepare,
        chain: PacketSwitchFilterChain,
    ) -> IlpResult;
}

/// Terminal stage of the filter chain: sends the Prepare to the next hop.
#[async_trait]
pub trait PacketForwarder: Send + Sync {
    async fn forward(&self, source_account: &AccountSettings, prepare: Prepare) -> IlpResult;
}

/// The remainder of a filter chain, as seen by the filter currently running.
///
/// Cloning is cheap; each clone points at the same filters.
#[derive(Clone)]
pub struct PacketSwitchFilterChain {
    filters: Arc<[Arc<dyn PacketSwitchFilter>]>,
    position: usize,
    forwarder: Arc<dyn PacketForwarder>,
}

impl PacketSwitchFilterChain {
    pub fn new(filters: Vec<Arc<dyn PacketSwitchFilter>>, forwarder: Arc<dyn PacketForwarder>) -> Self {
        PacketSwitchFilterChain {
            filters: filters.into(),
            position: 0,
            forwarder,
        }
    }

    /// Number of filters not yet run.
    pub fn remaining(&self) -> usize {
        self.filters.len().saturating_sub(self.position)
    }

    /// Runs the next filter, or the forwarder once every filter has run.
    pub async fn do_filter(self, source_account: &AccountSettings, prepare: Prepare) -> IlpResult {
        match self.filters.get(self.position).cloned() {
            Some(filter) => {
                let next = PacketSwitchFilterChain {
                    filters: self.filters.clone(),
                    position: self.position + 1,
                    forwarder: self.forwarder.clone(),
                };
                filter.do_filter(source_account, prepare, next).await
            }
            None => self.forwarder.forward(source_account, prepare).await,
        }
    }
}
