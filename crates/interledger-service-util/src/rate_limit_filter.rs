use crate::{PacketRejector, PacketSwitchFilter, PacketSwitchFilterChain};

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use interledger_packet::{ErrorCode, Prepare};
use interledger_service::{AccountId, AccountSettings, IlpResult};
use parking_lot::Mutex;
use tracing::{debug, warn};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct AccountLimiter {
    max_packets_per_second: u32,
    limiter: Option<Arc<DirectRateLimiter>>,
}

impl AccountLimiter {
    /// A limit of zero lets nothing through.
    fn new(max_packets_per_second: u32) -> Self {
        let limiter = NonZeroU32::new(max_packets_per_second)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));
        AccountLimiter {
            max_packets_per_second,
            limiter,
        }
    }
}

/// # Rate Limit Filter
///
/// Caps the number of packets per second each account may send, with one
/// `governor` limiter per account sized by its `max_packets_per_second`.
/// Packets over the limit are rejected with `T05`. Accounts without a limit
/// are not tracked.
pub struct RateLimitFilter {
    rejector: PacketRejector,
    limiters: Mutex<HashMap<AccountId, AccountLimiter>>,
}

impl RateLimitFilter {
    pub fn new(rejector: PacketRejector) -> Self {
        RateLimitFilter {
            rejector,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    fn try_acquire(&self, account_id: &AccountId, max_packets_per_second: u32) -> bool {
        let limiter = {
            let mut limiters = self.limiters.lock();
            let entry = limiters
                .entry(account_id.clone())
                .or_insert_with(|| AccountLimiter::new(max_packets_per_second));
            if entry.max_packets_per_second != max_packets_per_second {
                debug!(
                    "Rate limit for account {} changed to {} packets per second",
                    account_id, max_packets_per_second
                );
                *entry = AccountLimiter::new(max_packets_per_second);
            }
            entry.limiter.clone()
        };
        limiter.map_or(false, |limiter| limiter.check().is_ok())
    }
}

#[async_trait]
impl PacketSwitchFilter for RateLimitFilter {
    async fn do_filter(
        &self,
        source_account: &AccountSettings,
        prepare: Prepare,
        chain: PacketSwitchFilterChain,
    ) -> IlpResult {
        if let Some(limit) = source_account.rate_limit.max_packets_per_second {
            if !self.try_acquire(&source_account.id, limit) {
                warn!(
                    "Account {} exceeded its limit of {} packets per second",
                    source_account.id, limit
                );
                return Err(self.rejector.reject(
                    &source_account.id,
                    &prepare,
                    ErrorCode::T05_RATE_LIMITED,
                    "Too many packets per second",
                ));
            }
        }
        chain.do_filter(source_account, prepare).await
    }
}
