use crate::PacketForwarder;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use interledger_packet::{
    Address, ErrorCode, FulfillBuilder, Prepare, PrepareBuilder, Reject, RejectBuilder,
};
use interledger_service::{
    AccountId, AccountRelationship, AccountSettings, IlpResult, LinkType,
};
use once_cell::sync::Lazy;
use ring::digest::{digest, SHA256};

pub static FULFILLMENT: [u8; 32] = [7; 32];

pub static CONDITION: Lazy<[u8; 32]> = Lazy::new(|| {
    let mut condition = [0; 32];
    condition.copy_from_slice(digest(&SHA256, &FULFILLMENT).as_ref());
    condition
});

pub fn test_account() -> AccountSettings {
    AccountSettings::new(
        AccountId::new("alice"),
        AccountRelationship::Peer,
        LinkType::loopback(),
    )
}

pub fn prepare_expiring_in(millis: u64, amount: u64) -> Prepare {
    PrepareBuilder {
        amount,
        expires_at: SystemTime::now() + Duration::from_millis(millis),
        execution_condition: &CONDITION,
        destination: Address::new("example.bob"),
        data: b"test data",
    }
    .build()
}

pub fn test_reject(code: ErrorCode) -> Reject {
    RejectBuilder {
        code,
        message: b"test reject",
        triggered_by: Some(&Address::new("example.downstream")),
        data: &[],
    }
    .build()
}

enum Behavior {
    Fulfill([u8; 32]),
    Reject(ErrorCode),
    Sleep(Duration),
    Panic,
}

/// Forwarder that counts how often the chain reached it.
pub struct CountingForwarder {
    calls: AtomicUsize,
    completed: AtomicUsize,
    behavior: Behavior,
}

impl CountingForwarder {
    fn with_behavior(behavior: Behavior) -> Arc<Self> {
        Arc::new(CountingForwarder {
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            behavior,
        })
    }

    pub fn fulfilling() -> Arc<Self> {
        Self::with_behavior(Behavior::Fulfill(FULFILLMENT))
    }

    pub fn fulfilling_with(fulfillment: [u8; 32]) -> Arc<Self> {
        Self::with_behavior(Behavior::Fulfill(fulfillment))
    }

    pub fn rejecting(code: ErrorCode) -> Arc<Self> {
        Self::with_behavior(Behavior::Reject(code))
    }

    /// Fulfills after sleeping for `delay`.
    pub fn sleeping(delay: Duration) -> Arc<Self> {
        Self::with_behavior(Behavior::Sleep(delay))
    }

    pub fn panicking() -> Arc<Self> {
        Self::with_behavior(Behavior::Panic)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PacketForwarder for CountingForwarder {
    async fn forward(&self, _source_account: &AccountSettings, _prepare: Prepare) -> IlpResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = match self.behavior {
            Behavior::Fulfill(fulfillment) => Ok(FulfillBuilder {
                fulfillment: &fulfillment,
                data: b"downstream",
            }
            .build()),
            Behavior::Reject(code) => Err(test_reject(code)),
            Behavior::Sleep(delay) => {
                tokio::time::sleep(delay).await;
                Ok(FulfillBuilder {
                    fulfillment: &FULFILLMENT,
                    data: &[],
                }
                .build())
            }
            Behavior::Panic => panic!("forwarder blew up"),
        };
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}
