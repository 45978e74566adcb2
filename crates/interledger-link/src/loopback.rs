//! Links that answer locally instead of talking to a remote peer.
//!
//! The loopback link fulfills every Prepare (or rejects it with a configured
//! code, which is handy for exercising error paths). The ping loopback link
//! only fulfills ping-protocol packets.

use crate::{Link, LinkError, LinkFactory, LinkSettings, LinkTransport};

use std::str::FromStr;

use async_trait::async_trait;
use interledger_packet::{ErrorCode, FulfillBuilder, Prepare, RejectBuilder};
use interledger_service::{IlpResult, LinkType, OperatorAddress};
use once_cell::sync::Lazy;
use ring::digest::{digest, SHA256};
use tracing::debug;

/// Custom setting naming the error code a loopback link should reject with.
pub const SIMULATED_REJECT_ERROR_CODE: &str = "simulatedRejectErrorCode";

pub const LOOPBACK_FULFILLMENT: [u8; 32] = [0; 32];

pub const PING_PROTOCOL_FULFILLMENT: [u8; 32] = *b"pingpingpingpingpingpingpingping";

pub static PING_PROTOCOL_CONDITION: Lazy<[u8; 32]> = Lazy::new(|| {
    let mut condition = [0; 32];
    condition.copy_from_slice(digest(&SHA256, &PING_PROTOCOL_FULFILLMENT).as_ref());
    condition
});

pub struct LoopbackTransport {
    operator_address: OperatorAddress,
    simulated_reject: Option<ErrorCode>,
}

impl LoopbackTransport {
    pub fn new(operator_address: OperatorAddress, link_settings: &LinkSettings) -> Result<Self, LinkError> {
        let simulated_reject = match link_settings.custom_settings().get(SIMULATED_REJECT_ERROR_CODE) {
            Some(code) => Some(ErrorCode::from_str(code).map_err(LinkError::InvalidSettings)?),
            None => None,
        };
        Ok(LoopbackTransport {
            operator_address,
            simulated_reject,
        })
    }
}

#[async_trait]
impl LinkTransport for LoopbackTransport {
    async fn do_connect(&self) -> Result<(), LinkError> {
        Ok(())
    }

    async fn do_disconnect(&self) -> Result<(), LinkError> {
        Ok(())
    }

    async fn send_packet(&self, prepare: Prepare) -> Result<IlpResult, LinkError> {
        if let Some(code) = self.simulated_reject {
            debug!("Loopback link rejecting packet with simulated error {}", code);
            let address = self.operator_address.get_or_unset();
            return Ok(Err(RejectBuilder {
                code,
                message: b"Loopback set to manually reject via simulate_reject=true",
                triggered_by: Some(&address),
                data: &[],
            }
            .build()));
        }
        Ok(Ok(FulfillBuilder {
            fulfillment: &LOOPBACK_FULFILLMENT,
            data: prepare.data(),
        }
        .build()))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LoopbackLinkFactory;

impl LinkFactory for LoopbackLinkFactory {
    fn supports(&self, link_type: &LinkType) -> bool {
        link_type.value() == LinkType::LOOPBACK
    }

    fn construct_link(
        &self,
        operator_address: OperatorAddress,
        link_settings: LinkSettings,
    ) -> Result<Link, LinkError> {
        if !self.supports(link_settings.link_type()) {
            return Err(LinkError::UnsupportedLinkType(link_settings.link_type().clone()));
        }
        let transport = LoopbackTransport::new(operator_address.clone(), &link_settings)?;
        Ok(Link::new(operator_address, link_settings, transport))
    }
}

/// Fulfills packets locked with the ping condition and rejects all others.
pub struct PingLoopbackTransport {
    operator_address: OperatorAddress,
}

#[async_trait]
impl LinkTransport for PingLoopbackTransport {
    async fn do_connect(&self) -> Result<(), LinkError> {
        Ok(())
    }

    async fn do_disconnect(&self) -> Result<(), LinkError> {
        Ok(())
    }

    async fn send_packet(&self, prepare: Prepare) -> Result<IlpResult, LinkError> {
        if prepare.execution_condition() == &*PING_PROTOCOL_CONDITION {
            Ok(Ok(FulfillBuilder {
                fulfillment: &PING_PROTOCOL_FULFILLMENT,
                data: &[],
            }
            .build()))
        } else {
            let address = self.operator_address.get_or_unset();
            Ok(Err(RejectBuilder {
                code: ErrorCode::F05_WRONG_CONDITION,
                message: b"Ping packets must use the ping protocol condition",
                triggered_by: Some(&address),
                data: &[],
            }
            .build()))
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PingLoopbackLinkFactory;

impl LinkFactory for PingLoopbackLinkFactory {
    fn supports(&self, link_type: &LinkType) -> bool {
        link_type.value() == LinkType::PING_LOOPBACK
    }

    fn construct_link(
        &self,
        operator_address: OperatorAddress,
        link_settings: LinkSettings,
    ) -> Result<Link, LinkError> {
        if !self.supports(link_settings.link_type()) {
            return Err(LinkError::UnsupportedLinkType(link_settings.link_type().clone()));
        }
        let transport = PingLoopbackTransport {
            operator_address: operator_address.clone(),
        };
        Ok(Link::new(operator_address, link_settings, transport))
    }
}
