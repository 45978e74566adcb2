//! # interledger-service-util
//!
//! The packet switch. Every Prepare received from a peer passes through an
//! ordered chain of [`PacketSwitchFilter`]s, each of which either rejects the
//! packet (via the [`PacketRejector`]) or hands it to the rest of the chain.
//! The chain ends in a [`PacketForwarder`] that sends the packet on to the
//! next hop.

mod expiry_filter;
mod filter;
mod fulfillment_validator_filter;
mod max_packet_amount_filter;
mod packet_switch;
mod rate_limit_filter;
mod rejecter;
#[cfg(test)]
mod test_helpers;

pub use self::expiry_filter::ExpiryPacketFilter;
pub use self::filter::{PacketForwarder, PacketSwitchFilter, PacketSwitchFilterChain};
pub use self::fulfillment_validator_filter::FulfillmentValidatorFilter;
pub use self::max_packet_amount_filter::MaxPacketAmountFilter;
pub use self::packet_switch::{default_filters, PacketSwitch};
pub use self::rate_limit_filter::RateLimitFilter;
pub use self::rejecter::PacketRejector;
