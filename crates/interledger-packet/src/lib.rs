//! Interledger packet serialization/deserialization.
//!
//! Contains the ILP address types, the standard error codes and the
//! Prepare/Fulfill/Reject packets together with their OER encoding.

mod address;
mod error;
mod errors;
pub mod oer;
mod packet;

pub use self::address::{Address, AddressError, AddressPrefix};
pub use self::error::{ErrorClass, ErrorCode};
pub use self::errors::{ParseError, PacketTypeError};

pub use self::packet::MaxPacketAmountDetails;
pub use self::packet::{Fulfill, Packet, PacketType, Prepare, Reject};
pub use self::packet::{FulfillBuilder, PrepareBuilder, RejectBuilder};
