//! # interledger-ccp
//!
//! The Connector-to-Connector Protocol: how connectors tell each other which
//! address prefixes they can reach.
//!
//! This node's routes live in a [`ForwardingRoutingTable`] whose every
//! change is logged under an epoch. A [`CcpSender`] per peer streams new log
//! entries to that peer, and a [`CcpReceiver`] per peer applies the peer's
//! updates to the table. The [`RouteBroadcaster`] owns both, and the
//! [`CcpLinkHandler`] routes CCP messages arriving on a link to them.

mod broadcaster;
mod error;
#[cfg(test)]
mod fixtures;
mod handler;
pub mod packet;
mod receiver;
mod routing_table;
mod sender;
#[cfg(test)]
mod test_helpers;

pub use self::broadcaster::RouteBroadcaster;
pub use self::error::CcpError;
pub use self::handler::CcpLinkHandler;
pub use self::packet::Mode;
pub use self::receiver::CcpReceiver;
pub use self::routing_table::{ForwardingRoutingTable, Route, RouteUpdate, RoutingTableId};
pub use self::sender::CcpSender;
