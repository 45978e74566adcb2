//! # interledger-router
//!
//! The last stage of the packet switch. The [`Router`] asks its
//! [`RouteResolver`]s which account is the next hop for a Prepare's
//! destination and sends the packet over that account's link.
//!
//! Resolvers are consulted in order, so statically configured routes can be
//! given precedence over routes learned from peers.

mod link_registry;
mod resolver;
mod router;

pub use self::link_registry::LinkRegistry;
pub use self::resolver::{RouteResolver, StaticRoutingTable};
pub use self::router::Router;
