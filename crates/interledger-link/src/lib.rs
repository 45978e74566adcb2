//! # interledger-link
//!
//! A [`Link`] is the connector's stateful connection to one peer account.
//! It owns the connection flag, at most one registered [`LinkHandler`] for
//! packets arriving from the peer, and a list of lifecycle listeners. The
//! transport-specific parts (how to connect, disconnect and carry a Prepare
//! to the peer) are supplied by a [`LinkTransport`].
//!
//! Link types shipped here: [`loopback`] (fulfills everything), ping
//! loopback (answers ping-protocol packets) and [`http`] (ILP-over-HTTP with
//! bearer tokens).

mod error;
mod events;
mod factory;
pub mod http;
mod link;
pub mod loopback;
mod settings;

pub use self::error::LinkError;
pub use self::events::{LinkEvent, LinkEventEmitter, LinkEventListener};
pub use self::factory::{LinkFactory, LinkFactoryProvider};
pub use self::link::{Link, LinkHandler, LinkId, LinkTransport};
pub use self::settings::{DefaultLinkSettingsFactory, LinkSettings, LinkSettingsFactory};
