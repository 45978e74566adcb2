use crate::LinkId;
use interledger_service::LinkType;

fn describe(link_id: &Option<LinkId>) -> &str {
    link_id.as_ref().map(LinkId::as_str).unwrap_or("unset")
}

/// Failures of the link layer. Protocol-level rejections are not errors:
/// they travel as the `Reject` half of an `IlpResult`.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("DataHandler may not be registered twice on link `{}`. Call unregister_link_handler first!", describe(.0))]
    HandlerAlreadyRegistered(Option<LinkId>),
    #[error("LinkId may only be set once (link `{current}`, attempted `{attempted}`)")]
    LinkIdAlreadySet { current: LinkId, attempted: LinkId },
    #[error("link has no LinkId; set one before exchanging packets")]
    LinkIdNotSet,
    #[error("no link handler registered on link `{}`", describe(.0))]
    NoHandlerRegistered(Option<LinkId>),
    #[error("link `{}` is not connected", describe(.0))]
    NotConnected(Option<LinkId>),
    #[error("Unsupported LinkType: {0:?}")]
    UnsupportedLinkType(LinkType),
    #[error("invalid link settings: {0}")]
    InvalidSettings(String),
    #[error("unable to connect: {0}")]
    ConnectFailed(String),
    #[error("unable to disconnect: {0}")]
    DisconnectFailed(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl LinkError {
    /// True for errors that indicate a wiring bug rather than a network
    /// condition: these should never be retried.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            LinkError::HandlerAlreadyRegistered(_)
                | LinkError::LinkIdAlreadySet { .. }
                | LinkError::LinkIdNotSet
        )
    }
}
