use crate::{LinkError, LinkEvent, LinkEventEmitter, LinkEventListener, LinkSettings};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use interledger_packet::Prepare;
use interledger_service::{AccountId, IlpResult, OperatorAddress};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

/// Identifies a link. Links are bound to an account, so the id is usually
/// the account id.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(String);

impl LinkId {
    pub fn of<S: Into<String>>(value: S) -> Self {
        LinkId(value.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&AccountId> for LinkId {
    fn from(account_id: &AccountId) -> Self {
        LinkId(account_id.as_str().to_owned())
    }
}

impl fmt::Debug for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LinkId({})", self.0)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Receives the Prepare packets a peer sends over a link.
#[async_trait]
pub trait LinkHandler: Send + Sync {
    async fn handle_incoming_packet(&self, link_id: &LinkId, prepare: Prepare) -> IlpResult;
}

/// The transport-specific half of a link.
///
/// `do_connect` and `do_disconnect` are only ever invoked by the [`Link`]
/// that owns the transport, and never twice for the same transition.
#[async_trait]
pub trait LinkTransport: Send + Sync {
    async fn do_connect(&self) -> Result<(), LinkError>;

    async fn do_disconnect(&self) -> Result<(), LinkError>;

    /// Carries `prepare` to the peer and returns the peer's answer.
    async fn send_packet(&self, prepare: Prepare) -> Result<IlpResult, LinkError>;
}

const NOT_CONNECTED: bool = false;
const CONNECTED: bool = true;

pub struct Link {
    link_id: OnceCell<LinkId>,
    settings: LinkSettings,
    operator_address: OperatorAddress,
    connected: AtomicBool,
    handler: Mutex<Option<Arc<dyn LinkHandler>>>,
    events: LinkEventEmitter,
    transport: Box<dyn LinkTransport>,
}

impl Link {
    pub fn new<T>(operator_address: OperatorAddress, settings: LinkSettings, transport: T) -> Self
    where
        T: LinkTransport + 'static,
    {
        Link {
            link_id: OnceCell::new(),
            settings,
            operator_address,
            connected: AtomicBool::new(NOT_CONNECTED),
            handler: Mutex::new(None),
            events: LinkEventEmitter::new(),
            transport: Box::new(transport),
        }
    }

    pub fn link_id(&self) -> Option<&LinkId> {
        self.link_id.get()
    }

    /// Binds this link to an id. May only succeed once per link.
    pub fn set_link_id(&self, link_id: LinkId) -> Result<(), LinkError> {
        self.link_id
            .set(link_id)
            .map_err(|attempted| LinkError::LinkIdAlreadySet {
                current: self.link_id.get().cloned().unwrap_or_else(|| attempted.clone()),
                attempted,
            })
    }

    pub fn link_settings(&self) -> &LinkSettings {
        &self.settings
    }

    pub fn operator_address(&self) -> &OperatorAddress {
        &self.operator_address
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Connects the link. Concurrent or repeated calls are no-ops for all
    /// but the caller that flips the flag, so the transport only ever sees
    /// one connect attempt per transition.
    ///
    /// On failure the flag is rolled back, an [`LinkEvent::Error`] is emitted,
    /// the transport is asked to tear down whatever it managed to set up, and
    /// the error is returned.
    pub async fn connect(&self) -> Result<(), LinkError> {
        if self
            .connected
            .compare_exchange(NOT_CONNECTED, CONNECTED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(
                "[{}] (ILP Address: `{}`) already connected to `{}`",
                self.settings.link_type(),
                self.operator_address_string(),
                self.link_id_string()
            );
            return Ok(());
        }

        debug!(
            "[{}] (ILP Address: `{}`) connecting to `{}`...",
            self.settings.link_type(),
            self.operator_address_string(),
            self.link_id_string()
        );
        match self.transport.do_connect().await {
            Ok(()) => {
                self.events.emit(LinkEvent::Connected {
                    link_id: self.link_id().cloned(),
                });
                info!(
                    "[{}] (Operator: `{}`) connected to remote `{}`",
                    self.settings.link_type(),
                    self.operator_address_string(),
                    self.link_id_string()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "[{}] (ILP Address: `{}`) was unable to connect to Link: `{}`: {}",
                    self.settings.link_type(),
                    self.operator_address_string(),
                    self.link_id_string(),
                    err
                );
                if let Err(teardown) = self.transport.do_disconnect().await {
                    warn!(
                        "Error tearing down link `{}` after a failed connect: {}",
                        self.link_id_string(),
                        teardown
                    );
                }
                self.connected.store(NOT_CONNECTED, Ordering::SeqCst);
                self.events.emit(LinkEvent::Error {
                    link_id: self.link_id().cloned(),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Disconnects the link. A no-op if the link is not connected.
    pub async fn disconnect(&self) -> Result<(), LinkError> {
        if self
            .connected
            .compare_exchange(CONNECTED, NOT_CONNECTED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(
                "[{}] (ILP Address: `{}`) already disconnected from `{}`",
                self.settings.link_type(),
                self.operator_address_string(),
                self.link_id_string()
            );
            return Ok(());
        }

        debug!(
            "[{}] (ILP Address: `{}`) disconnecting from `{}`...",
            self.settings.link_type(),
            self.operator_address_string(),
            self.link_id_string()
        );
        match self.transport.do_disconnect().await {
            Ok(()) => {
                self.events.emit(LinkEvent::Disconnected {
                    link_id: self.link_id().cloned(),
                });
                debug!(
                    "[{}] (ILP Address: `{}`) disconnected from `{}`",
                    self.settings.link_type(),
                    self.operator_address_string(),
                    self.link_id_string()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "[{}] `{}` error while trying to disconnect from `{}`: {}",
                    self.settings.link_type(),
                    self.operator_address_string(),
                    self.link_id_string(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Registers the handler for packets arriving from the peer. Only one
    /// handler may be registered at a time.
    pub fn register_link_handler(&self, handler: Arc<dyn LinkHandler>) -> Result<(), LinkError> {
        let mut slot = self.handler.lock();
        if slot.is_some() {
            return Err(LinkError::HandlerAlreadyRegistered(self.link_id().cloned()));
        }
        *slot = Some(handler);
        Ok(())
    }

    pub fn unregister_link_handler(&self) {
        self.handler.lock().take();
    }

    pub fn link_handler(&self) -> Option<Arc<dyn LinkHandler>> {
        self.handler.lock().clone()
    }

    pub fn add_link_event_listener(&self, listener: Arc<dyn LinkEventListener>) {
        self.events.add_listener(listener);
    }

    pub fn remove_link_event_listener(&self, listener: &Arc<dyn LinkEventListener>) {
        self.events.remove_listener(listener);
    }

    /// Sends a Prepare to the peer. A transport error means the peer's
    /// answer is unknown; routing code treats it like a reject.
    pub async fn send_packet(&self, prepare: Prepare) -> Result<IlpResult, LinkError> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected(self.link_id().cloned()));
        }
        trace!(
            "Sending packet over link `{}`: {:?}",
            self.link_id_string(),
            prepare
        );
        self.transport.send_packet(prepare).await
    }

    /// Hands a Prepare received from the peer to the registered handler.
    pub async fn handle_incoming_packet(&self, prepare: Prepare) -> Result<IlpResult, LinkError> {
        let link_id = self.link_id().cloned().ok_or(LinkError::LinkIdNotSet)?;
        let handler = self
            .link_handler()
            .ok_or_else(|| LinkError::NoHandlerRegistered(Some(link_id.clone())))?;
        Ok(handler.handle_incoming_packet(&link_id, prepare).await)
    }

    fn operator_address_string(&self) -> String {
        self.operator_address
            .get()
            .map(|address| address.to_string())
            .unwrap_or_else(|| "unset".to_owned())
    }

    fn link_id_string(&self) -> &str {
        self.link_id().map(LinkId::as_str).unwrap_or("unset")
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Link")
            .field("link_id", &self.link_id())
            .field("settings", &self.settings)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interledger_packet::{Address, ErrorCode, FulfillBuilder, PrepareBuilder, RejectBuilder};
    use interledger_service::LinkType;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, SystemTime};

    #[derive(Default)]
    struct CountingTransport {
        connects: Arc<AtomicUsize>,
        disconnects: Arc<AtomicUsize>,
        fail_connect: bool,
    }

    #[async_trait]
    impl LinkTransport for CountingTransport {
        async fn do_connect(&self) -> Result<(), LinkError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail_connect {
                Err(LinkError::ConnectFailed("refused".to_owned()))
            } else {
                Ok(())
            }
        }

        async fn do_disconnect(&self) -> Result<(), LinkError> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(())
        }

        async fn send_packet(&self, _prepare: Prepare) -> Result<IlpResult, LinkError> {
            Ok(Ok(FulfillBuilder {
                fulfillment: &[0; 32],
                data: &[],
            }
            .build()))
        }
    }

    struct RejectingHandler;

    #[async_trait]
    impl LinkHandler for RejectingHandler {
        async fn handle_incoming_packet(&self, link_id: &LinkId, _prepare: Prepare) -> IlpResult {
            Err(RejectBuilder {
                code: ErrorCode::F02_UNREACHABLE,
                message: link_id.as_str().as_bytes(),
                triggered_by: None,
                data: &[],
            }
            .build())
        }
    }

    fn test_link(transport: CountingTransport) -> Arc<Link> {
        let link = Link::new(
            OperatorAddress::default(),
            LinkSettings::new(LinkType::loopback()),
            transport,
        );
        link.set_link_id(LinkId::of("alice")).unwrap();
        Arc::new(link)
    }

    fn recorder(link: &Link) -> Arc<Mutex<Vec<LinkEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        link.add_link_event_listener(Arc::new(move |event: &LinkEvent| {
            sink.lock().push(event.clone())
        }));
        events
    }

    fn prepare() -> Prepare {
        PrepareBuilder {
            amount: 10,
            expires_at: SystemTime::now() + Duration::from_secs(30),
            execution_condition: &[0; 32],
            destination: Address::new("example.bob"),
            data: &[],
        }
        .build()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_connects_run_the_transport_once() {
        let transport = CountingTransport::default();
        let connects = transport.connects.clone();
        let link = test_link(transport);
        let events = recorder(&link);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let link = link.clone();
                tokio::spawn(async move { link.connect().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert!(link.is_connected());
        assert_eq!(
            *events.lock(),
            vec![LinkEvent::Connected {
                link_id: Some(LinkId::of("alice"))
            }]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_disconnects_run_the_transport_once() {
        let transport = CountingTransport::default();
        let disconnects = transport.disconnects.clone();
        let link = test_link(transport);
        link.connect().await.unwrap();
        let events = recorder(&link);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let link = link.clone();
                tokio::spawn(async move { link.disconnect().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert!(!link.is_connected());
        assert_eq!(
            *events.lock(),
            vec![LinkEvent::Disconnected {
                link_id: Some(LinkId::of("alice"))
            }]
        );
    }

    #[tokio::test]
    async fn sequential_connects_and_disconnects_are_idempotent() {
        let transport = CountingTransport::default();
        let connects = transport.connects.clone();
        let disconnects = transport.disconnects.clone();
        let link = test_link(transport);

        link.connect().await.unwrap();
        link.connect().await.unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert!(link.is_connected());

        link.disconnect().await.unwrap();
        link.disconnect().await.unwrap();
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn failed_connect_rolls_back_and_emits_error() {
        let transport = CountingTransport {
            fail_connect: true,
            ..Default::default()
        };
        let disconnects = transport.disconnects.clone();
        let link = test_link(transport);
        let events = recorder(&link);

        let err = link.connect().await.unwrap_err();
        assert!(matches!(err, LinkError::ConnectFailed(_)));
        assert!(!link.is_connected());
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert!(matches!(events.lock()[..], [LinkEvent::Error { .. }]));

        // Nothing to tear down, so a disconnect is a no-op
        link.disconnect().await.unwrap();
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn link_id_can_only_be_set_once() {
        let link = test_link(CountingTransport::default());
        match link.set_link_id(LinkId::of("bob")) {
            Err(LinkError::LinkIdAlreadySet { current, attempted }) => {
                assert_eq!(current, LinkId::of("alice"));
                assert_eq!(attempted, LinkId::of("bob"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(link.link_id(), Some(&LinkId::of("alice")));
    }

    #[tokio::test]
    async fn only_one_handler_may_be_registered() {
        let link = test_link(CountingTransport::default());
        link.register_link_handler(Arc::new(RejectingHandler)).unwrap();

        match link.register_link_handler(Arc::new(RejectingHandler)) {
            Err(LinkError::HandlerAlreadyRegistered(Some(id))) => {
                assert_eq!(id, LinkId::of("alice"))
            }
            other => panic!("unexpected result: {:?}", other),
        }

        link.unregister_link_handler();
        assert!(link.link_handler().is_none());
        link.register_link_handler(Arc::new(RejectingHandler)).unwrap();

        let reject = link.handle_incoming_packet(prepare()).await.unwrap().unwrap_err();
        assert_eq!(reject.message(), b"alice");
    }

    #[tokio::test]
    async fn incoming_packets_need_a_handler() {
        let link = test_link(CountingTransport::default());
        assert!(matches!(
            link.handle_incoming_packet(prepare()).await,
            Err(LinkError::NoHandlerRegistered(_))
        ));
    }

    #[tokio::test]
    async fn sending_requires_a_connection() {
        let link = test_link(CountingTransport::default());
        assert!(matches!(
            link.send_packet(prepare()).await,
            Err(LinkError::NotConnected(Some(_)))
        ));
        link.connect().await.unwrap();
        assert!(link.send_packet(prepare()).await.unwrap().is_ok());
    }
}
