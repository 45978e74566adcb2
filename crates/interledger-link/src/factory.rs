use crate::http::HttpLinkFactory;
use crate::loopback::{LoopbackLinkFactory, PingLoopbackLinkFactory};
use crate::{Link, LinkError, LinkSettings};

use std::sync::Arc;

use interledger_service::{LinkType, OperatorAddress};
use tracing::debug;

/// Builds links of the types it supports.
pub trait LinkFactory: Send + Sync {
    fn supports(&self, link_type: &LinkType) -> bool;

    fn construct_link(
        &self,
        operator_address: OperatorAddress,
        link_settings: LinkSettings,
    ) -> Result<Link, LinkError>;
}

/// Dispatches link construction to the first registered factory that
/// supports the requested link type.
#[derive(Clone, Default)]
pub struct LinkFactoryProvider {
    factories: Vec<Arc<dyn LinkFactory>>,
}

impl LinkFactoryProvider {
    pub fn new() -> Self {
        LinkFactoryProvider::default()
    }

    /// A provider for the loopback, ping loopback and ILP-over-HTTP link types.
    pub fn with_default_factories() -> Self {
        let mut provider = LinkFactoryProvider::new();
        provider.register(Arc::new(LoopbackLinkFactory));
        provider.register(Arc::new(PingLoopbackLinkFactory));
        provider.register(Arc::new(HttpLinkFactory::default()));
        provider
    }

    pub fn register(&mut self, factory: Arc<dyn LinkFactory>) {
        self.factories.push(factory);
    }

    pub fn supports(&self, link_type: &LinkType) -> bool {
        self.factory_for(link_type).is_some()
    }

    pub fn construct_link(
        &self,
        operator_address: OperatorAddress,
        link_settings: LinkSettings,
    ) -> Result<Link, LinkError> {
        let factory = self
            .factory_for(link_settings.link_type())
            .ok_or_else(|| LinkError::UnsupportedLinkType(link_settings.link_type().clone()))?;
        debug!("Constructing {} link", link_settings.link_type());
        factory.construct_link(operator_address, link_settings)
    }

    fn factory_for(&self, link_type: &LinkType) -> Option<&Arc<dyn LinkFactory>> {
        self.factories
            .iter()
            .find(|factory| factory.supports(link_type))
    }
}
