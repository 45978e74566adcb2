use crate::LinkError;

use interledger_service::{AccountSettings, CustomSettings, LinkType};

/// What a link factory needs to build a link: the link type and the
/// link-specific custom settings. The link type is upper-cased on
/// construction; custom settings are redacted from `Debug` output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkSettings {
    link_type: LinkType,
    custom_settings: CustomSettings,
}

impl LinkSettings {
    pub fn new(link_type: LinkType) -> Self {
        LinkSettings {
            link_type: LinkType::of(link_type.value()),
            custom_settings: CustomSettings::default(),
        }
    }

    pub fn with_custom_settings(mut self, custom_settings: CustomSettings) -> Self {
        self.custom_settings = custom_settings;
        self
    }

    pub fn link_type(&self) -> &LinkType {
        &self.link_type
    }

    pub fn custom_settings(&self) -> &CustomSettings {
        &self.custom_settings
    }
}

/// Derives [`LinkSettings`] from an account's configuration.
pub trait LinkSettingsFactory: Send + Sync {
    fn construct(&self, account_settings: &AccountSettings) -> Result<LinkSettings, LinkError>;
}

/// Supports the link types shipped with this crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultLinkSettingsFactory;

impl LinkSettingsFactory for DefaultLinkSettingsFactory {
    fn construct(&self, account_settings: &AccountSettings) -> Result<LinkSettings, LinkError> {
        let link_type = &account_settings.link_type;
        match link_type.value() {
            LinkType::LOOPBACK | LinkType::PING_LOOPBACK | LinkType::ILP_OVER_HTTP => {
                Ok(LinkSettings::new(link_type.clone())
                    .with_custom_settings(account_settings.custom_settings.clone()))
            }
            _ => Err(LinkError::UnsupportedLinkType(link_type.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interledger_service::{AccountId, AccountRelationship};

    fn account(link_type: &str) -> AccountSettings {
        AccountSettings::new(
            AccountId::new("foo"),
            AccountRelationship::Peer,
            LinkType::of(link_type),
        )
        .with_asset("XRP", 2)
    }

    #[test]
    fn rejects_unsupported_link_types() {
        let err = DefaultLinkSettingsFactory
            .construct(&account("foo"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported LinkType: LinkType(FOO)");
    }

    #[test]
    fn constructs_loopback_and_ping_settings() {
        for link_type in &["loopback", "PING_LOOPBACK"] {
            let settings = DefaultLinkSettingsFactory.construct(&account(link_type)).unwrap();
            assert_eq!(settings.link_type(), &LinkType::of(link_type));
            assert!(settings.custom_settings().is_empty());
        }
    }

    #[test]
    fn carries_http_custom_settings() {
        let custom = CustomSettings::new()
            .with("http.outgoing.url", "https://alice.example.com")
            .with("http.outgoing.shared_secret", "shh");
        let account = account("ilp_over_http").with_custom_settings(custom.clone());
        let settings = DefaultLinkSettingsFactory.construct(&account).unwrap();
        assert_eq!(settings.link_type(), &LinkType::ilp_over_http());
        assert_eq!(settings.custom_settings(), &custom);
        assert!(!format!("{:?}", settings).contains("shh"));
    }
}
