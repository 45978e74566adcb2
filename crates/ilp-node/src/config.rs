use crate::NodeError;

use ::config::{Config, Environment, File};
use hex::FromHex;
use interledger_packet::Address;
use interledger_service::{AccountSettings, ConnectorSettings, GlobalRoutingSettings, StaticRoute};
use serde::{de::Error as DeserializeError, Deserialize, Deserializer};
use tracing::debug;

/// Prefix of the environment variables that override configuration values.
/// Nested keys are separated by `__`, for example
/// `ILP_GLOBAL_ROUTING_SETTINGS__ROUTE_BROADCAST_INTERVAL_MS`.
pub const ENV_PREFIX: &str = "ILP";

fn default_log_level() -> String {
    "info".to_owned()
}

fn deserialize_optional_32_bytes_hex<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(value) => <[u8; 32]>::from_hex(value).map(Some).map_err(|err| {
            DeserializeError::custom(format!(
                "Invalid hex value (must be 32 hex-encoded bytes): {:?}",
                err
            ))
        }),
        None => Ok(None),
    }
}

/// Everything needed to run a connector node.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct NodeConfig {
    /// ILP address of the node. May be left unset until it is learned from a parent
    #[serde(default)]
    pub operator_address: Option<Address>,
    #[serde(default)]
    pub global_routing_settings: GlobalRoutingSettings,
    #[serde(default)]
    pub accounts: Vec<AccountSettings>,
    #[serde(default)]
    pub static_routes: Vec<StaticRoute>,
    /// Used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Secret that authenticates the routes this node originates. A random
    /// one is generated on every start when this is not set
    #[serde(default, deserialize_with = "deserialize_optional_32_bytes_hex")]
    pub route_secret: Option<[u8; 32]>,
}

impl NodeConfig {
    /// Loads the configuration from the given file (JSON, TOML or YAML, by
    /// extension) and `ILP_` environment variables, in increasing order of
    /// precedence.
    pub fn load(config_path: Option<&str>) -> Result<Self, NodeError> {
        load_configuration(config_path, ENV_PREFIX, Vec::new())
    }

    pub fn connector_settings(&self) -> ConnectorSettings {
        ConnectorSettings {
            operator_address: self.operator_address.clone(),
            global_routing_settings: self.global_routing_settings.clone(),
            static_routes: self.static_routes.clone(),
        }
    }
}

/// Merges the config file, the environment variables starting with
/// `env_prefix` and finally the explicit `overrides` (command line values).
pub fn load_configuration(
    config_path: Option<&str>,
    env_prefix: &str,
    overrides: Vec<(&str, String)>,
) -> Result<NodeConfig, NodeError> {
    let mut config = Config::new();
    if let Some(path) = config_path {
        debug!("Reading configuration from {}", path);
        config.merge(File::with_name(path))?;
    }
    config.merge(Environment::with_prefix(env_prefix).separator("__"))?;
    for (key, value) in overrides {
        config.set(key, value)?;
    }
    Ok(config.try_into()?)
}
