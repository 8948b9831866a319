//! Configuration of a [`TransactionLogStore`](crate::TransactionLogStore).
//!
//! ```
//! use tcclog::LogStoreConfig;
//!
//! let config: LogStoreConfig =
//!     serde_json::from_str(r#"{"endpoint": "10.0.0.1:orderSvc:8080"}"#).unwrap();
//! assert_eq!(config.endpoint.application(), "orderSvc");
//! assert_eq!(config.collection, "transactions");
//! assert!(config.initialize_enabled);
//! ```

use crate::error::LogError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Identity of one coordinator instance, `host:application:port`.
///
/// The application component names the tenant whose archives the instance writes and
/// recovers.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    text: String,
    application: std::ops::Range<usize>,
}

impl Endpoint {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn application(&self) -> &str {
        &self.text[self.application.clone()]
    }
}

impl FromStr for Endpoint {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [host, application, port] = parts.as_slice() else {
            return Err(LogError::Configuration(format!(
                "endpoint `{s}` is not of the form host:application:port"
            )));
        };
        if host.is_empty() || application.is_empty() || port.is_empty() {
            return Err(LogError::Configuration(format!(
                "endpoint `{s}` has an empty component"
            )));
        }
        let start = host.len() + 1;
        Ok(Self {
            text: s.to_string(),
            application: start..start + application.len(),
        })
    }
}

impl TryFrom<String> for Endpoint {
    type Error = LogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(value: Endpoint) -> Self {
        value.text
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

fn default_database() -> String {
    "bytetcc".to_string()
}

fn default_collection() -> String {
    "transactions".to_string()
}

fn default_initialize_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStoreConfig {
    /// Database holding the transaction collection. Drivers that have no notion of databases
    /// ignore it.
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    pub endpoint: Endpoint,
    /// Whether [`initialize`](crate::TransactionLogStore::initialize) checks and creates the
    /// indexes.
    #[serde(default = "default_initialize_enabled")]
    pub initialize_enabled: bool,
}

impl LogStoreConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            database: default_database(),
            collection: default_collection(),
            endpoint,
            initialize_enabled: default_initialize_enabled(),
        }
    }

    /// `database.collection`, the name the transaction collection is known by in logs.
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_application() {
        let endpoint: Endpoint = "192.168.1.10:orderSvc:8080".parse().unwrap();
        assert_eq!(endpoint.application(), "orderSvc");
        assert_eq!(endpoint.as_str(), "192.168.1.10:orderSvc:8080");
    }

    #[test]
    fn malformed_endpoints_are_configuration_faults() {
        for text in ["orderSvc", "host:orderSvc", "host::8080", "a:b:c:d", ""] {
            let err = text.parse::<Endpoint>().unwrap_err();
            assert!(matches!(err, LogError::Configuration(_)), "{text}");
        }
    }

    #[test]
    fn config_defaults_and_overrides() {
        let config: LogStoreConfig = serde_json::from_str(
            r#"{"endpoint": "h:stockSvc:1", "collection": "tcc", "initialize_enabled": false}"#,
        )
        .unwrap();
        assert_eq!(config.database, "bytetcc");
        assert_eq!(config.collection, "tcc");
        assert_eq!(config.namespace(), "bytetcc.tcc");
        assert!(!config.initialize_enabled);
        assert_eq!(config.endpoint.application(), "stockSvc");

        let roundtrip: LogStoreConfig =
            serde_json::from_str(&serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(roundtrip, config);

        assert!(serde_json::from_str::<LogStoreConfig>(r#"{"endpoint": "nope"}"#).is_err());
    }
}
