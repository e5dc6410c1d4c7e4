//! Settings loading
//!
//! Layered lowest to highest: built-in defaults, an optional config file,
//! then `FERRY_`-prefixed environment variables. Nested keys use a double
//! underscore, so `FERRY_GATEWAY__RETRY=5` sets `gateway.retry`.

use config::{Config, ConfigError, Environment, File};
use ferry_core::TransferConfig;
use ferry_http::GatewayConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const ENV_PREFIX: &str = "FERRY";

/// Everything a Ferry deployment can tune
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub transfer: TransferConfig,
    pub gateway: GatewayConfig,
}

impl Settings {
    /// Load from the process environment and, when given, a config file.
    ///
    /// A `.env` file in the working directory is read first if present. A
    /// missing config file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::build(path, None)
    }

    /// Same as [`Settings::load`] with an explicit variable set in place of
    /// the process environment
    pub fn load_with_env(
        path: Option<&Path>,
        vars: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        Self::build(path, Some(vars))
    }

    fn build(path: Option<&Path>, vars: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("gateway.retry_on")
            .source(vars);

        let settings: Self = builder.add_source(env).build()?.try_deserialize()?;
        tracing::debug!(?settings, "settings loaded");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_sources() {
        let settings = Settings::load_with_env(None, HashMap::new()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.transfer.op_concurrency, 5);
        assert_eq!(settings.gateway.retry_on, vec![408, 502, 503, 504]);
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::load_with_env(
            None,
            vars(&[
                ("FERRY_TRANSFER__OP_CONCURRENCY", "8"),
                ("FERRY_GATEWAY__RETRY", "4"),
                ("FERRY_GATEWAY__RETRY_ON", "408,503"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.transfer.op_concurrency, 8);
        assert_eq!(settings.gateway.retry, 4);
        assert_eq!(settings.gateway.retry_on, vec![408, 503]);
        assert_eq!(settings.gateway.backoff_base_ms, 2_000);
    }

    #[test]
    fn test_file_then_env() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[transfer]\nop_concurrency = 3\n\n[gateway]\nretry = 0\nthrottle_concurrency = 50"
        )
        .unwrap();

        let settings = Settings::load_with_env(
            Some(file.path()),
            vars(&[("FERRY_GATEWAY__RETRY", "1")]),
        )
        .unwrap();

        assert_eq!(settings.transfer.op_concurrency, 3);
        assert_eq!(settings.gateway.throttle_concurrency, 50);
        assert_eq!(settings.gateway.retry, 1);
    }

    #[test]
    fn test_missing_file_is_ignored() {
        let settings = Settings::load_with_env(
            Some(Path::new("/nonexistent/ferry.toml")),
            HashMap::new(),
        )
        .unwrap();
        assert_eq!(settings, Settings::default());
    }
}
