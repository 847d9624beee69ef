use serde::Deserialize;
use config::{Config, ConfigBuilder, Environment};
use config::builder::DefaultState;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use alloy::primitives::U256;
use url::Url;

use crate::chain::units::{parse_amount, BalanceUnit};
use crate::error::{ProbeError, Result};

mod profile;
pub use profile::{Profile, PROFILE_ENV_VAR};

#[derive(Deserialize, Clone)]
pub struct Settings {
    // Chain configuration
    pub rpc_url: String,
    pub private_key: String,
    pub gas_limit: u64,
    pub serialize_submissions: bool,

    // Balance alert
    pub balance_alert_threshold: String,
    pub balance_alert_unit: BalanceUnit,
    pub explorer_url: String,

    // Slack
    pub slack_api_url: String,
    pub slack_channel: String,
    pub slack_auth: String,
    pub request_timeout_secs: u64,

    // Record upload
    pub s3_bucket: String,
    pub s3_key_prefix: String,
    pub spool_dir: String,
    pub retain_failed_uploads: bool,

    // Scheduling
    pub interval_ms: u64,

    // Observability
    pub log_dir: String,
    pub log_level: String,
    pub metrics_listen_addr: Option<String>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &"<redacted>")
            .field("gas_limit", &self.gas_limit)
            .field("balance_alert_threshold", &self.balance_alert_threshold)
            .field("balance_alert_unit", &self.balance_alert_unit)
            .field("explorer_url", &self.explorer_url)
            .field("slack_api_url", &self.slack_api_url)
            .field("slack_channel", &self.slack_channel)
            .field("slack_auth", &"<redacted>")
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_key_prefix", &self.s3_key_prefix)
            .field("interval_ms", &self.interval_ms)
            .finish_non_exhaustive()
    }
}

/// Where the profile's dotenv values came from. Reported by the caller once
/// logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSource {
    File(PathBuf),
    Missing(PathBuf),
}

/// Reads the profile's dotenv pairs without touching the process environment.
/// A missing file yields no pairs.
pub fn read_profile_file(
    dir: impl AsRef<Path>,
    profile: &Profile,
) -> Result<(Vec<(String, String)>, ProfileSource)> {
    let path = dir.as_ref().join(profile.file_name());
    if !path.exists() {
        return Ok((Vec::new(), ProfileSource::Missing(path)));
    }

    let iter = dotenv::from_path_iter(&path)
        .map_err(|e| ProbeError::ConfigError(format!("Failed to read {}: {}", path.display(), e)))?;
    let mut file_vars = Vec::new();
    for item in iter {
        let (key, value) = item.map_err(|e| {
            ProbeError::ConfigError(format!("Malformed line in {}: {}", path.display(), e))
        })?;
        file_vars.push((key, value));
    }
    Ok((file_vars, ProfileSource::File(path)))
}

impl Settings {
    /// Loads the profile's dotenv file from `dir` (if present) and overlays the
    /// process environment on top of it.
    pub fn load(dir: impl AsRef<Path>, profile: &Profile) -> Result<(Self, ProfileSource)> {
        let (file_vars, source) = read_profile_file(dir, profile)?;
        let settings = Self::from_sources(file_vars, std::env::vars().collect())?;
        Ok((settings, source))
    }

    /// Builds settings from dotenv-style pairs and an environment map. Environment
    /// values win over file values.
    pub fn from_sources(
        file_vars: impl IntoIterator<Item = (String, String)>,
        env_vars: HashMap<String, String>,
    ) -> Result<Self> {
        let mut builder = ConfigBuilder::<DefaultState>::default()
            .set_default("gas_limit", 25_000)?
            .set_default("serialize_submissions", true)?
            .set_default("balance_alert_unit", "klay")?
            .set_default("request_timeout_secs", 30)?
            .set_default("s3_key_prefix", "")?
            .set_default("spool_dir", ".")?
            .set_default("retain_failed_uploads", true)?
            .set_default("interval_ms", 60_000)?
            .set_default("log_dir", "./logs")?
            .set_default("log_level", "info")?;

        for (key, value) in file_vars {
            builder = builder.set_default(key.to_lowercase(), value)?;
        }

        let config: Config = builder
            .add_source(Environment::default().source(Some(env_vars)))
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("rpc_url", &self.rpc_url),
            ("explorer_url", &self.explorer_url),
            ("slack_api_url", &self.slack_api_url),
        ] {
            Url::parse(value)
                .map_err(|e| ProbeError::ConfigError(format!("Invalid {} '{}': {}", name, value, e)))?;
        }
        if self.interval_ms == 0 {
            return Err(ProbeError::ConfigError("interval_ms must be greater than zero".into()));
        }
        if self.gas_limit == 0 {
            return Err(ProbeError::ConfigError("gas_limit must be greater than zero".into()));
        }
        if self.s3_bucket.trim().is_empty() {
            return Err(ProbeError::ConfigError("s3_bucket must not be empty".into()));
        }
        self.alert_threshold()?;
        Ok(())
    }

    /// Alert threshold in peb.
    pub fn alert_threshold(&self) -> Result<U256> {
        parse_amount(&self.balance_alert_threshold, self.balance_alert_unit)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> Vec<(String, String)> {
        [
            ("RPC_URL", "https://public-en-kairos.node.kaia.io"),
            ("PRIVATE_KEY", "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"),
            ("BALANCE_ALERT_THRESHOLD", "5"),
            ("EXPLORER_URL", "https://kairos.kaiascope.com"),
            ("SLACK_API_URL", "https://slack.com/api/chat.postMessage"),
            ("SLACK_CHANNEL", "#latency"),
            ("SLACK_AUTH", "xoxb-test"),
            ("S3_BUCKET", "latency-records"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_settings_from_file_with_defaults() {
        let settings = Settings::from_sources(required(), HashMap::new()).unwrap();
        assert_eq!(settings.rpc_url, "https://public-en-kairos.node.kaia.io");
        assert_eq!(settings.gas_limit, 25_000);
        assert_eq!(settings.interval_ms, 60_000);
        assert_eq!(settings.balance_alert_unit, BalanceUnit::Klay);
        assert!(settings.retain_failed_uploads);
        assert!(settings.serialize_submissions);
        assert_eq!(settings.metrics_listen_addr, None);
        assert_eq!(
            settings.alert_threshold().unwrap(),
            U256::from(5u64) * U256::from(10u64).pow(U256::from(18u64))
        );
    }

    #[test]
    fn test_environment_overrides_file() {
        let env = HashMap::from([
            ("S3_BUCKET".to_string(), "override-bucket".to_string()),
            ("INTERVAL_MS".to_string(), "1000".to_string()),
            ("BALANCE_ALERT_UNIT".to_string(), "ston".to_string()),
        ]);
        let settings = Settings::from_sources(required(), env).unwrap();
        assert_eq!(settings.s3_bucket, "override-bucket");
        assert_eq!(settings.interval_ms, 1000);
        assert_eq!(settings.balance_alert_unit, BalanceUnit::Ston);
    }

    #[test]
    fn test_missing_required_key_fails() {
        let vars: Vec<_> = required().into_iter().filter(|(k, _)| k != "PRIVATE_KEY").collect();
        assert!(Settings::from_sources(vars, HashMap::new()).is_err());
    }

    #[test]
    fn test_invalid_threshold_fails() {
        let env = HashMap::from([("BALANCE_ALERT_THRESHOLD".to_string(), "five".to_string())]);
        assert!(Settings::from_sources(required(), env).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let settings = Settings::from_sources(required(), HashMap::new()).unwrap();
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("xoxb-test"));
        assert!(!rendered.contains("4c0883a6"));
    }

    #[test]
    fn test_load_reads_profile_file() {
        let dir = std::env::temp_dir().join(format!("txlatency-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let body: String = required()
            .into_iter()
            .map(|(k, v)| format!("{}={}\n", k, v))
            .collect();
        std::fs::write(dir.join(".env.staging"), body).unwrap();

        let (settings, source) = Settings::load(&dir, &Profile::named("staging")).unwrap();
        assert_eq!(settings.slack_channel, "#latency");
        assert_eq!(source, ProfileSource::File(dir.join(".env.staging")));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_reports_missing_profile_file() {
        let dir = std::env::temp_dir().join(format!("txlatency-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(".env.staging"), "SLACK_CHANNEL=#staging\n").unwrap();

        let (vars, source) = read_profile_file(&dir, &Profile::named("stagnig")).unwrap();
        assert!(vars.is_empty());
        assert_eq!(source, ProfileSource::Missing(dir.join(".env.stagnig")));

        let (vars, source) = read_profile_file(&dir, &Profile::named("staging")).unwrap();
        assert_eq!(vars, vec![("SLACK_CHANNEL".to_string(), "#staging".to_string())]);
        assert_eq!(source, ProfileSource::File(dir.join(".env.staging")));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
