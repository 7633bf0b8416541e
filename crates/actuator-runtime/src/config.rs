use std::time::Duration;

use crate::error::{RuntimeError, RuntimeResult};

pub const ENV_CREDENTIAL_KEY: &str = "ACTUATOR_CREDENTIAL_KEY";
pub const ENV_CONFIDENCE_FLOOR: &str = "ACTUATOR_CONFIDENCE_FLOOR";
pub const ENV_RECORD_CREDENTIAL_USAGE: &str = "ACTUATOR_RECORD_CREDENTIAL_USAGE";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "ACTUATOR_HTTP_TIMEOUT_SECS";

pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.7;

/// Runtime settings shared by the resolver, credential manager and engine
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Minimum confidence for required input attributes
    pub confidence_floor: f64,
    /// Passphrase the credential encryption key is derived from
    pub credential_passphrase: Option<String>,
    /// Update `last_used_at` on every credential read
    pub record_credential_usage: bool,
    /// Used when an action declares no timeout
    pub http_timeout: Duration,
    pub user_agent: String,
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("confidence_floor", &self.confidence_floor)
            .field("credential_passphrase", &self.credential_passphrase.as_ref().map(|_| "<redacted>"))
            .field("record_credential_usage", &self.record_credential_usage)
            .field("http_timeout", &self.http_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            credential_passphrase: None,
            record_credential_usage: false,
            http_timeout: Duration::from_secs(30),
            user_agent: actuator_http::USER_AGENT.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load from `ACTUATOR_*` environment variables; unset variables keep defaults.
    pub fn from_env() -> RuntimeResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> RuntimeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(key) = lookup(ENV_CREDENTIAL_KEY).filter(|k| !k.is_empty()) {
            config.credential_passphrase = Some(key);
        }

        if let Some(raw) = lookup(ENV_CONFIDENCE_FLOOR) {
            let floor: f64 = raw
                .trim()
                .parse()
                .map_err(|_| {
                    RuntimeError::config(format!("{} must be a number, got '{}'", ENV_CONFIDENCE_FLOOR, raw))
                })?;
            if !(0.0..=1.0).contains(&floor) {
                return Err(RuntimeError::config(format!(
                    "{} must be within [0, 1], got {}",
                    ENV_CONFIDENCE_FLOOR, floor
                )));
            }
            config.confidence_floor = floor;
        }

        if let Some(raw) = lookup(ENV_RECORD_CREDENTIAL_USAGE) {
            config.record_credential_usage = parse_flag(&raw).ok_or_else(|| {
                RuntimeError::config(format!("{} must be a boolean, got '{}'", ENV_RECORD_CREDENTIAL_USAGE, raw))
            })?;
        }

        if let Some(raw) = lookup(ENV_HTTP_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                RuntimeError::config(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    ENV_HTTP_TIMEOUT_SECS, raw
                ))
            })?;
            if secs == 0 {
                return Err(RuntimeError::config(format!("{} must be greater than 0", ENV_HTTP_TIMEOUT_SECS)));
            }
            config.http_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.credential_passphrase = Some(passphrase.into());
        self
    }

    pub fn with_confidence_floor(mut self, floor: f64) -> Self {
        self.confidence_floor = floor.clamp(0.0, 1.0);
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = RuntimeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.confidence_floor, 0.7);
        assert!(config.credential_passphrase.is_none());
        assert!(!config.record_credential_usage);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn reads_all_variables() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            (ENV_CREDENTIAL_KEY, "vault-pass"),
            (ENV_CONFIDENCE_FLOOR, "0.85"),
            (ENV_RECORD_CREDENTIAL_USAGE, "yes"),
            (ENV_HTTP_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();
        assert_eq!(config.credential_passphrase.as_deref(), Some("vault-pass"));
        assert_eq!(config.confidence_floor, 0.85);
        assert!(config.record_credential_usage);
        assert_eq!(config.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(RuntimeConfig::from_lookup(lookup(&[(ENV_CONFIDENCE_FLOOR, "1.5")])).is_err());
        assert!(RuntimeConfig::from_lookup(lookup(&[(ENV_CONFIDENCE_FLOOR, "high")])).is_err());
        assert!(RuntimeConfig::from_lookup(lookup(&[(ENV_HTTP_TIMEOUT_SECS, "0")])).is_err());
        assert!(RuntimeConfig::from_lookup(lookup(&[(ENV_RECORD_CREDENTIAL_USAGE, "maybe")])).is_err());
    }

    #[test]
    fn debug_output_hides_passphrase() {
        let config = RuntimeConfig::default().with_passphrase("hunter2");
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
