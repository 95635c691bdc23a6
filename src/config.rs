//! Service configuration parsed from environment variables.

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    /// Initial key; may be absent and selected later through the credential endpoint.
    pub api_key: Option<String>,
    /// Allow the page to submit a key at runtime.
    pub key_selection: bool,
    /// Sessions unseen for this long are dropped.
    pub session_ttl: Duration,
    pub gemini: GeminiConfig,
}

impl AppConfig {
    /// Build config from the process environment.
    ///
    /// - `GEMINI_API_KEY`: optional
    /// - `GEMINI_API_BASE`: default Google v1beta endpoint
    /// - `GEMINI_TEXT_MODEL` / `GEMINI_IMAGE_MODEL`
    /// - `GEMINI_REQUEST_TIMEOUT_SECS`: default 120
    /// - `GEMINI_CONNECT_TIMEOUT_SECS`: default 10
    /// - `GEMINI_KEY_SELECTION`: `true` (default) or `false`
    /// - `SESSION_TTL_SECS`: default 3600, must be positive
    /// - `PORT`: default 8080
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("GEMINI_API_KEY").map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        let base_url = lookup("GEMINI_API_BASE")
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        let text_model = lookup("GEMINI_TEXT_MODEL").unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string());
        let image_model = lookup("GEMINI_IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string());
        let request_secs = parse_or(&lookup, "GEMINI_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        let connect_secs = parse_or(&lookup, "GEMINI_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?;
        let key_selection = parse_or(&lookup, "GEMINI_KEY_SELECTION", true)?;
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let session_ttl_secs = parse_or(&lookup, "SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;
        if session_ttl_secs == 0 {
            return Err(ConfigError::Invalid { var: "SESSION_TTL_SECS", value: "0".into() });
        }

        Ok(Self {
            port,
            api_key,
            key_selection,
            session_ttl: Duration::from_secs(session_ttl_secs),
            gemini: GeminiConfig {
                base_url,
                text_model,
                image_model,
                request_timeout: Duration::from_secs(request_secs),
                connect_timeout: Duration::from_secs(connect_secs),
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let cfg = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.api_key, None);
        assert!(cfg.key_selection);
        assert_eq!(cfg.gemini.base_url, DEFAULT_API_BASE);
        assert_eq!(cfg.gemini.text_model, DEFAULT_TEXT_MODEL);
        assert_eq!(cfg.gemini.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(cfg.gemini.request_timeout, Duration::from_secs(120));
        assert_eq!(cfg.gemini.connect_timeout, Duration::from_secs(10));
        assert_eq!(cfg.session_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", " secret "),
            ("GEMINI_API_BASE", "http://localhost:9999/v1beta/"),
            ("GEMINI_TEXT_MODEL", "text-x"),
            ("GEMINI_IMAGE_MODEL", "image-y"),
            ("GEMINI_REQUEST_TIMEOUT_SECS", "42"),
            ("GEMINI_CONNECT_TIMEOUT_SECS", "3"),
            ("GEMINI_KEY_SELECTION", "false"),
            ("SESSION_TTL_SECS", "600"),
            ("PORT", "3000"),
        ]))
        .unwrap();
        assert!(!cfg.key_selection);
        assert_eq!(cfg.api_key.as_deref(), Some("secret"));
        assert_eq!(cfg.gemini.base_url, "http://localhost:9999/v1beta");
        assert_eq!(cfg.gemini.text_model, "text-x");
        assert_eq!(cfg.gemini.image_model, "image-y");
        assert_eq!(cfg.gemini.request_timeout, Duration::from_secs(42));
        assert_eq!(cfg.gemini.connect_timeout, Duration::from_secs(3));
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.session_ttl, Duration::from_secs(600));
    }

    #[test]
    fn blank_api_key_counts_as_absent() {
        let cfg = AppConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "   ")])).unwrap();
        assert_eq!(cfg.api_key, None);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert_eq!(err, ConfigError::Invalid { var: "PORT", value: "eighty".into() });
    }

    #[test]
    fn zero_session_ttl_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("SESSION_TTL_SECS", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::Invalid { var: "SESSION_TTL_SECS", value: "0".into() });
    }
}
