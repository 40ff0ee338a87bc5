//! Runtime configuration read from environment variables.

use thiserror::Error;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 10;
pub const DEFAULT_ACCEPTED_TYPES: &str = ".xlsx,.xls,.csv";
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STATIC_DIR: &str = "static";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must list at least one file extension")]
    NoAcceptedTypes { var: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind: String,
    /// Base URL of the analytics backend; `None` runs against the built-in demo data
    pub api_url: Option<String>,
    pub max_upload_mb: u64,
    pub accepted_types: Vec<String>,
    pub api_timeout_secs: u64,
    pub static_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind: DEFAULT_BIND.to_string(),
            api_url: None,
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            accepted_types: parse_accepted_types(DEFAULT_ACCEPTED_TYPES),
            api_timeout_secs: DEFAULT_API_TIMEOUT_SECS,
            static_dir: DEFAULT_STATIC_DIR.to_string(),
        }
    }
}

impl AppConfig {
    /// Build config from the process environment.
    ///
    /// - `EXCEL_ANALYTICS_BIND`: listen address (default `127.0.0.1:3000`)
    /// - `EXCEL_ANALYTICS_API_URL`: backend base URL (optional)
    /// - `EXCEL_ANALYTICS_MAX_UPLOAD_MB`: default 10
    /// - `EXCEL_ANALYTICS_ACCEPTED_TYPES`: comma list, default `.xlsx,.xls,.csv`
    /// - `EXCEL_ANALYTICS_API_TIMEOUT_SECS`: default 30
    /// - `EXCEL_ANALYTICS_STATIC_DIR`: default `static`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] but reads through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();

        let bind = lookup("EXCEL_ANALYTICS_BIND").unwrap_or(defaults.bind);
        let api_url = lookup("EXCEL_ANALYTICS_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        let max_upload_mb = parse_positive(
            "EXCEL_ANALYTICS_MAX_UPLOAD_MB",
            lookup("EXCEL_ANALYTICS_MAX_UPLOAD_MB"),
            defaults.max_upload_mb,
        )?;
        let api_timeout_secs = parse_positive(
            "EXCEL_ANALYTICS_API_TIMEOUT_SECS",
            lookup("EXCEL_ANALYTICS_API_TIMEOUT_SECS"),
            defaults.api_timeout_secs,
        )?;
        let accepted_types = match lookup("EXCEL_ANALYTICS_ACCEPTED_TYPES") {
            Some(raw) => {
                let types = parse_accepted_types(&raw);
                if types.is_empty() {
                    return Err(ConfigError::NoAcceptedTypes {
                        var: "EXCEL_ANALYTICS_ACCEPTED_TYPES",
                    });
                }
                types
            }
            None => defaults.accepted_types,
        };
        let static_dir = lookup("EXCEL_ANALYTICS_STATIC_DIR").unwrap_or(defaults.static_dir);

        Ok(AppConfig {
            bind,
            api_url,
            max_upload_mb,
            accepted_types,
            api_timeout_secs,
            static_dir,
        })
    }
}

fn parse_positive(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => match value.trim().parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::InvalidNumber { var, value }),
        },
    }
}

/// Splits a comma list into lowercase extensions with a leading dot
pub fn parse_accepted_types(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .map(|t| format!(".{t}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.accepted_types, vec![".xlsx", ".xls", ".csv"]);
        assert!(cfg.api_url.is_none());
    }

    #[test]
    fn overrides_are_normalized() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("EXCEL_ANALYTICS_API_URL", "https://api.example.test/api/"),
            ("EXCEL_ANALYTICS_MAX_UPLOAD_MB", "25"),
            ("EXCEL_ANALYTICS_ACCEPTED_TYPES", "XLSX, .Csv ,,ods"),
        ]))
        .unwrap();
        assert_eq!(cfg.api_url.as_deref(), Some("https://api.example.test/api"));
        assert_eq!(cfg.max_upload_mb, 25);
        assert_eq!(cfg.accepted_types, vec![".xlsx", ".csv", ".ods"]);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("EXCEL_ANALYTICS_MAX_UPLOAD_MB", "ten")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                var: "EXCEL_ANALYTICS_MAX_UPLOAD_MB",
                value: "ten".to_string()
            }
        );
        assert!(
            AppConfig::from_lookup(lookup_from(&[("EXCEL_ANALYTICS_API_TIMEOUT_SECS", "0")])).is_err()
        );
    }

    #[test]
    fn empty_accepted_types_are_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("EXCEL_ANALYTICS_ACCEPTED_TYPES", " , ")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoAcceptedTypes { .. }));
    }
}
