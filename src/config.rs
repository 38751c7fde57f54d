use chrono::NaiveDate;
use std::{env, net::SocketAddr, time::Duration};

use crate::models::DateRange;

pub const DEFAULT_SOURCE_URL: &str = "https://1c-lk.uztelecom.uz/a/adm/hs/BI/subscriptions";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Upstream serves a certificate that does not validate; on by default.
    pub accept_invalid_certs: bool,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub source: SourceConfig,
    pub cache_ttl: Duration,
    pub default_from: NaiveDate,
    pub default_to: NaiveDate,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| lookup(key).and_then(|value| value.trim().parse::<u64>().ok());
        let date = |key: &str, default: NaiveDate| {
            lookup(key)
                .and_then(|value| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok())
                .unwrap_or(default)
        };

        let source = SourceConfig {
            url: lookup("BI_SOURCE_URL").unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            username: lookup("BI_USERNAME").unwrap_or_else(|| "BI".to_string()),
            password: lookup("BI_PASSWORD").unwrap_or_default(),
            accept_invalid_certs: lookup("BI_ACCEPT_INVALID_CERTS")
                .and_then(|value| parse_flag(&value))
                .unwrap_or(true),
            timeout: parsed("BI_FETCH_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        };

        Self {
            port: lookup("PORT")
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(8080),
            source,
            cache_ttl: parsed("BI_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CACHE_TTL),
            default_from: date("BI_DEFAULT_FROM", fallback_date(2025, 4, 25)),
            default_to: date("BI_DEFAULT_TO", fallback_date(2025, 12, 23)),
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    /// Range shown when the page opens; swapped bounds are put back in order.
    pub fn default_range(&self) -> DateRange {
        DateRange::new(self.default_from, self.default_to).unwrap_or(DateRange {
            from: self.default_to,
            to: self.default_from,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn fallback_date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_reference_dashboard() {
        let config = config(&[]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.source.url, DEFAULT_SOURCE_URL);
        assert_eq!(config.source.username, "BI");
        assert!(config.source.accept_invalid_certs);
        assert_eq!(config.source.timeout, None);
        assert_eq!(config.default_from.to_string(), "2025-04-25");
        assert_eq!(config.default_to.to_string(), "2025-12-23");
    }

    #[test]
    fn reads_overrides_and_ignores_garbage() {
        let config = config(&[
            ("PORT", "9000"),
            ("BI_SOURCE_URL", "http://127.0.0.1:1/report"),
            ("BI_ACCEPT_INVALID_CERTS", "off"),
            ("BI_FETCH_TIMEOUT_SECS", "15"),
            ("BI_CACHE_TTL_SECS", "soon"),
            ("BI_DEFAULT_FROM", "2024-01-01"),
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.source.url, "http://127.0.0.1:1/report");
        assert!(!config.source.accept_invalid_certs);
        assert_eq!(config.source.timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.cache_ttl, DEFAULT_CACHE_TTL);
        assert_eq!(config.default_from.to_string(), "2024-01-01");
    }

    #[test]
    fn default_range_is_ordered() {
        let config = config(&[("BI_DEFAULT_FROM", "2026-01-01"), ("BI_DEFAULT_TO", "2025-01-01")]);
        let range = config.default_range();
        assert!(range.from <= range.to);
        assert_eq!(range.bounds().0, "2025-01-01T00:00:00");
        assert_eq!(range.bounds().1, "2026-01-01T23:59:59");
    }
}
