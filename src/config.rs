//! Server configuration, read from the environment.

use std::path::PathBuf;

use crate::ratelimit::RateLimitRule;
use crate::{Error, Result};

pub const DEFAULT_RATE_LIMITS: &str = "/api/v1/contacts/=100/60";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Interface to listen on.
    pub bind_addr: String,

    pub port: u16,

    /// Seed document applied at startup, if any.
    pub seed_file: Option<PathBuf>,

    /// Delete the existing schema before seeding.
    pub seed_reset: bool,

    pub rate_limits: Vec<RateLimitRule>,

    /// Seconds between rate-limiter pruning passes.
    pub prune_interval_secs: u64,

    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: 8080,
            seed_file: None,
            seed_reset: false,
            rate_limits: vec![RateLimitRule::new("/api/v1/contacts/", 100, 60)],
            prune_interval_secs: 60,
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset or blank variables
    /// take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT must be a port number, got '{raw}'")))?,
            None => defaults.port,
        };

        let seed_reset = match get("SEED_RESET") {
            Some(raw) => parse_bool("SEED_RESET", &raw)?,
            None => defaults.seed_reset,
        };

        let rate_limits = match get("RATE_LIMITS") {
            Some(raw) => RateLimitRule::parse_list(&raw)?,
            None => RateLimitRule::parse_list(DEFAULT_RATE_LIMITS)?,
        };

        let prune_interval_secs = match get("RATE_LIMIT_PRUNE_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(Error::Config(format!(
                        "RATE_LIMIT_PRUNE_SECS must be a positive integer, got '{raw}'"
                    )));
                }
            },
            None => defaults.prune_interval_secs,
        };

        let log_format = match get("LOG_FORMAT").as_deref().map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").map(|s| s.trim().to_owned()).unwrap_or(defaults.bind_addr),
            port,
            seed_file: get("SEED_FILE").map(PathBuf::from),
            seed_reset,
            rate_limits,
            prune_interval_secs,
            log_format,
        })
    }

    /// `bind_addr:port`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{key} must be a boolean, got '{raw}'"))),
    }
}
