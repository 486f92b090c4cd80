//! Store configuration and its resolution from external settings.
//!
//! Resolution is an explicit startup step: build a `StoreConfig` once (from
//! the environment, a JSON document, or any `ConfigSource`) and hand it to the
//! store. Nothing here is a process-wide global.

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Maximum live scopes when no setting supplies one.
pub const DEFAULT_MAX_ACTIVE_SCOPES: usize = 20;

/// Inactivity timeout when no setting supplies one (30 minutes).
pub const DEFAULT_SCOPE_TTL_SECS: u64 = 30 * 60;

/// Capacity settings, most specific first.
pub const MAX_ACTIVE_SCOPES_KEYS: &[&str] = &[
    "VIEWSCOPE_MAX_ACTIVE_SCOPES",
    "VIEWSCOPE_NUMBER_OF_LOGICAL_VIEWS",
    "VIEWSCOPE_VIEWS_IN_SESSION",
];

/// TTL settings, most specific first.
pub const SCOPE_TTL_KEYS: &[&str] = &["VIEWSCOPE_SCOPE_TTL_SECS", "VIEWSCOPE_SESSION_TIMEOUT_SECS"];

pub const SWEEP_INTERVAL_KEY: &str = "VIEWSCOPE_SWEEP_INTERVAL_SECS";

/// A named-setting lookup (environment, servlet-style init params, a map...).
pub trait ConfigSource {
    fn lookup(&self, key: &str) -> Option<String>;
}

impl<S: ConfigSource + ?Sized> ConfigSource for &S {
    fn lookup(&self, key: &str) -> Option<String> {
        (**self).lookup(key)
    }
}

/// Reads settings from process environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory settings, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    values: HashMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl ConfigSource for MapSource {
    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Resolves a positive integer setting from an ordered list of keys.
///
/// The first key that is *present* decides: it either parses as a positive
/// integer or resolution fails. Later keys are only consulted when earlier
/// ones are absent. With no key present the fallback is used. A successful
/// result is computed once and reused for the resolver's lifetime.
pub struct CapacityResolver<S> {
    source: S,
    keys: Vec<String>,
    fallback: u64,
    resolved: OnceCell<u64>,
}

impl<S: ConfigSource> CapacityResolver<S> {
    /// Resolver for the maximum number of live scopes.
    pub fn new(source: S) -> Self {
        Self::with_keys(
            source,
            MAX_ACTIVE_SCOPES_KEYS,
            DEFAULT_MAX_ACTIVE_SCOPES as u64,
        )
    }

    /// Resolver for the scope TTL, in seconds.
    pub fn for_ttl(source: S) -> Self {
        Self::with_keys(source, SCOPE_TTL_KEYS, DEFAULT_SCOPE_TTL_SECS)
    }

    pub fn with_keys(source: S, keys: &[&str], fallback: u64) -> Self {
        Self {
            source,
            keys: keys.iter().map(|k| k.to_string()).collect(),
            fallback,
            resolved: OnceCell::new(),
        }
    }

    pub fn resolve(&self) -> Result<u64, ConfigError> {
        self.resolved
            .get_or_try_init(|| {
                first_positive(&self.source, &self.keys).map(|v| v.unwrap_or(self.fallback))
            })
            .copied()
    }

    /// Keys consulted, in order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

fn first_positive<S: ConfigSource>(
    source: &S,
    keys: &[String],
) -> Result<Option<u64>, ConfigError> {
    for key in keys {
        if let Some(raw) = source.lookup(key) {
            return parse_positive(key, &raw).map(Some);
        }
    }
    Ok(None)
}

fn parse_positive(key: &str, raw: &str) -> Result<u64, ConfigError> {
    let value: i64 = raw.trim().parse().map_err(|_| ConfigError::Unparseable {
        key: key.to_string(),
        value: raw.to_string(),
    })?;
    if value <= 0 {
        return Err(ConfigError::NonPositive {
            key: key.to_string(),
        });
    }
    Ok(value as u64)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Live buckets admitted before the least-recently-used one is evicted.
    pub max_active_scopes: usize,

    /// Seconds of inactivity after which a bucket is expired.
    pub scope_ttl_secs: u64,

    /// Period of the optional background sweep. `None` disables it.
    pub sweep_interval_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_active_scopes: DEFAULT_MAX_ACTIVE_SCOPES,
            scope_ttl_secs: DEFAULT_SCOPE_TTL_SECS,
            sweep_interval_secs: None,
        }
    }
}

impl StoreConfig {
    pub fn new(max_active_scopes: usize, scope_ttl_secs: u64) -> Self {
        Self {
            max_active_scopes,
            scope_ttl_secs,
            sweep_interval_secs: None,
        }
    }

    pub fn with_sweep_interval(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = Some(secs);
        self
    }

    /// Resolve every setting from `source`, failing fast on malformed values.
    pub fn resolve<S: ConfigSource>(source: &S) -> Result<Self, ConfigError> {
        let capacity = CapacityResolver::new(source).resolve()?;
        let max_active_scopes = usize::try_from(capacity).map_err(|_| {
            ConfigError::Invalid(format!("max active scopes {capacity} does not fit in usize"))
        })?;
        let scope_ttl_secs = CapacityResolver::for_ttl(source).resolve()?;
        let sweep_interval_secs =
            first_positive(source, &[SWEEP_INTERVAL_KEY.to_string()])?;

        let cfg = Self {
            max_active_scopes,
            scope_ttl_secs,
            sweep_interval_secs,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Resolve from environment variables.
    ///
    /// Environment variables (first present wins within each group):
    /// - `VIEWSCOPE_MAX_ACTIVE_SCOPES`, `VIEWSCOPE_NUMBER_OF_LOGICAL_VIEWS`,
    ///   `VIEWSCOPE_VIEWS_IN_SESSION`: maximum live scopes
    /// - `VIEWSCOPE_SCOPE_TTL_SECS`, `VIEWSCOPE_SESSION_TIMEOUT_SECS`: TTL
    /// - `VIEWSCOPE_SWEEP_INTERVAL_SECS`: background sweep period
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(&EnvSource)
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(doc: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(doc)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_active_scopes == 0 {
            return Err(ConfigError::Invalid(
                "max_active_scopes must be at least 1".into(),
            ));
        }
        if self.sweep_interval_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be positive when set".into(),
            ));
        }
        Ok(())
    }
}
