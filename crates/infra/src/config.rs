//! Configuration loading and representation.
//!
//! Everything is read from environment variables. Unset variables fall back to
//! defaults; set-but-malformed variables are errors.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use forgewms_core::Quantity;
use forgewms_erp::ServiceLayerConfig;
use forgewms_warehouse::AllocationPolicy;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_ERP_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SNAPSHOT_TTL_SECS: u64 = 30;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{var} is set but {missing} is not")]
    Incomplete {
        var: &'static str,
        missing: &'static str,
    },
}

/// Runtime knobs of the reconciliation engine and its collaborators.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub allocation_policy: AllocationPolicy,
    pub max_retries: u32,
    pub erp_timeout: Duration,
    pub snapshot_ttl: Duration,
    /// `None` runs against the in-memory ERP.
    pub erp: Option<ServiceLayerConfig>,
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub bind_addr: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allocation_policy: AllocationPolicy::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            erp_timeout: Duration::from_millis(DEFAULT_ERP_TIMEOUT_MS),
            snapshot_ttl: Duration::from_secs(DEFAULT_SNAPSHOT_TTL_SECS),
            erp: None,
            database_url: None,
            jwt_secret: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let tolerance: Quantity = parse_or(&get, "FORGEWMS_ALLOCATION_TOLERANCE", Quantity::ZERO)?;
        let allocation_policy =
            AllocationPolicy::with_tolerance(tolerance).map_err(|e| ConfigError::Invalid {
                var: "FORGEWMS_ALLOCATION_TOLERANCE",
                reason: e.to_string(),
            })?;

        let max_retries = parse_or(&get, "FORGEWMS_ALLOCATION_MAX_RETRIES", DEFAULT_MAX_RETRIES)?;

        let erp_timeout_ms: u64 = parse_or(&get, "FORGEWMS_ERP_TIMEOUT_MS", DEFAULT_ERP_TIMEOUT_MS)?;
        if erp_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "FORGEWMS_ERP_TIMEOUT_MS",
                reason: "must be positive".to_string(),
            });
        }
        let erp_timeout = Duration::from_millis(erp_timeout_ms);

        let snapshot_ttl = Duration::from_secs(parse_or(
            &get,
            "FORGEWMS_SNAPSHOT_TTL_SECS",
            DEFAULT_SNAPSHOT_TTL_SECS,
        )?);

        let erp = match get("SAP_B1_BASE_URL") {
            None => None,
            Some(base_url) => {
                let require = |missing: &'static str| {
                    get(missing).ok_or(ConfigError::Incomplete {
                        var: "SAP_B1_BASE_URL",
                        missing,
                    })
                };
                Some(
                    ServiceLayerConfig::new(
                        base_url,
                        require("SAP_B1_COMPANY_DB")?,
                        require("SAP_B1_USERNAME")?,
                        require("SAP_B1_PASSWORD")?,
                    )
                    .with_timeout(erp_timeout),
                )
            }
        };

        Ok(Self {
            allocation_policy,
            max_retries,
            erp_timeout,
            snapshot_ttl,
            erp,
            database_url: get("DATABASE_URL"),
            jwt_secret: get("JWT_SECRET"),
            bind_addr: get("FORGEWMS_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            var,
            reason: format!("'{raw}': {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.allocation_policy, AllocationPolicy::strict());
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.erp_timeout, Duration::from_secs(5));
        assert_eq!(cfg.snapshot_ttl, Duration::from_secs(30));
        assert!(cfg.erp.is_none());
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR);
    }

    #[test]
    fn reads_tolerance_and_timeouts() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            ("FORGEWMS_ALLOCATION_TOLERANCE", "0.5"),
            ("FORGEWMS_ALLOCATION_MAX_RETRIES", "7"),
            ("FORGEWMS_ERP_TIMEOUT_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(cfg.allocation_policy.tolerance(), Quantity::new(5, 1));
        assert_eq!(cfg.max_retries, 7);
        assert_eq!(cfg.erp_timeout, Duration::from_millis(250));
    }

    #[test]
    fn malformed_values_are_errors() {
        let err = EngineConfig::from_lookup(lookup(&[("FORGEWMS_ALLOCATION_MAX_RETRIES", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "FORGEWMS_ALLOCATION_MAX_RETRIES", .. }));

        let err = EngineConfig::from_lookup(lookup(&[("FORGEWMS_ALLOCATION_TOLERANCE", "-1")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "FORGEWMS_ALLOCATION_TOLERANCE", .. }));

        let err = EngineConfig::from_lookup(lookup(&[("FORGEWMS_ERP_TIMEOUT_MS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn erp_settings_must_be_complete() {
        let err = EngineConfig::from_lookup(lookup(&[
            ("SAP_B1_BASE_URL", "https://sap:50000"),
            ("SAP_B1_COMPANY_DB", "SBODEMO"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Incomplete {
                var: "SAP_B1_BASE_URL",
                missing: "SAP_B1_USERNAME"
            }
        );

        let cfg = EngineConfig::from_lookup(lookup(&[
            ("SAP_B1_BASE_URL", "https://sap:50000"),
            ("SAP_B1_COMPANY_DB", "SBODEMO"),
            ("SAP_B1_USERNAME", "manager"),
            ("SAP_B1_PASSWORD", "secret"),
            ("FORGEWMS_ERP_TIMEOUT_MS", "1500"),
        ]))
        .unwrap();
        let erp = cfg.erp.unwrap();
        assert_eq!(erp.company_db, "SBODEMO");
        assert_eq!(erp.timeout, Duration::from_millis(1500));
    }
}
