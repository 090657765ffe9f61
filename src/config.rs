// Runtime configuration read from the environment
//
// Values only; unparsable variables fall back to their defaults and the
// resulting combination is validated once.

use crate::baseline::MonitoredAccounts;
use crate::issues::DEFAULT_ISSUE_CAPACITY;
use crate::transfer::ChaosConfig;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("Monitored accounts must be two different accounts, got {0} twice")]
    SameMonitoredAccount(String),

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditConfig {
    pub database_path: PathBuf,
    pub bind_addr: String,
    pub check_period: Duration,
    pub initial_delay: Duration,
    pub issue_capacity: usize,
    pub monitored: MonitoredAccounts,
    pub generator_enabled: bool,
    pub generator_period: Duration,
    pub generator_initial_delay: Duration,
    pub chaos: ChaosConfig,
    pub log_json: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        AuditConfig {
            database_path: PathBuf::from("ledger.db"),
            bind_addr: "0.0.0.0:3000".to_string(),
            check_period: Duration::from_millis(3000),
            initial_delay: Duration::from_millis(15_000),
            issue_capacity: DEFAULT_ISSUE_CAPACITY,
            monitored: MonitoredAccounts::default(),
            generator_enabled: true,
            generator_period: Duration::from_millis(5000),
            generator_initial_delay: Duration::from_millis(10_000),
            chaos: ChaosConfig::default(),
            log_json: false,
        }
    }
}

// ============================================================================
// LOOKUP HELPERS
// ============================================================================

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str, default: &str) -> String {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    fn bool(&self, name: &str, default: bool) -> bool {
        (self.0)(name)
            .and_then(|v| match v.trim() {
                "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
                "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
                _ => None,
            })
            .unwrap_or(default)
    }

    fn u64(&self, name: &str, default: u64) -> u64 {
        (self.0)(name)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(default)
    }

    fn usize(&self, name: &str, default: usize) -> usize {
        (self.0)(name)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(default)
    }

    fn f64(&self, name: &str, default: f64) -> f64 {
        (self.0)(name)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(default)
    }

    fn duration_ms(&self, name: &str, default: Duration) -> Duration {
        Duration::from_millis(self.u64(name, u64::try_from(default.as_millis()).unwrap_or(u64::MAX)))
    }
}

impl AuditConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Lookup(lookup);
        let defaults = AuditConfig::default();

        let chaos = ChaosConfig::new(
            vars.bool("LEDGER_CHAOS_ENABLED", false),
            vars.duration_ms("LEDGER_CHAOS_SLEEP_BEFORE_UPDATE_MS", Duration::ZERO),
            vars.f64("LEDGER_CHAOS_FAIL_AFTER_ORIGIN_UPDATE_PROBABILITY", 0.0),
        );

        let config = AuditConfig {
            database_path: PathBuf::from(vars.string("LEDGER_DB_PATH", "ledger.db")),
            bind_addr: vars.string("LEDGER_BIND_ADDR", &defaults.bind_addr),
            check_period: vars.duration_ms("LEDGER_AUDIT_PERIOD_MS", defaults.check_period),
            initial_delay: vars.duration_ms("LEDGER_AUDIT_INITIAL_DELAY_MS", defaults.initial_delay),
            issue_capacity: vars.usize("LEDGER_AUDIT_ISSUE_CAPACITY", defaults.issue_capacity),
            monitored: MonitoredAccounts::new(
                vars.string("LEDGER_AUDIT_ORIGIN_ACCOUNT", &defaults.monitored.origin),
                vars.string("LEDGER_AUDIT_DESTINATION_ACCOUNT", &defaults.monitored.destination),
            ),
            generator_enabled: vars.bool("LEDGER_GENERATOR_ENABLED", defaults.generator_enabled),
            generator_period: vars.duration_ms("LEDGER_GENERATOR_PERIOD_MS", defaults.generator_period),
            generator_initial_delay: vars
                .duration_ms("LEDGER_GENERATOR_INITIAL_DELAY_MS", defaults.generator_initial_delay),
            chaos,
            log_json: vars.bool("LEDGER_LOG_JSON", defaults.log_json),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_period.is_zero() {
            return Err(ConfigError::MustBePositive("LEDGER_AUDIT_PERIOD_MS"));
        }
        if self.generator_period.is_zero() {
            return Err(ConfigError::MustBePositive("LEDGER_GENERATOR_PERIOD_MS"));
        }
        if self.issue_capacity == 0 {
            return Err(ConfigError::MustBePositive("LEDGER_AUDIT_ISSUE_CAPACITY"));
        }
        if self.monitored.origin.trim().is_empty() {
            return Err(ConfigError::Empty("LEDGER_AUDIT_ORIGIN_ACCOUNT"));
        }
        if self.monitored.destination.trim().is_empty() {
            return Err(ConfigError::Empty("LEDGER_AUDIT_DESTINATION_ACCOUNT"));
        }
        if self.monitored.origin.eq_ignore_ascii_case(&self.monitored.destination) {
            return Err(ConfigError::SameMonitoredAccount(self.monitored.origin.clone()));
        }
        Ok(())
    }
}
