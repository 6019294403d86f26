use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Top-level configuration, loaded from TOML. Every section has defaults, so
/// an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub solver: SolverConfig,
    pub limits: Limits,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Settings handed to the MILP backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SolverConfig {
    pub backend: String,
    /// HiGHS is pinned to one thread and a fixed seed so repeated solves
    /// reach the same objective.
    pub threads: u32,
    pub random_seed: u32,
    pub log_to_console: bool,
    /// Default wall-clock budget per solve; `None` means unbounded.
    pub time_limit_secs: Option<f64>,
    /// Upper bound on re-solves spent shrinking an infeasibility certificate.
    pub certificate_max_solves: usize,
    /// Wall-clock deadline shared by all of those re-solves.
    pub certificate_time_limit_secs: f64,
    pub feasibility_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            backend: "highs".into(),
            threads: 1,
            random_seed: 1234,
            log_to_console: false,
            time_limit_secs: Some(60.0),
            certificate_max_solves: 400,
            certificate_time_limit_secs: 30.0,
            feasibility_tolerance: 1e-6,
        }
    }
}

impl SolverConfig {
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs.map(Duration::from_secs_f64)
    }

    pub fn certificate_time_limit(&self) -> Duration {
        Duration::from_secs_f64(self.certificate_time_limit_secs)
    }
}

/// Instance size caps. Mutual exclusion grows as `teams · tasks²`; the shift
/// model has one binary per agent, day and shift.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Limits {
    pub max_tasks: usize,
    pub max_teams: usize,
    pub max_agents: usize,
    pub max_days: usize,
    pub max_shifts: usize,
    /// Cap on `agents × days × shifts`.
    pub max_shift_variables: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_tasks: 96,
            max_teams: 10,
            max_agents: 200,
            max_days: 366,
            max_shifts: 24,
            max_shift_variables: 200_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub max_concurrent_solves: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".into(),
            max_concurrent_solves: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(secs) = self.solver.time_limit_secs {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "solver.time_limit_secs",
                    reason: format!("must be a positive number of seconds, got {secs}"),
                });
            }
        }
        let cert = self.solver.certificate_time_limit_secs;
        if !cert.is_finite() || cert <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "solver.certificate_time_limit_secs",
                reason: format!("must be a positive number of seconds, got {cert}"),
            });
        }
        if self.solver.threads == 0 {
            return Err(ConfigError::InvalidValue {
                field: "solver.threads",
                reason: "must be at least 1".into(),
            });
        }
        if !(self.solver.feasibility_tolerance > 0.0 && self.solver.feasibility_tolerance < 1e-2) {
            return Err(ConfigError::InvalidValue {
                field: "solver.feasibility_tolerance",
                reason: format!("must lie in (0, 0.01), got {}", self.solver.feasibility_tolerance),
            });
        }
        if self.server.max_concurrent_solves == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.max_concurrent_solves",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.solver.backend, "highs");
        assert_eq!(config.solver.threads, 1);
        assert_eq!(config.solver.time_limit(), Some(Duration::from_secs(60)));
        assert_eq!(config.limits.max_teams, 10);
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn partial_sections_override_only_named_fields() {
        let config = Config::from_toml_str(
            r#"
            [solver]
            time_limit_secs = 5.0
            certificate_max_solves = 10

            [limits]
            max_tasks = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.solver.time_limit(), Some(Duration::from_secs(5)));
        assert_eq!(config.solver.certificate_max_solves, 10);
        assert_eq!(config.solver.random_seed, 1234);
        assert_eq!(config.limits.max_tasks, 20);
        assert_eq!(config.limits.max_agents, 200);
    }

    #[test]
    fn rejects_non_positive_time_limit() {
        let err = Config::from_toml_str("[solver]\ntime_limit_secs = 0.0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "solver.time_limit_secs",
                ..
            }
        ));
    }

    #[test]
    fn shift_limits_and_certificate_deadline_have_defaults() {
        let config = Config::from_toml_str("[limits]\nmax_days = 31\n").unwrap();
        assert_eq!(config.limits.max_days, 31);
        assert_eq!(config.limits.max_shifts, 24);
        assert_eq!(config.limits.max_shift_variables, 200_000);
        assert_eq!(config.solver.certificate_time_limit(), Duration::from_secs(30));

        let err = Config::from_toml_str("[solver]\ncertificate_time_limit_secs = -1.0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "solver.certificate_time_limit_secs",
                ..
            }
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            Config::from_toml_str("[solver\nthreads = 1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
