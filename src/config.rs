use log::warn;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::client::SolverClient;
use crate::error::TransportError;
use crate::models::ProblemMeta;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_SOLVER_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_JSON_LIMIT: usize = 2 * 1024 * 1024;

/// What to do with validation issues when a problem is submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationPolicy {
    /// Log every issue and submit anyway; the solver has the final word.
    #[default]
    Warn,
    /// Refuse to submit while any issue remains.
    Reject,
}

impl FromStr for ValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warn" => Ok(ValidationPolicy::Warn),
            "reject" | "strict" => Ok(ValidationPolicy::Reject),
            other => Err(other.to_string()),
        }
    }
}

/// Studio settings, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub solver_base_url: String,
    pub json_limit: usize,
    pub solver_timeout: Option<Duration>,
    pub validation_policy: ValidationPolicy,
    pub problem: ProblemMeta,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            solver_base_url: DEFAULT_SOLVER_BASE_URL.to_string(),
            json_limit: DEFAULT_JSON_LIMIT,
            solver_timeout: None,
            validation_policy: ValidationPolicy::default(),
            problem: ProblemMeta::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let solver_base_url = env::var("SOLVER_BASE_URL").unwrap_or(defaults.solver_base_url);

        let json_limit = env::var("JSON_PAYLOAD_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.json_limit);

        let solver_timeout = env::var("SOLVER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs);

        let validation_policy = match env::var("VALIDATION_POLICY") {
            Ok(value) => value.parse().unwrap_or_else(|other| {
                warn!("unknown VALIDATION_POLICY {:?}, using warn", other);
                ValidationPolicy::Warn
            }),
            Err(_) => defaults.validation_policy,
        };

        let problem = ProblemMeta {
            name: env::var("PROBLEM_NAME").unwrap_or(defaults.problem.name),
            description: env::var("PROBLEM_DESCRIPTION").unwrap_or(defaults.problem.description),
        };

        Self {
            port,
            solver_base_url,
            json_limit,
            solver_timeout,
            validation_policy,
            problem,
        }
    }

    pub fn solver_client(&self) -> Result<SolverClient, TransportError> {
        match self.solver_timeout {
            Some(timeout) => SolverClient::with_timeout(&self.solver_base_url, timeout),
            None => SolverClient::new(&self.solver_base_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 7] = [
        "PORT",
        "SOLVER_BASE_URL",
        "JSON_PAYLOAD_LIMIT",
        "SOLVER_TIMEOUT_SECS",
        "VALIDATION_POLICY",
        "PROBLEM_NAME",
        "PROBLEM_DESCRIPTION",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = Config::from_env();

        assert_eq!(config.port, 8000);
        assert_eq!(config.solver_base_url, "http://localhost:8080");
        assert_eq!(config.json_limit, 2 * 1024 * 1024);
        assert_eq!(config.solver_timeout, None);
        assert_eq!(config.validation_policy, ValidationPolicy::Warn);
        assert_eq!(config.problem, ProblemMeta::default());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var("PORT", "9100");
        env::set_var("SOLVER_TIMEOUT_SECS", "30");
        env::set_var("VALIDATION_POLICY", "Reject");
        env::set_var("PROBLEM_NAME", "Semana 1");

        let config = Config::from_env();
        clear_env();

        assert_eq!(config.port, 9100);
        assert_eq!(config.solver_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.validation_policy, ValidationPolicy::Reject);
        assert_eq!(config.problem.name, "Semana 1");
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_garbage() {
        clear_env();
        env::set_var("PORT", "not-a-port");
        env::set_var("VALIDATION_POLICY", "sometimes");

        let config = Config::from_env();
        clear_env();

        assert_eq!(config.port, 8000);
        assert_eq!(config.validation_policy, ValidationPolicy::Warn);
    }

    #[test]
    fn test_solver_client_rejects_bad_url() {
        let config = Config {
            solver_base_url: "::nope::".to_string(),
            ..Config::default()
        };
        assert!(config.solver_client().is_err());
    }
}
