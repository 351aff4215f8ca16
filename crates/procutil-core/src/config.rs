use crate::error::ProcessError;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for retry logic used by process lookups
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Minimum delay between retry attempts (in milliseconds)
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Maximum delay between retry attempts (in milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Maximum number of attempts (1 means a single attempt, no retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Whether to use exponential backoff (true) or fixed delay (false)
    #[serde(default = "default_use_exponential_backoff")]
    pub use_exponential_backoff: bool,

    /// Whether to randomize delays
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            use_exponential_backoff: default_use_exponential_backoff(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Many short retries, for processes expected to appear quickly
    pub fn aggressive() -> Self {
        Self {
            min_delay_ms: 10,
            max_delay_ms: 500,
            max_attempts: 10,
            use_exponential_backoff: true,
            jitter: true,
        }
    }

    pub fn conservative() -> Self {
        Self {
            min_delay_ms: 500,
            max_delay_ms: 2_000,
            max_attempts: 2,
            use_exponential_backoff: false,
            jitter: false,
        }
    }

    /// Fail fast
    pub fn no_retry() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            max_attempts: 1,
            use_exponential_backoff: false,
            jitter: false,
        }
    }

    pub fn validate(&self) -> Result<(), ProcessError> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(ProcessError::Config(
                "min_delay_ms cannot be greater than max_delay_ms".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(ProcessError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if self.max_attempts > 20 {
            return Err(ProcessError::Config(
                "max_attempts should not exceed 20".to_string(),
            ));
        }

        if self.max_delay_ms > 60_000 {
            return Err(ProcessError::Config(
                "max_delay_ms should not exceed 60 seconds".to_string(),
            ));
        }

        Ok(())
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Number of retries after the first attempt
    pub fn retries(&self) -> usize {
        self.max_attempts.saturating_sub(1) as usize
    }

    pub fn retries_enabled(&self) -> bool {
        self.max_attempts > 1
    }
}

/// Configuration shared by every process operation
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
#[serde(rename_all = "camelCase")]
pub struct ProcessUtilConfig {
    /// Interpreter used for shell command strings
    #[builder(default = "default_shell()")]
    #[serde(default = "default_shell")]
    pub shell: String,

    #[builder(default = "default_shell_flag()")]
    #[serde(default = "default_shell_flag")]
    pub shell_flag: String,

    #[builder(default)]
    #[serde(default)]
    pub working_directory: Option<PathBuf>,

    #[builder(default)]
    #[builder(setter(custom))]
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Interval between liveness probes while waiting for a process to exit
    #[builder(default = "default_poll_interval_ms()")]
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Time a process gets between SIGTERM and SIGKILL
    #[builder(default = "default_grace_period_ms()")]
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Pid file written by the supervising service
    #[builder(default)]
    #[serde(default)]
    pub supervisor_pid_file: Option<PathBuf>,

    /// Command line of the supervising service, used when no pid file is usable
    #[builder(default)]
    #[serde(default)]
    pub supervisor_command: Option<String>,

    #[builder(default)]
    #[serde(default)]
    pub lookup_retry: RetryConfig,
}

impl Default for ProcessUtilConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            shell_flag: default_shell_flag(),
            working_directory: None,
            env: HashMap::new(),
            poll_interval_ms: default_poll_interval_ms(),
            grace_period_ms: default_grace_period_ms(),
            supervisor_pid_file: None,
            supervisor_command: None,
            lookup_retry: RetryConfig::default(),
        }
    }
}

impl ProcessUtilConfig {
    pub fn builder() -> ProcessUtilConfigBuilder {
        ProcessUtilConfigBuilder::default()
    }

    /// Parse a camelCase JSON document and validate it
    pub fn from_json(json: &str) -> Result<Self, ProcessError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ProcessError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ProcessError> {
        if self.shell.trim().is_empty() {
            return Err(ProcessError::Config("shell cannot be empty".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ProcessError::Config(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        self.lookup_retry.validate()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl ProcessUtilConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.shell.as_ref().is_some_and(|shell| shell.trim().is_empty()) {
            return Err("shell cannot be empty".to_string());
        }
        if self.poll_interval_ms == Some(0) {
            return Err("poll_interval_ms must be positive".to_string());
        }
        if let Some(retry) = &self.lookup_retry {
            retry.validate().map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    pub fn env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.env.get_or_insert_with(HashMap::new);
        map.insert(key.to_string(), value.to_string());

        self
    }

    pub fn env_multi<T: ToString, I: IntoIterator<Item = (T, T)>>(&mut self, iter: I) -> &mut Self {
        let env = self.env.get_or_insert_with(HashMap::new);
        for (key, value) in iter {
            env.insert(key.to_string(), value.to_string());
        }
        self
    }
}

// Default value functions for serde
fn default_min_delay_ms() -> u64 {
    20
}
fn default_max_delay_ms() -> u64 {
    1_000
}
fn default_max_attempts() -> u32 {
    5
}
fn default_use_exponential_backoff() -> bool {
    true
}
fn default_jitter() -> bool {
    false
}
fn default_shell() -> String {
    "/bin/sh".to_string()
}
fn default_shell_flag() -> String {
    "-c".to_string()
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_grace_period_ms() -> u64 {
    2_000
}
