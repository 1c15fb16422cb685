use std::time::Duration;

use imagegen_core::ConfigError;

/// Default number of batch items in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Default wall-clock limit for one generation call.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum batch items dispatched concurrently. Always at least 1.
    pub concurrency: usize,
    /// Applied around every generator call, independently of any timeout
    /// the generator enforces itself.
    pub call_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
        }
    }
}

impl PipelineConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// | Env Var                | Default |
    /// |------------------------|---------|
    /// | `BATCH_CONCURRENCY`    | `1`     |
    /// | `WEBHOOK_TIMEOUT_SECS` | `120`   |
    pub fn from_env() -> Result<Self, ConfigError> {
        let concurrency = parse_positive("BATCH_CONCURRENCY", DEFAULT_CONCURRENCY as u64)?;
        let timeout_secs = parse_positive("WEBHOOK_TIMEOUT_SECS", DEFAULT_CALL_TIMEOUT_SECS)?;

        Ok(Self {
            concurrency: concurrency as usize,
            call_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_positive(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let value = match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
            name,
            reason: format!("{e}"),
        })?,
        Err(_) => default,
    };
    if value == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
