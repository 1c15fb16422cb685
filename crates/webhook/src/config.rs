use std::time::Duration;

use imagegen_core::ConfigError;

/// Default per-call timeout. Generation routinely takes over a minute.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default `User-Agent` header sent to the endpoint.
pub const DEFAULT_USER_AGENT: &str = "SEO-Engine-Image-Generator/1.0";

/// Generation endpoint configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Full URL the payload is POSTed to.
    pub url: String,
    /// Wall-clock limit for one round trip, including reading the body.
    pub timeout: Duration,
    pub user_agent: String,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// | Env Var                | Default                           |
    /// |------------------------|-----------------------------------|
    /// | `WEBHOOK_URL`          | (required)                        |
    /// | `WEBHOOK_TIMEOUT_SECS` | `120`                             |
    /// | `WEBHOOK_USER_AGENT`   | `SEO-Engine-Image-Generator/1.0`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("WEBHOOK_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("WEBHOOK_URL"))?;
        validate_url(&url)?;

        let timeout_secs: u64 = match std::env::var("WEBHOOK_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
                name: "WEBHOOK_TIMEOUT_SECS",
                reason: format!("{e}"),
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "WEBHOOK_TIMEOUT_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        let user_agent =
            std::env::var("WEBHOOK_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.into());

        Ok(Self {
            url,
            timeout: Duration::from_secs(timeout_secs),
            user_agent,
        })
    }
}

/// Require an absolute `http(s)` URL.
pub fn validate_url(url: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| ConfigError::Invalid {
        name: "WEBHOOK_URL",
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Invalid {
            name: "WEBHOOK_URL",
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WebhookConfig::new("https://example.com/webhook/abc");
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn accepts_http_and_https() {
        assert!(validate_url("https://example.com/hook").is_ok());
        assert!(validate_url("http://127.0.0.1:8080/hook").is_ok());
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert!(validate_url("ftp://example.com/hook").is_err());
        assert!(validate_url("not a url").is_err());
    }
}
