//! Engine configuration
//!
//! All configuration is passed in explicitly when the client is constructed.
//! There is no process-wide mutable state: two clients with different
//! configurations can coexist in the same process.

use std::time::Duration;

use crate::{consts, errors::ConfigError};

/// Connection details for the payment gateway.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Base URL of the gateway API, e.g. `https://api.gateway.example`
    pub base_url: String,
    /// URL the gateway redirects to once a step-up confirmation completes.
    /// Matched as an exact prefix, since the gateway appends query parameters.
    pub callback_url: String,
    /// Status polling behaviour
    pub poll: PollConfig,
}

/// Bounds for the status polling loop.
#[derive(Clone, Debug)]
pub struct PollConfig {
    /// Wall-clock deadline measured from the first probe
    pub timeout: Duration,
    /// Fixed delay between probes
    pub delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: consts::DEFAULT_POLL_TIMEOUT,
            delay: consts::DEFAULT_POLL_DELAY,
        }
    }
}

impl GatewayConfig {
    /// Builds a configuration with default polling bounds.
    pub fn new(base_url: impl Into<String>, callback_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            callback_url: callback_url.into(),
            poll: PollConfig::default(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let base = url::Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(self.base_url.clone()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        url::Url::parse(&self.callback_url)
            .map_err(|_| ConfigError::InvalidCallbackUrl(self.callback_url.clone()))?;
        Ok(())
    }

    /// Base URL with any trailing slash removed, ready for path concatenation.
    pub(crate) fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https_base_url() {
        let config = GatewayConfig::new("https://api.gateway.example", "https://merchant.example/callback");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_http_base_url() {
        let config = GatewayConfig::new("ftp://api.gateway.example", "https://merchant.example/callback");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBaseUrl(_))));
    }

    #[test]
    fn rejects_unparseable_callback_url() {
        let config = GatewayConfig::new("https://api.gateway.example", "not a url");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCallbackUrl(_))));
    }
}
