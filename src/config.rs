//! Probe configuration.
//!
//! Everything here is a pass-through value supplied by the caller; nothing
//! is discovered from the server at runtime.

use std::collections::HashMap;
use std::time::Duration;

use crate::catalog::DEFAULT_WELL_KNOWN_PATH;

/// Configuration shared by every component of one probe run.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use a2a_check::ProbeConfig;
///
/// let config = ProbeConfig::default()
///     .with_timeout(Duration::from_secs(3))
///     .with_bearer_token("secret")
///     .with_fail_on_warn(true);
/// assert_eq!(config.timeout, Duration::from_secs(3));
/// ```
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Per-request timeout. Defaults to 8 seconds.
    pub timeout: Duration,
    /// Read window for one event stream. Defaults to 12 seconds.
    pub stream_timeout: Duration,
    /// Wall-clock budget for a whole invocation. Defaults to 120 seconds.
    pub overall_budget: Duration,
    /// Verify TLS certificates. Defaults to `true`.
    pub verify_tls: bool,
    /// Path of the agent card relative to the origin.
    pub well_known_path: String,
    /// Bearer token sent as `Authorization` on authenticated probes.
    pub auth_bearer: Option<String>,
    /// Additional HTTP headers to include on every request.
    pub extra_headers: HashMap<String, String>,
    /// Treat WARN findings as failing (exit code 2).
    pub fail_on_warn: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(8),
            stream_timeout: Duration::from_secs(12),
            overall_budget: Duration::from_secs(120),
            verify_tls: true,
            well_known_path: DEFAULT_WELL_KNOWN_PATH.to_string(),
            auth_bearer: None,
            extra_headers: HashMap::new(),
            fail_on_warn: false,
        }
    }
}

impl ProbeConfig {
    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the event-stream read window.
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Set the overall wall-clock budget.
    pub fn with_overall_budget(mut self, budget: Duration) -> Self {
        self.overall_budget = budget;
        self
    }

    /// Disable (or re-enable) TLS certificate verification.
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.verify_tls = !insecure;
        self
    }

    /// Override the well-known card path.
    pub fn with_well_known_path(mut self, path: impl Into<String>) -> Self {
        self.well_known_path = path.into();
        self
    }

    /// Configure a bearer token.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth_bearer = Some(token.into());
        self
    }

    /// Add a custom header sent on every request.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    /// Treat WARN findings as failing.
    pub fn with_fail_on_warn(mut self, enabled: bool) -> Self {
        self.fail_on_warn = enabled;
        self
    }

    /// Returns `true` if a non-empty bearer token is configured.
    pub fn has_credentials(&self) -> bool {
        self.auth_bearer.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// The well-known path, always starting with `/`.
    pub fn normalized_well_known_path(&self) -> String {
        if self.well_known_path.starts_with('/') {
            self.well_known_path.clone()
        } else {
            format!("/{}", self.well_known_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let config = ProbeConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(8));
        assert_eq!(config.stream_timeout, Duration::from_secs(12));
        assert!(config.verify_tls);
        assert_eq!(config.well_known_path, "/.well-known/agent-card.json");
        assert!(!config.has_credentials());
        assert!(!config.fail_on_warn);
    }

    #[test]
    fn empty_token_is_not_a_credential() {
        let config = ProbeConfig::default().with_bearer_token("");
        assert!(!config.has_credentials());
    }

    #[test]
    fn well_known_path_gets_leading_slash() {
        let config = ProbeConfig::default().with_well_known_path("agent.json");
        assert_eq!(config.normalized_well_known_path(), "/agent.json");
    }

    #[test]
    fn insecure_flips_tls_verification() {
        let config = ProbeConfig::default().with_insecure(true);
        assert!(!config.verify_tls);
    }
}
