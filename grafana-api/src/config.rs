//! Connection settings for [`HttpTransport`](crate::transport::HttpTransport).
//!
//! | Env var                | Default                 |
//! |------------------------|-------------------------|
//! | `GRAFANA_URL`          | `http://localhost:3000` |
//! | `GRAFANA_TOKEN`        | optional                |
//! | `GRAFANA_BASIC_AUTH`   | optional, `user:pass`   |
//! | `GRAFANA_ORG_ID`       | optional                |
//! | `GRAFANA_TIMEOUT_SECS` | `30`                    |

use std::fmt;
use std::time::Duration;

use reqwest::Url;

use crate::error::ConfigError;

pub const DEFAULT_URL: &str = "http://localhost:3000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials attached to every request.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// Service account or API token.
    Bearer(String),
    Basic { user: String, password: String },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Auth::Basic { user, .. } => f
                .debug_struct("Basic")
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: Url,
    pub auth: Option<Auth>,
    /// Sent as `X-Grafana-Org-Id` when set.
    pub org_id: Option<i64>,
    pub timeout: Duration,
}

impl TransportConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|e| ConfigError::InvalidUrl {
            value: base_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            base_url,
            auth: None,
            org_id: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(Auth::Bearer(token.into()));
        self
    }

    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(Auth::Basic {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_org_id(mut self, org_id: i64) -> Self {
        self.org_id = Some(org_id);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the configuration from `GRAFANA_*` environment variables.
    ///
    /// A token takes precedence over basic auth when both are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup("GRAFANA_URL").unwrap_or_else(|| DEFAULT_URL.to_string());
        let mut config = Self::new(&url)?;

        if let Some(basic) = lookup("GRAFANA_BASIC_AUTH").filter(|b| !b.is_empty()) {
            let (user, password) = basic
                .split_once(':')
                .ok_or(ConfigError::InvalidBasicAuth)?;
            config = config.with_basic_auth(user, password);
        }
        if let Some(token) = lookup("GRAFANA_TOKEN").filter(|t| !t.is_empty()) {
            config = config.with_token(token);
        }
        if let Some(org) = lookup("GRAFANA_ORG_ID") {
            let org_id = org
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidOrgId(org.clone()))?;
            config = config.with_org_id(org_id);
        }
        if let Some(secs) = lookup("GRAFANA_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(secs.clone()))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }
}
