//! Environment-driven configuration
//!
//! Every section reads its own `GITCMS_*` variables in a `from_env()`
//! constructor; `AppConfig::from_env` gathers them for the binary. The
//! binary loads `.env` with `dotenvy` before calling in here.

use crate::handler::{Principal, Role};
use gitcms_core::errors::{CmsError, ErrorKind, Result};
use gitcms_core_types::Sensitive;
use gitcms_store::GitHubConfig;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_MS: u64 = 250;
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const DEFAULT_BIND: &str = "127.0.0.1:8787";

fn config_error(message: impl Into<String>) -> CmsError {
    CmsError::new(ErrorKind::Config)
        .with_op("load_config")
        .with_message(message)
}

/// Parse an optional variable, failing on a present but unparsable value
fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| config_error(format!("{} has an invalid value '{}'", name, raw))),
        _ => Ok(None),
    }
}

/// Retry policy of the commit orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitConfig {
    /// Attempts before giving up with `CommitConflictExhausted` (at least 1)
    pub max_attempts: u32,
    /// Base pause between attempts, multiplied by the attempt number
    pub retry_backoff: Duration,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

impl CommitConfig {
    /// - `GITCMS_COMMIT_MAX_ATTEMPTS`: optional (default: 3, minimum 1)
    /// - `GITCMS_COMMIT_BACKOFF_MS`: optional (default: 250)
    ///
    /// # Errors
    ///
    /// `Config` on unparsable values or zero attempts.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            max_attempts: parse_env("GITCMS_COMMIT_MAX_ATTEMPTS")?
                .unwrap_or(defaults.max_attempts),
            retry_backoff: parse_env("GITCMS_COMMIT_BACKOFF_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_backoff),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// # Errors
    ///
    /// `Config` if `max_attempts` is zero or `retry_backoff` exceeds 60s.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(config_error("GITCMS_COMMIT_MAX_ATTEMPTS must be at least 1"));
        }
        if self.retry_backoff > MAX_BACKOFF {
            return Err(config_error(format!(
                "GITCMS_COMMIT_BACKOFF_MS must be at most {}",
                MAX_BACKOFF.as_millis()
            )));
        }
        Ok(())
    }

    /// Pause after losing the race on attempt `attempt`
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_backoff.saturating_mul(attempt)
    }
}

/// Where to announce successful commits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildConfig {
    pub hook_url: Option<String>,
}

impl RebuildConfig {
    /// - `GITCMS_REBUILD_HOOK_URL`: optional; no hook when unset
    pub fn from_env() -> Self {
        Self {
            hook_url: std::env::var("GITCMS_REBUILD_HOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
        }
    }
}

/// HTTP surface settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    tokens: Vec<(Sensitive<String>, Principal)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            tokens: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// - `GITCMS_BIND`: optional listen address (default: 127.0.0.1:8787)
    /// - `GITCMS_API_TOKENS`: optional `token:role,token:role` list
    ///
    /// # Errors
    ///
    /// `Config` if the token list is malformed or names an unknown role.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(bind) = std::env::var("GITCMS_BIND") {
            config.bind = bind;
        }
        if let Ok(tokens) = std::env::var("GITCMS_API_TOKENS") {
            config.tokens = parse_tokens(&tokens)?;
        }
        Ok(config)
    }

    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.push((Sensitive::new(token.into()), principal));
        self
    }

    /// Principal a bearer token maps to
    pub fn principal_for(&self, token: &str) -> Option<&Principal> {
        self.tokens
            .iter()
            .find(|(known, _)| known.expose() == token)
            .map(|(_, principal)| principal)
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// Parse `token:role,token:role`; the principal id is the token's position
fn parse_tokens(raw: &str) -> Result<Vec<(Sensitive<String>, Principal)>> {
    let mut tokens = Vec::new();
    let pairs = raw.split(',').map(str::trim).filter(|p| !p.is_empty());
    for (index, pair) in pairs.enumerate() {
        let (token, role) = pair.rsplit_once(':').ok_or_else(|| {
            config_error(format!("GITCMS_API_TOKENS entry {} is not token:role", index))
        })?;
        if token.is_empty() {
            return Err(config_error(format!(
                "GITCMS_API_TOKENS entry {} has an empty token",
                index
            )));
        }
        let role: Role = role.parse().map_err(|_| {
            config_error(format!(
                "GITCMS_API_TOKENS entry {} has unknown role '{}'",
                index, role
            ))
        })?;
        tokens.push((
            Sensitive::new(token.to_string()),
            Principal::new(format!("token-{}", index), vec![role]),
        ));
    }
    Ok(tokens)
}

/// Everything the binary needs
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` when the GitHub variables are absent; the binary then refuses
    /// to run unless an in-memory repository was requested
    pub github: Option<GitHubConfig>,
    pub commit: CommitConfig,
    pub rebuild: RebuildConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// # Errors
    ///
    /// `Config` if any section fails to load.
    pub fn from_env() -> Result<Self> {
        let github = match GitHubConfig::from_env() {
            Ok(config) => Some(config),
            Err(e) if e.kind() == ErrorKind::Config => {
                tracing::debug!(reason = %e, "GitHub repository not configured");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            github,
            commit: CommitConfig::from_env()?,
            rebuild: RebuildConfig::from_env(),
            server: ServerConfig::from_env()?,
        })
    }

    /// # Errors
    ///
    /// `Config` if the GitHub variables were not set.
    pub fn require_github(&self) -> Result<&GitHubConfig> {
        self.github.as_ref().ok_or_else(|| {
            config_error(
                "GITCMS_GITHUB_OWNER, GITCMS_GITHUB_REPO and GITCMS_GITHUB_TOKEN must be set",
            )
        })
    }
}
