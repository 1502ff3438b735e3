use std::fmt;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::config::Config;

/// The signed-in user, as far as this client needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.email {
            Some(email) => write!(f, "{} <{}>", self.user_id, email),
            None => write!(f, "{}", self.user_id),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no access token source configured (session.token or session.token_command)")]
    MissingToken,
    #[error("token command failed: {0}")]
    Command(String),
    #[error("token command printed no token")]
    EmptyToken,
}

/// Supplies who the user is and a short-lived bearer token.
///
/// Tokens are asked for once per outbound request; implementations must not
/// hand back a token they know to be stale.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    fn identity(&self) -> Option<Identity>;

    async fn access_token(&self) -> Result<String, SessionError>;
}

#[derive(Debug, Clone)]
pub enum TokenSource {
    None,
    Static(String),
    /// Shell command that mints a fresh token on stdout.
    Command(String),
}

/// Session built from configuration keys under `session.*`.
#[derive(Debug, Clone)]
pub struct ConfiguredSession {
    identity: Option<Identity>,
    source: TokenSource,
    template: String,
}

impl ConfiguredSession {
    pub fn new(identity: Option<Identity>, source: TokenSource, template: &str) -> Self {
        Self {
            identity,
            source,
            template: template.to_string(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let identity = cfg.get("session.user").map(|user_id| Identity {
            user_id,
            email: cfg.get("session.email"),
        });

        let source = if let Some(command) = cfg.get("session.token_command") {
            TokenSource::Command(command)
        } else if let Some(token) = cfg.get("session.token") {
            TokenSource::Static(token)
        } else {
            TokenSource::None
        };

        let template = cfg
            .get("session.template")
            .unwrap_or_else(|| "supabase".to_string());

        debug!(
            signed_in = identity.is_some(),
            source = source.kind(),
            template = %template,
            "configured session"
        );

        Self::new(identity, source, &template)
    }
}

impl TokenSource {
    fn kind(&self) -> &'static str {
        match self {
            TokenSource::None => "none",
            TokenSource::Static(_) => "static",
            TokenSource::Command(_) => "command",
        }
    }
}

#[async_trait]
impl SessionProvider for ConfiguredSession {
    fn identity(&self) -> Option<Identity> {
        self.identity.clone()
    }

    #[instrument(skip(self), fields(source = self.source.kind()))]
    async fn access_token(&self) -> Result<String, SessionError> {
        match &self.source {
            TokenSource::None => Err(SessionError::MissingToken),
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Command(command) => run_token_command(command, &self.template).await,
        }
    }
}

async fn run_token_command(command: &str, template: &str) -> Result<String, SessionError> {
    debug!(template, "minting access token");
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .env("SNAPTASK_TOKEN_TEMPLATE", template)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|err| SessionError::Command(format!("failed to spawn: {err}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !stderr.is_empty() {
            warn!(stderr = %stderr, "token command failed");
        }
        return Err(SessionError::Command(format!(
            "exited with status {}",
            output
                .status
                .code()
                .map(|code| code.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        )));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(ToString::to_string)
        .ok_or(SessionError::EmptyToken)
}
