//! Bearer token acquisition.
//!
//! The purge run needs one bearer token for its whole lifetime. Where it comes
//! from is behind [`TokenProvider`]: normally the Azure CLI, or a token handed in
//! explicitly through configuration.

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{PurgeError, Result};

/// Produces a bearer token for the management API.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a non-empty bearer token.
    async fn token(&self) -> Result<String>;
}

/// Runs `az account get-access-token` and reads the token from stdout.
#[derive(Debug, Clone)]
pub struct AzureCliTokenProvider {
    program: String,
    args: Vec<String>,
}

impl AzureCliTokenProvider {
    pub fn new() -> Self {
        Self {
            program: "az".to_string(),
            args: [
                "account",
                "get-access-token",
                "--query",
                "accessToken",
                "--output",
                "tsv",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }

    /// Use a different executable and arguments, e.g. a wrapper script.
    pub fn with_command(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Default for AzureCliTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenProvider for AzureCliTokenProvider {
    #[tracing::instrument(skip(self), fields(program = %self.program))]
    async fn token(&self) -> Result<String> {
        tracing::debug!("Requesting access token");

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| {
                PurgeError::TokenAcquisition(format!("failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PurgeError::TokenAcquisition(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        non_empty(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// A token supplied up front.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<String> {
        non_empty(self.token.clone())
    }
}

fn non_empty(raw: String) -> Result<String> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(PurgeError::TokenAcquisition(
            "Azure authentication token is required".to_string(),
        ));
    }
    Ok(token.to_string())
}
