//! OAuth access tokens for the Dataform API

use crate::error::ApiError;
use std::sync::Arc;
use tokio::process::Command;

/// Environment variables checked for a ready-made bearer token, in order
pub const TOKEN_ENV_VARS: [&str; 2] = ["DATAFORM_ACCESS_TOKEN", "GOOGLE_OAUTH_ACCESS_TOKEN"];

/// Supplies bearer tokens for API requests
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn token(&self) -> Result<String, ApiError>;
}

/// A fixed token
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Token from the first non-empty variable in [`TOKEN_ENV_VARS`]
    pub fn from_env() -> Option<Self> {
        TOKEN_ENV_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .map(Self)
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

#[async_trait::async_trait]
impl TokenSource for StaticToken {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn token(&self) -> Result<String, ApiError> {
        Ok(self.0.clone())
    }
}

/// Token printed by `gcloud auth print-access-token`, fetched per request
#[derive(Debug, Clone)]
pub struct GcloudToken {
    program: String,
}

impl Default for GcloudToken {
    fn default() -> Self {
        Self {
            program: "gcloud".to_string(),
        }
    }
}

impl GcloudToken {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

#[async_trait::async_trait]
impl TokenSource for GcloudToken {
    fn name(&self) -> &'static str {
        "gcloud"
    }

    async fn token(&self) -> Result<String, ApiError> {
        let output = Command::new(&self.program)
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(|e| ApiError::Authentication(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(ApiError::Authentication(format!(
                "{} auth print-access-token failed: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(ApiError::Authentication(format!(
                "{} printed an empty access token",
                self.program
            )));
        }
        Ok(token)
    }
}

/// Environment token when set, otherwise gcloud
pub fn default_token_source() -> Arc<dyn TokenSource> {
    match StaticToken::from_env() {
        Some(token) => Arc::new(token),
        None => Arc::new(GcloudToken::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token() {
        let source = StaticToken::new("ya29.token");
        assert_eq!(source.token().await.unwrap(), "ya29.token");
        assert_eq!(format!("{:?}", source), "StaticToken(***)");
    }

    #[tokio::test]
    async fn missing_gcloud_is_an_auth_error() {
        let source = GcloudToken::with_program("gcloud-binary-that-does-not-exist");
        let err = source.token().await.unwrap_err();
        assert!(matches!(err, ApiError::Authentication(_)));
    }
}
