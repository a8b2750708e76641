//! JWT generators for broker authentication
//!
//! Consulted only when the broker URL scheme is `wss`. The token is placed
//! in the HTTP upgrade header on the initial connect and on every
//! reconnect, so `token()` is called per connection attempt.

use super::{ControllerError, JwtGenerator};
use crate::config::MqttSection;
use std::path::PathBuf;
use std::sync::Arc;

/// Serves a token resolved once from an environment variable.
#[derive(Debug)]
pub struct StaticJwtGenerator {
    token: String,
}

impl StaticJwtGenerator {
    pub fn from_env(env_var: &str) -> Result<Self, ControllerError> {
        let token = std::env::var(env_var).map_err(|_| {
            ControllerError::Token(format!("environment variable {env_var} is not set"))
        })?;
        Ok(Self { token })
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl JwtGenerator for StaticJwtGenerator {
    fn token(&self) -> Result<String, ControllerError> {
        Ok(self.token.clone())
    }
}

/// Re-reads the token file on every call, picking up rotated credentials
/// without a restart.
pub struct FileJwtGenerator {
    path: PathBuf,
}

impl FileJwtGenerator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl JwtGenerator for FileJwtGenerator {
    fn token(&self) -> Result<String, ControllerError> {
        let token = std::fs::read_to_string(&self.path).map_err(|e| {
            ControllerError::Token(format!(
                "failed to read token file {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(token.trim().to_string())
    }
}

/// Build the configured JWT generator.
pub fn new_jwt_generator(cfg: &MqttSection) -> Result<Arc<dyn JwtGenerator>, ControllerError> {
    match cfg.jwt_generator_impl.as_str() {
        "static" => {
            let env_var = cfg.jwt_token_env.as_deref().ok_or_else(|| {
                ControllerError::Token("jwt_token_env is required for the static generator".into())
            })?;
            Ok(Arc::new(StaticJwtGenerator::from_env(env_var)?))
        }
        "file" => {
            let path = cfg.jwt_token_file.as_ref().ok_or_else(|| {
                ControllerError::Token("jwt_token_file is required for the file generator".into())
            })?;
            Ok(Arc::new(FileJwtGenerator::new(path)))
        }
        other => Err(ControllerError::UnknownImpl {
            contract: "jwt generator",
            selector: other.to_string(),
        }),
    }
}
