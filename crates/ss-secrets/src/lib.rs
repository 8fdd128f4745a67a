//! StaffSync secrets management
//!
//! Unified interface for secret material loaded at startup. The token signing
//! secret is never hardcoded; services resolve it through a provider:
//! - Environment variables (default)
//! - File-per-secret directory (Docker/Kubernetes secret mounts)

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum SecretsError {
    #[error("Secret not found: {0}")]
    NotFound(String),
    #[error("Invalid key format: {0}")]
    InvalidKey(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Configuration for secrets providers
#[derive(Debug, Clone)]
pub struct SecretsConfig {
    pub provider: String,
    pub data_dir: PathBuf,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            provider: "env".to_string(),
            data_dir: PathBuf::from("/run/secrets"),
        }
    }
}

/// Secrets provider trait
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get a secret by key
    async fn get(&self, key: &str) -> Result<String, SecretsError>;

    /// Provider name
    fn name(&self) -> &str;
}

/// Reads secrets from environment variables. Keys are used verbatim.
pub struct EnvProvider;

#[async_trait]
impl Provider for EnvProvider {
    async fn get(&self, key: &str) -> Result<String, SecretsError> {
        std::env::var(key).map_err(|_| SecretsError::NotFound(key.to_string()))
    }

    fn name(&self) -> &str {
        "env"
    }
}

/// Reads secrets from one-file-per-key under a directory, the layout used by
/// Docker secrets and Kubernetes secret volume mounts. Trailing whitespace is
/// trimmed since mounted files usually end with a newline.
pub struct FileProvider {
    data_dir: PathBuf,
}

impl FileProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }
}

#[async_trait]
impl Provider for FileProvider {
    async fn get(&self, key: &str) -> Result<String, SecretsError> {
        if key.contains('/') || key.contains("..") {
            return Err(SecretsError::InvalidKey(key.to_string()));
        }
        let path = self.data_dir.join(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(contents.trim_end().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SecretsError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Create a provider based on configuration
pub fn create_provider(config: &SecretsConfig) -> Result<Arc<dyn Provider>, SecretsError> {
    match config.provider.as_str() {
        "env" => {
            info!("Using environment variable secrets provider");
            Ok(Arc::new(EnvProvider))
        }
        "file" => {
            info!("Using file secrets provider at {}", config.data_dir.display());
            Ok(Arc::new(FileProvider::new(config.data_dir.clone())))
        }
        other => Err(SecretsError::ProviderError(format!("Unknown provider: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn env_provider_reads_variables() {
        std::env::set_var("SS_TEST_SECRET", "sekrit");
        let provider = EnvProvider;
        assert_eq!(provider.get("SS_TEST_SECRET").await.unwrap(), "sekrit");
        assert!(matches!(
            provider.get("SS_TEST_MISSING").await,
            Err(SecretsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn file_provider_trims_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("jwt_secret"), "topsecret\n").unwrap();

        let provider = FileProvider::new(dir.path());
        assert_eq!(provider.get("jwt_secret").await.unwrap(), "topsecret");
    }

    #[tokio::test]
    async fn file_provider_rejects_path_traversal() {
        let provider = FileProvider::new("/run/secrets");
        assert!(matches!(
            provider.get("../etc/passwd").await,
            Err(SecretsError::InvalidKey(_))
        ));
    }
}
