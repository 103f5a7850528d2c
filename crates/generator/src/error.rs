use std::io;
use std::path::PathBuf;

/// Every failure is terminal for the run.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("invalid {variable}={value:?}: {reason}")]
    Config {
        variable: &'static str,
        value: String,
        reason: String,
    },

    #[error("template file not found: {}", path.display())]
    MissingTemplate { path: PathBuf },

    #[error("failed to read template {}: {error}", path.display())]
    ReadTemplate { path: PathBuf, error: io::Error },

    #[error("failed to parse template {}: {error}", path.display())]
    ParseTemplate {
        path: PathBuf,
        error: serde_yaml::Error,
    },

    #[error("no `{service}` service definition available")]
    MissingService { service: &'static str },

    #[error("failed to encode manifest: {0}")]
    Serialize(serde_yaml::Error),

    #[error("failed to write {}: {error}", path.display())]
    Output { path: PathBuf, error: io::Error },
}

pub type Result<T, E = GenerateError> = std::result::Result<T, E>;
