//! Error types for engine and session operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("must specify pulumi org via flag or config file")]
    Config,

    #[error("Invalid deployment name '{0}': use lowercase letters, digits and '-' (max 63 chars)")]
    InvalidName(String),

    #[error("Failed to set config '{key}': {message}")]
    Configuration { key: String, message: String },

    #[error("Error installing {provider} plugin {version}: {cause}")]
    PluginInstall {
        provider: String,
        version: String,
        cause: String,
    },

    #[error("{0}")]
    Operation(String),

    #[error("Expected output '{0}' is missing or not a string")]
    MissingOutput(String),

    #[error("pulumi CLI not found. Install it from https://www.pulumi.com/docs/install/")]
    EngineNotInstalled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed engine JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render program: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, DeployError>;

impl DeployError {
    /// Stable, single-line message for the operator.
    pub fn summary(&self) -> String {
        last_line(&self.to_string())
            .unwrap_or("unknown error")
            .to_string()
    }
}

/// Last non-blank line of `text`, trimmed. Engine output ends with the
/// line that names the failure.
pub fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}
