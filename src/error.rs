//! Error types shared by the gateways, the tier loader and the apply path.

use std::path::PathBuf;

/// Failure of a Policy Store or Interface Counter gateway call.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The query could not be run: spawn failure, non-zero exit, unreadable file.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// The query ran but its output does not have the expected shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::MalformedPayload(e.to_string())
    }
}

/// Failure to load the tier-definition document.
#[derive(Debug, thiserror::Error)]
pub enum TierConfigError {
    #[error("tier document not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("tier document invalid: {0}")]
    Invalid(String),
}

/// Failure to read or write the settings document.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to access settings file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure to apply a policy for one application.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("application '{0}' is not listed in any priority tier")]
    UnknownApplication(String),

    #[error("could not find a running process for {0}, please make sure it is open")]
    ProcessNotRunning(String),

    #[error("tier '{0}' has no DSCP value configured")]
    MissingDscp(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
