//! Error types for bridge-core.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using bridge-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Why a remediation attempt ended in `Failed`.
///
/// The `Display` strings are shown to the user verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The service never accepted a connection within the poll ceiling.
    RemediationTimeout,
    /// The binary that performs the remediation is not installed.
    ToolNotInstalled,
    /// The artifact fetch command exited non-zero.
    FetchFailed,
}

impl FailureReason {
    /// Hint printed under the failure line.
    pub fn hint(&self) -> &'static str {
        match self {
            FailureReason::RemediationTimeout => {
                "The local server never came up. Try running `ollama serve` manually."
            }
            FailureReason::ToolNotInstalled => {
                "Install Ollama from https://ollama.com/download and try again."
            }
            FailureReason::FetchFailed => {
                "Check the local model id in Settings and your network connection."
            }
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            FailureReason::RemediationTimeout => "remediation timeout",
            FailureReason::ToolNotInstalled => "tool not installed",
            FailureReason::FetchFailed => "fetch failed",
        };
        f.write_str(reason)
    }
}

/// Core error types for bridge operations
#[derive(Error, Debug)]
pub enum Error {
    // Readiness errors
    #[error("{0}")]
    Remediation(FailureReason),

    // Dispatch errors
    #[error("{name} not found. Searched: {}", format_locations(.searched))]
    ExecutableNotFound { name: String, searched: Vec<PathBuf> },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create an error for an agent binary missing from every search location
    pub fn executable_not_found(name: impl Into<String>, searched: Vec<PathBuf>) -> Self {
        Self::ExecutableNotFound {
            name: name.into(),
            searched,
        }
    }

    /// Only a missing agent binary ends the session; everything else returns to the menu.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ExecutableNotFound { .. })
    }
}

impl From<FailureReason> for Error {
    fn from(reason: FailureReason) -> Self {
        Error::Remediation(reason)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

fn format_locations(searched: &[PathBuf]) -> String {
    if searched.is_empty() {
        return "(no locations)".to_string();
    }
    searched
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
