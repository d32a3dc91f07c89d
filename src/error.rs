/// Error types for Tab Grouper
use thiserror::Error;

use crate::ai::backend::Capability;

/// Failures from the Chrome tabs / tabGroups / windows APIs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    #[error("Tab {0} no longer exists")]
    StaleTab(i32),

    #[error("Platform rejected request: {0}")]
    Rejected(String),

    /// The call never reached the browser (extension context gone, port closed)
    #[error("Platform unreachable: {0}")]
    Disconnected(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("Page refused content extraction: {0}")]
    Refused(String),

    #[error("Content extraction failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("{0} model is unavailable on this device")]
    Unavailable(Capability),

    #[error("Model call failed: {0}")]
    Call(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Failed to check {capability} availability: {source}")]
    Probe {
        capability: Capability,
        source: InferenceError,
    },

    #[error("Failed to create {capability} session: {source}")]
    Create {
        capability: Capability,
        source: InferenceError,
    },

    #[error("{0} session is not initialized")]
    NotReady(Capability),
}

/// Why a raw model reply could not be turned into a classification
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifyError {
    #[error("Model call failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Reply is not a classification object: {0}")]
    Malformed(String),

    #[error("Label {0:?} is not in the category set")]
    UnknownLabel(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Errors that end a grouping run in the Failed state
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}
