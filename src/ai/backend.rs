use std::fmt;
use std::rc::Rc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

/// The three model capabilities a run needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Classify,
    Summarize,
    Write,
}

impl Capability {
    /// Acquisition order when models must be downloaded one at a time
    pub const ALL: [Capability; 3] = [Capability::Classify, Capability::Summarize, Capability::Write];

    pub fn index(self) -> usize {
        match self {
            Capability::Classify => 0,
            Capability::Summarize => 1,
            Capability::Write => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Classify => "classify",
            Capability::Summarize => "summarize",
            Capability::Write => "write",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    Ready,
    NeedsDownload,
    Unavailable,
}

/// Download progress sink, called with a percentage in [0, 100]
pub type ProgressFn = Rc<dyn Fn(u8)>;

/// A live handle to one model capability
#[async_trait(?Send)]
pub trait ModelSession {
    /// Run the model on `input`; `context` is a shared-context hint for
    /// summarize/write and ignored by classify.
    async fn generate(&self, input: &str, context: Option<&str>) -> Result<String, InferenceError>;

    /// Release the underlying resources; calling twice is harmless
    fn destroy(&self);
}

#[async_trait(?Send)]
pub trait ModelBackend {
    async fn availability(&self, capability: Capability) -> Result<Availability, InferenceError>;

    async fn create_session(
        &self,
        capability: Capability,
        progress: ProgressFn,
    ) -> Result<Rc<dyn ModelSession>, InferenceError>;
}
