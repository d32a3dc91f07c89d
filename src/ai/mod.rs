/// On-device text-generation plumbing
pub mod backend;
pub mod prompts;
pub mod session;

pub use backend::{Availability, Capability, ModelBackend, ModelSession, ProgressFn};
pub use session::SessionManager;
