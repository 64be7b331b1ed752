//! pb-chat: the interactive session
//!
//! Owns the probe runner and the model providers, and walks one user from
//! address entry to a retrieval-backed conversation about the probe.

pub mod session;

pub use session::{
    Screen, SessionConfig, SessionContext, SessionController, SessionSummary,
};
