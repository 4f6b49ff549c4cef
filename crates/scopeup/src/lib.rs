//! Local dev orchestration for block-explorer stacks.
//!
//! Each configured chain gets an isolated workspace directory, a
//! `docker compose` subprocess running a backend + frontend + database
//! group, and supervision that ties the whole fleet's lifetime together.

pub mod compose;
pub mod envfile;
pub mod instance;
pub mod orchestrator;
pub mod signal;
pub mod verifier;
pub mod workspace;

pub use instance::Instance;
pub use orchestrator::Orchestrator;
pub use signal::Latch;
pub use workspace::WorkspaceManager;
