//! Orchestration shared by the subcommands.

pub mod context;
pub mod error;
pub mod flow;

pub use context::Context;
pub use error::DeployError;
