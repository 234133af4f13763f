pub mod builder;
pub mod config;
pub mod divergence;
pub mod io;
pub mod manifest;
pub mod publish;
pub mod remote;
pub mod retention;
pub mod sync;
pub mod version;

pub mod reporter;

pub use config::{Credentials, DeployConfig};
pub use reporter::{NullReporter, Reporter};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("relman/", env!("CARGO_PKG_VERSION"));
