pub mod check;
pub mod deploy;
pub mod prune;
pub mod publish;
pub mod sync;
pub mod version;
