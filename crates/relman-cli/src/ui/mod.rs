//! Terminal output.
//!
//! Core components report through [`relman_core::Reporter`]; [`Output`] is
//! the terminal implementation. Events are funnelled to one thread so
//! progress lines from different phases never interleave.
//!
//! - [`theme`] - Colors and icons
//! - [`progress`] - Progress bar and size formatting
//! - [`actor`] - Event loop that owns stdout
//! - [`output`] - Handle used by commands

pub mod actor;
pub mod output;
pub mod progress;
pub mod theme;

pub use output::Output;
pub use theme::Theme;
