//! Reporter trait for dependency injection
//!
//! This trait allows core logic to report progress and status without
//! being coupled to a specific terminal implementation.

pub trait Reporter: Send + Sync {
    /// Indicates a new phase has started (e.g. "Pruning", "Publishing").
    fn section(&self, title: &str);

    /// Updates the progress of an asset download.
    fn downloading(&self, name: &str, current: u64, total: Option<u64>);

    /// An asset upload of `size` bytes is starting.
    fn uploading(&self, name: &str, size: u64);

    /// A file is being removed from the release directory.
    fn removing(&self, name: &str);

    /// Marks an asset operation as successfully completed.
    fn done(&self, name: &str, detail: &str, size: Option<u64>);

    /// Marks an asset operation as failed with a specific reason.
    fn failed(&self, name: &str, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn downloading(&self, name: &str, current: u64, total: Option<u64>) {
        (**self).downloading(name, current, total);
    }
    fn uploading(&self, name: &str, size: u64) {
        (**self).uploading(name, size);
    }
    fn removing(&self, name: &str) {
        (**self).removing(name);
    }
    fn done(&self, name: &str, detail: &str, size: Option<u64>) {
        (**self).done(name, detail, size);
    }
    fn failed(&self, name: &str, reason: &str) {
        (**self).failed(name, reason);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn success(&self, msg: &str) {
        (**self).success(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn downloading(&self, _: &str, _: u64, _: Option<u64>) {}
    fn uploading(&self, _: &str, _: u64) {}
    fn removing(&self, _: &str) {}
    fn done(&self, _: &str, _: &str, _: Option<u64>) {}
    fn failed(&self, _: &str, _: &str) {}
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
}

/// Fraction of a transfer completed, in `0.0..=1.0`.
///
/// Unknown or zero totals yield `None`.
pub fn progress_fraction(current: u64, total: Option<u64>) -> Option<f64> {
    let total = total.filter(|&t| t > 0)?;
    Some((current as f64 / total as f64).min(1.0))
}
