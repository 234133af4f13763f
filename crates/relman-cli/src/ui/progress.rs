//! Progress bar and size formatting.

use relman_core::reporter::progress_fraction;

/// Format bytes for human-readable display
pub fn format_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else if kb >= 1024.0 {
        format!("{mb:.1} MB")
    } else if kb >= 1.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{bytes} B")
    }
}

/// Render a fixed-width bar, e.g. `[#####-----]  50%`.
///
/// Unknown totals render the byte count instead of a percentage.
pub fn format_bar(current: u64, total: Option<u64>, width: usize) -> String {
    match progress_fraction(current, total) {
        Some(fraction) => {
            let filled = ((fraction * width as f64).round() as usize).min(width);
            format!(
                "[{}{}] {:>3}%",
                "#".repeat(filled),
                "-".repeat(width - filled),
                (fraction * 100.0).round() as u32
            )
        }
        None => format!("[{}] {}", "?".repeat(width), format_size(current)),
    }
}

/// Pad or truncate a name to exactly `width` characters.
pub fn fit_name(name: &str, width: usize) -> String {
    let count = name.chars().count();
    if count <= width {
        format!("{name:<width$}")
    } else {
        let kept: String = name.chars().take(width.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
