use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::TargetFormat;

/// Source extensions the pipeline will attempt to decode
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// Suffix appended to the source file stem for output files
pub const OUTPUT_SUFFIX: &str = "_OPTIMIZED";

/// Get file extension (lowercase)
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check whether a source path carries a supported image extension.
///
/// This is a pure path inspection; the file's content is never touched, so
/// unsupported inputs are rejected without any I/O.
pub fn is_supported_source(path: &Path) -> bool {
    match file_extension(path) {
        Some(ext) => SUPPORTED_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}

/// Derive the output path for a converted file: `<stem>_OPTIMIZED.<ext>`
/// beside the source. The source file itself is never overwritten in place
/// because the suffix always produces a different file name.
pub fn optimized_output_path(source: &Path, format: TargetFormat) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("converted");
    let file_name = format!("{stem}{OUTPUT_SUFFIX}.{}", format.extension());
    match source.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Batch throughput in files per second. A zero-length run reports 0.0 so
/// the value stays finite (and JSON-serializable).
pub fn files_per_second(total_files: u64, duration: Duration) -> f64 {
    let seconds = duration.as_secs_f64();
    if seconds > 0.0 {
        total_files as f64 / seconds
    } else {
        0.0
    }
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else if total_seconds > 0 {
        format!("{}s", seconds)
    } else {
        format!("{}ms", duration.as_millis())
    }
}
