//! # Dropfunnel Library
//!
//! Bounded concurrent batch image-conversion pipeline core library.
//!
//! This library accepts batches of image file paths, resizes each image to a
//! maximum bounding dimension, re-encodes it into a target format (WebP or
//! JPEG) at a configurable quality, and funnels per-file outcomes back to a
//! single registered sink through a fixed-capacity worker pool.

pub mod config;
pub mod dispatcher;
pub mod sink;
pub mod stats;
pub mod transform;
pub mod utils;

// Re-export commonly used types
pub use config::{BatchParams, Config, Overrides, PoolOptions, resolve_params};
pub use dispatcher::{BatchDispatcher, DispatchError, PoolState};
pub use sink::{NoOpSink, OutcomeSink, StatsSink};
pub use stats::BatchStats;
pub use transform::{
    ConversionOutcome, ConversionRequest, ImageTransform, OutcomeStatus, Transform,
};
pub use utils::{files_per_second, format_duration, is_supported_source, optimized_output_path};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Encoding target for converted images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    /// Lossy WebP output (supports transparency)
    Webp,
    /// Baseline JPEG output (no transparency)
    Jpeg,
}

impl TargetFormat {
    /// File extension used for output files of this format
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Webp => "webp",
            TargetFormat::Jpeg => "jpg",
        }
    }

    /// Whether the encoded format can carry an alpha channel.
    ///
    /// Targets without alpha support get a flattened 3-channel image before
    /// encoding (alpha dropped, not composited).
    pub fn supports_alpha(&self) -> bool {
        match self {
            TargetFormat::Webp => true,
            TargetFormat::Jpeg => false,
        }
    }

    /// Parse a format name as it appears in config files or CLI input
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "webp" => Some(TargetFormat::Webp),
            "jpeg" | "jpg" => Some(TargetFormat::Jpeg),
            _ => None,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetFormat::Webp => write!(f, "webp"),
            TargetFormat::Jpeg => write!(f, "jpeg"),
        }
    }
}

/// Summary of one batch run, assembled after the pool has drained
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BatchReport {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    pub total_files: u64,
    pub converted_files: u64,
    pub unsupported_files: u64,
    pub failed_files: u64,
    pub bytes_written: u64,
    pub files_per_second: f64,
    pub worker_count: usize,
    pub max_dimension: u32,
    pub quality: u8,
    pub format: String,
    pub errors: Vec<String>,
}

/// Report output formats
#[derive(Debug, Clone, PartialEq)]
pub enum ReportFormat {
    Json,
    Csv,
}

/// Generate a batch report in the specified format, written to the current
/// directory. Returns the path of the written report.
pub fn generate_report(report: &BatchReport, format: &ReportFormat) -> Result<PathBuf> {
    let path = match format {
        ReportFormat::Json => {
            let path = PathBuf::from("dropfunnel_report.json");
            write_json_report(report, &path)?;
            path
        }
        ReportFormat::Csv => {
            let path = PathBuf::from("dropfunnel_report.csv");
            write_csv_report(report, &path)?;
            path
        }
    };
    println!("Report saved to: {}", path.display());
    Ok(path)
}

fn write_json_report(report: &BatchReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn write_csv_report(report: &BatchReport, path: &Path) -> Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(path)?;

    writeln!(file, "metric,value")?;
    writeln!(file, "start_time,{}", report.start_time.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(file, "end_time,{}", report.end_time.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(file, "duration_seconds,{:.2}", report.duration.as_secs_f64())?;
    writeln!(file, "total_files,{}", report.total_files)?;
    writeln!(file, "converted_files,{}", report.converted_files)?;
    writeln!(file, "unsupported_files,{}", report.unsupported_files)?;
    writeln!(file, "failed_files,{}", report.failed_files)?;
    writeln!(file, "bytes_written,{}", report.bytes_written)?;
    writeln!(file, "files_per_second,{:.2}", report.files_per_second)?;
    writeln!(file, "worker_count,{}", report.worker_count)?;
    writeln!(file, "max_dimension,{}", report.max_dimension)?;
    writeln!(file, "quality,{}", report.quality)?;
    writeln!(file, "format,{}", report.format)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_format_extensions() {
        assert_eq!(TargetFormat::Webp.extension(), "webp");
        assert_eq!(TargetFormat::Jpeg.extension(), "jpg");
    }

    #[test]
    fn target_format_alpha_support() {
        assert!(TargetFormat::Webp.supports_alpha());
        assert!(!TargetFormat::Jpeg.supports_alpha());
    }

    #[test]
    fn target_format_parsing() {
        assert_eq!(TargetFormat::from_name("webp"), Some(TargetFormat::Webp));
        assert_eq!(TargetFormat::from_name("JPEG"), Some(TargetFormat::Jpeg));
        assert_eq!(TargetFormat::from_name("jpg"), Some(TargetFormat::Jpeg));
        assert_eq!(TargetFormat::from_name("tiff"), None);
    }

    #[test]
    fn json_report_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let report = BatchReport {
            start_time: Utc::now(),
            end_time: Utc::now(),
            duration: Duration::from_millis(1500),
            total_files: 4,
            converted_files: 2,
            unsupported_files: 1,
            failed_files: 1,
            bytes_written: 8192,
            files_per_second: 2.7,
            worker_count: 8,
            max_dimension: 2048,
            quality: 80,
            format: "webp".to_string(),
            errors: vec!["bad.png: decode failed".to_string()],
        };

        let path = dir.path().join("report.json");
        write_json_report(&report, &path).unwrap();

        let parsed: BatchReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.total_files, 4);
        assert_eq!(parsed.converted_files, 2);
        assert_eq!(parsed.errors.len(), 1);
    }
}
