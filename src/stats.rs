use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::transform::{ConversionOutcome, OutcomeStatus};

/// Shared counters for one batch run. Clones share the same underlying
/// counters, so a sink and the coordinator can both hold a handle.
#[derive(Debug, Clone)]
pub struct BatchStats {
    pub converted_count: Arc<AtomicU64>,
    pub unsupported_count: Arc<AtomicU64>,
    pub failed_count: Arc<AtomicU64>,
    pub bytes_written: Arc<AtomicU64>,
    errors: Arc<Mutex<Vec<ErrorRecord>>>,
}

#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub source_path: String,
    pub message: String,
    pub timestamp: std::time::SystemTime,
}

impl BatchStats {
    pub fn new() -> Self {
        Self {
            converted_count: Arc::new(AtomicU64::new(0)),
            unsupported_count: Arc::new(AtomicU64::new(0)),
            failed_count: Arc::new(AtomicU64::new(0)),
            bytes_written: Arc::new(AtomicU64::new(0)),
            errors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Record one delivered outcome into the matching counter
    pub fn record_outcome(&self, outcome: &ConversionOutcome) {
        match &outcome.status {
            OutcomeStatus::Converted { output_bytes, .. } => self.record_converted(*output_bytes),
            OutcomeStatus::Unsupported => self.record_unsupported(),
            OutcomeStatus::Failed { message } => {
                self.record_failed(outcome.source_path.display().to_string(), message.clone())
            }
        }
    }

    pub fn record_converted(&self, output_bytes: u64) {
        self.converted_count.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(output_bytes, Ordering::Relaxed);
    }

    pub fn record_unsupported(&self) {
        self.unsupported_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self, source_path: String, message: String) {
        self.failed_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(ErrorRecord {
                source_path,
                message,
                timestamp: std::time::SystemTime::now(),
            });
        }
    }

    pub fn converted(&self) -> u64 {
        self.converted_count.load(Ordering::Relaxed)
    }

    pub fn unsupported(&self) -> u64 {
        self.unsupported_count.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed_count.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.converted() + self.unsupported() + self.failed()
    }

    pub fn get_errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .map(|errors| {
                errors
                    .iter()
                    .map(|e| format!("{}: {}", e.source_path, e.message))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_error_records(&self) -> Vec<ErrorRecord> {
        self.errors
            .lock()
            .map(|errors| errors.clone())
            .unwrap_or_default()
    }
}

impl Default for BatchStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn outcomes_land_in_matching_counters() {
        let stats = BatchStats::new();

        stats.record_outcome(&ConversionOutcome {
            source_path: PathBuf::from("a.png"),
            status: OutcomeStatus::Converted {
                output_path: PathBuf::from("a_OPTIMIZED.webp"),
                output_bytes: 1000,
            },
        });
        stats.record_outcome(&ConversionOutcome {
            source_path: PathBuf::from("b.txt"),
            status: OutcomeStatus::Unsupported,
        });
        stats.record_outcome(&ConversionOutcome {
            source_path: PathBuf::from("c.png"),
            status: OutcomeStatus::Failed {
                message: "decode failed: truncated".to_string(),
            },
        });

        assert_eq!(stats.converted(), 1);
        assert_eq!(stats.unsupported(), 1);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.bytes_written(), 1000);

        let errors = stats.get_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("c.png"));
    }

    #[test]
    fn error_records_carry_path_message_and_time() {
        let before = std::time::SystemTime::now();
        let stats = BatchStats::new();
        stats.record_failed(
            "bad.png".to_string(),
            "encode failed: out of range".to_string(),
        );

        let records = stats.get_error_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source_path, "bad.png");
        assert_eq!(records[0].message, "encode failed: out of range");
        assert!(records[0].timestamp >= before);
    }

    #[test]
    fn clones_share_counters() {
        let stats = BatchStats::new();
        let handle = stats.clone();
        handle.record_converted(512);
        assert_eq!(stats.converted(), 1);
        assert_eq!(stats.bytes_written(), 512);
    }
}
