use crate::stats::BatchStats;
use crate::transform::{ConversionOutcome, OutcomeStatus};

/// The single logical consumer of conversion outcomes.
///
/// The dispatcher invokes this from one dedicated consumer thread, never
/// concurrently with itself, so implementations may keep ordinary interior
/// state behind the usual `Send + Sync` bounds. This allows different
/// surfaces (CLI, GUI, tests) to present results their own way.
pub trait OutcomeSink: Send + Sync {
    /// Receive one completed conversion's result. Called exactly once per
    /// submitted request, in completion order.
    fn deliver(&self, outcome: ConversionOutcome);
}

/// A no-op sink for when results are not observed
pub struct NoOpSink;

impl OutcomeSink for NoOpSink {
    fn deliver(&self, _outcome: ConversionOutcome) {}
}

/// Records outcomes into shared [`BatchStats`] without any output.
/// Used in quiet mode and anywhere only the totals matter.
pub struct StatsSink {
    stats: BatchStats,
}

impl StatsSink {
    pub fn new(stats: BatchStats) -> Self {
        Self { stats }
    }
}

impl OutcomeSink for StatsSink {
    fn deliver(&self, outcome: ConversionOutcome) {
        self.stats.record_outcome(&outcome);
    }
}

/// Console sink: records stats and renders each outcome distinctly under an
/// indicatif progress bar (success, unsupported and failure all look
/// different, so a mixed batch never reads as a clean pass).
#[cfg(feature = "cli")]
pub struct ConsoleSink {
    stats: BatchStats,
    progress_bar: indicatif::ProgressBar,
}

#[cfg(feature = "cli")]
impl ConsoleSink {
    pub fn new(stats: BatchStats, total_files: u64) -> Self {
        let progress_bar = indicatif::ProgressBar::new(total_files);
        progress_bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )
                .unwrap()
                .progress_chars("#>-"),
        );

        Self {
            stats,
            progress_bar,
        }
    }
}

#[cfg(feature = "cli")]
impl OutcomeSink for ConsoleSink {
    fn deliver(&self, outcome: ConversionOutcome) {
        self.stats.record_outcome(&outcome);

        match &outcome.status {
            OutcomeStatus::Converted {
                output_path,
                output_bytes,
            } => {
                self.progress_bar.println(format!(
                    "✅ {} -> {} ({})",
                    outcome.source_path.display(),
                    output_path.display(),
                    humansize::format_size(*output_bytes, humansize::DECIMAL)
                ));
            }
            OutcomeStatus::Unsupported => {
                self.progress_bar.println(format!(
                    "⚠️ {}: unsupported file type, skipped",
                    outcome.source_path.display()
                ));
            }
            OutcomeStatus::Failed { message } => {
                self.progress_bar.println(format!(
                    "❌ {}: {}",
                    outcome.source_path.display(),
                    message
                ));
            }
        }

        self.progress_bar.inc(1);
    }
}

#[cfg(feature = "cli")]
impl Drop for ConsoleSink {
    fn drop(&mut self) {
        self.progress_bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn stats_sink_records_every_outcome() {
        let stats = BatchStats::new();
        let sink = StatsSink::new(stats.clone());

        sink.deliver(ConversionOutcome {
            source_path: PathBuf::from("a.png"),
            status: OutcomeStatus::Converted {
                output_path: PathBuf::from("a_OPTIMIZED.webp"),
                output_bytes: 2048,
            },
        });
        sink.deliver(ConversionOutcome {
            source_path: PathBuf::from("b.doc"),
            status: OutcomeStatus::Unsupported,
        });

        assert_eq!(stats.converted(), 1);
        assert_eq!(stats.unsupported(), 1);
        assert_eq!(stats.bytes_written(), 2048);
    }
}
