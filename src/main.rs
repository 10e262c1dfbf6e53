use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Instant;

use dropfunnel::{
    BatchDispatcher, BatchReport, BatchStats, Config, OutcomeSink, Overrides, ReportFormat,
    StatsSink, TargetFormat, files_per_second, format_duration, generate_report, resolve_params,
    sink::ConsoleSink,
};

/// dropfunnel - bounded concurrent batch image converter
///
/// Resizes each given image to a maximum bounding dimension and re-encodes it
/// into the target format beside the original file. A fixed-capacity worker
/// pool keeps throughput bounded and the calling thread free.
#[derive(Parser)]
#[command(name = "dropfunnel")]
#[command(about = "dropfunnel - batch image resizer and re-encoder")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Image files to convert (one batch per invocation)
    #[arg(value_name = "FILE", required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Maximum bounding dimension in pixels [16-8096]
    #[arg(short = 'd', long, value_name = "PIXELS")]
    pub max_dimension: Option<u32>,

    /// Encoding quality [20-100]
    #[arg(short, long, value_name = "QUALITY")]
    pub quality: Option<u8>,

    /// Target output format
    #[arg(short, long, value_enum)]
    pub format: Option<TargetFormatArg>,

    /// Worker pool capacity (defaults to 8)
    #[arg(short, long, value_name = "NUM")]
    pub jobs: Option<usize>,

    /// Configuration file path (defaults to the user config directory)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Generate a batch report
    #[arg(long)]
    pub report: bool,

    /// Report output format
    #[arg(long, default_value = "json", value_enum)]
    pub report_format: ReportFormatArg,

    /// Verbose output mode
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (summary only)
    #[arg(long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum TargetFormatArg {
    /// Lossy WebP (supports transparency)
    Webp,
    /// Baseline JPEG (alpha is dropped)
    Jpeg,
}

impl From<TargetFormatArg> for TargetFormat {
    fn from(format: TargetFormatArg) -> Self {
        match format {
            TargetFormatArg::Webp => TargetFormat::Webp,
            TargetFormatArg::Jpeg => TargetFormat::Jpeg,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ReportFormatArg {
    Json,
    Csv,
}

impl From<ReportFormatArg> for ReportFormat {
    fn from(format: ReportFormatArg) -> Self {
        match format {
            ReportFormatArg::Json => ReportFormat::Json,
            ReportFormatArg::Csv => ReportFormat::Csv,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else if !args.quiet {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    // Config file values first, CLI flags on top
    let config = load_config(&args)?;
    let overrides = Overrides {
        max_dimension: args.max_dimension,
        quality: args.quality,
        target_format: args.format.clone().map(Into::into),
        workers: args.jobs,
    };
    let (params, pool) = resolve_params(config.as_ref(), &overrides)?;

    let stats = BatchStats::new();
    let sink: Box<dyn OutcomeSink> = if args.quiet {
        Box::new(StatsSink::new(stats.clone()))
    } else {
        Box::new(ConsoleSink::new(stats.clone(), args.files.len() as u64))
    };

    let start_time = Instant::now();
    let start_time_utc = chrono::Utc::now();

    let mut dispatcher = BatchDispatcher::new(pool, sink);
    let worker_count = dispatcher.capacity();
    let total_files = dispatcher.submit_batch(&args.files, &params)?;

    // Graceful drain: every submitted file yields exactly one reported
    // outcome before this returns.
    dispatcher.shutdown();

    let duration = start_time.elapsed();
    let report = BatchReport {
        start_time: start_time_utc,
        end_time: chrono::Utc::now(),
        duration,
        total_files: total_files as u64,
        converted_files: stats.converted(),
        unsupported_files: stats.unsupported(),
        failed_files: stats.failed(),
        bytes_written: stats.bytes_written(),
        files_per_second: files_per_second(total_files as u64, duration),
        worker_count,
        max_dimension: params.max_dimension,
        quality: params.quality,
        format: params.target_format.to_string(),
        errors: stats.get_errors(),
    };

    if args.report {
        generate_report(&report, &args.report_format.clone().into())?;
    }

    if !args.quiet {
        print_results_summary(&report);
    }

    // A batch with failures exits non-zero so scripts can tell
    if report.failed_files > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<Option<Config>> {
    if let Some(path) = &args.config {
        return Ok(Some(Config::load(path)?));
    }
    match Config::default_path() {
        Some(path) if path.exists() => Ok(Some(Config::load(&path)?)),
        _ => Ok(None),
    }
}

fn print_results_summary(report: &BatchReport) {
    use humansize::{DECIMAL, format_size};

    println!("\n📊 Batch Summary:");
    println!("  ✅ Converted: {} files", report.converted_files);
    if report.unsupported_files > 0 {
        println!("  ⚠️ Unsupported: {} files", report.unsupported_files);
    }
    if report.failed_files > 0 {
        println!("  ❌ Failed: {} files", report.failed_files);
    }

    if report.bytes_written > 0 {
        println!("  💾 Written: {}", format_size(report.bytes_written, DECIMAL));
    }

    println!("\n⏱️ Performance:");
    println!("  🕐 Duration: {}", format_duration(report.duration));
    println!("  🚀 Speed: {:.1} files/sec", report.files_per_second);
    println!("  🧵 Workers: {}", report.worker_count);

    if !report.errors.is_empty() && report.errors.len() <= 5 {
        println!("\n❌ Errors:");
        for error in &report.errors {
            println!("  • {}", error);
        }
    } else if report.errors.len() > 5 {
        println!(
            "\n❌ {} errors occurred (use --report for full details)",
            report.errors.len()
        );
    }
}
