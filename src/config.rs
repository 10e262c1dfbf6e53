use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::TargetFormat;

/// Default maximum bounding dimension in pixels
pub const DEFAULT_MAX_DIMENSION: u32 = 2048;
/// Application-enforced bounds for the bounding dimension
pub const MIN_MAX_DIMENSION: u32 = 16;
pub const MAX_MAX_DIMENSION: u32 = 8096;

/// Default encoding quality
pub const DEFAULT_QUALITY: u8 = 80;
/// Application-enforced quality bounds
pub const MIN_QUALITY: u8 = 20;
pub const MAX_QUALITY: u8 = 100;

/// Default worker pool capacity
pub const DEFAULT_WORKERS: usize = 8;

/// Conversion parameters shared by every request in one batch.
///
/// A copy of these values is taken at `submit_batch` time, so later changes
/// never affect requests already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchParams {
    pub max_dimension: u32,
    pub target_format: TargetFormat,
    pub quality: u8,
}

impl Default for BatchParams {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            target_format: TargetFormat::Webp,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl BatchParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern for setting the bounding dimension
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// Builder pattern for setting the target format
    pub fn with_target_format(mut self, target_format: TargetFormat) -> Self {
        self.target_format = target_format;
        self
    }

    /// Builder pattern for setting the encoding quality
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Clamp all values into their application-enforced bounds
    pub fn clamped(mut self) -> Self {
        self.max_dimension = self.max_dimension.clamp(MIN_MAX_DIMENSION, MAX_MAX_DIMENSION);
        self.quality = self.quality.clamp(MIN_QUALITY, MAX_QUALITY);
        self
    }
}

/// Worker pool sizing, fixed at dispatcher construction
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolOptions {
    pub workers: Option<usize>,
}

impl PoolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern for setting an explicit worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Size the pool to the number of logical CPU cores
    pub fn auto() -> Self {
        Self {
            workers: Some(num_cpus::get()),
        }
    }

    /// Effective worker count (defaults when unset or zero)
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(n) if n > 0 => n,
            _ => DEFAULT_WORKERS,
        }
    }
}

/// Main configuration structure loaded from config files
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub conversion: Option<ConversionConfig>,
    pub pool: Option<PoolConfig>,
}

/// Conversion-related configuration
#[derive(Debug, Deserialize)]
pub struct ConversionConfig {
    pub max_dimension: Option<u32>,
    pub quality: Option<u8>,
    pub format: Option<String>,
}

/// Worker pool configuration
#[derive(Debug, Deserialize)]
pub struct PoolConfig {
    pub workers: Option<usize>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Default per-user config file location, if a config directory exists
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dropfunnel").join("config.toml"))
    }

    /// Apply file values onto the given parameters. CLI flags are applied
    /// after this, so they take precedence over the file.
    pub fn apply(&self, params: &mut BatchParams, pool: &mut PoolOptions) -> Result<()> {
        if let Some(conversion) = &self.conversion {
            if let Some(max_dimension) = conversion.max_dimension {
                params.max_dimension = max_dimension;
            }
            if let Some(quality) = conversion.quality {
                params.quality = quality;
            }
            if let Some(format) = &conversion.format {
                params.target_format = match TargetFormat::from_name(format) {
                    Some(target_format) => target_format,
                    None => bail!("Unknown target format in config: {format}"),
                };
            }
        }

        if let Some(pool_config) = &self.pool {
            if let Some(workers) = pool_config.workers {
                pool.workers = Some(workers);
            }
        }

        Ok(())
    }
}

/// Per-invocation overrides (CLI flags). Applied after config-file values,
/// so a set flag always wins over the file.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub max_dimension: Option<u32>,
    pub quality: Option<u8>,
    pub target_format: Option<TargetFormat>,
    pub workers: Option<usize>,
}

/// Resolve effective parameters: defaults, then config-file values, then
/// overrides, then clamping into the application-enforced bounds.
pub fn resolve_params(
    config: Option<&Config>,
    overrides: &Overrides,
) -> Result<(BatchParams, PoolOptions)> {
    let mut params = BatchParams::default();
    let mut pool = PoolOptions::default();

    if let Some(config) = config {
        config.apply(&mut params, &mut pool)?;
    }

    if let Some(max_dimension) = overrides.max_dimension {
        params.max_dimension = max_dimension;
    }
    if let Some(quality) = overrides.quality {
        params.quality = quality;
    }
    if let Some(target_format) = overrides.target_format {
        params.target_format = target_format;
    }
    if let Some(workers) = overrides.workers {
        pool.workers = Some(workers);
    }

    Ok((params.clamped(), pool))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params() {
        let params = BatchParams::default();
        assert_eq!(params.max_dimension, 2048);
        assert_eq!(params.quality, 80);
        assert_eq!(params.target_format, TargetFormat::Webp);
    }

    #[test]
    fn clamping_enforces_bounds() {
        let params = BatchParams::new()
            .with_max_dimension(4)
            .with_quality(5)
            .clamped();
        assert_eq!(params.max_dimension, MIN_MAX_DIMENSION);
        assert_eq!(params.quality, MIN_QUALITY);

        let params = BatchParams::new()
            .with_max_dimension(100_000)
            .with_quality(200)
            .clamped();
        assert_eq!(params.max_dimension, MAX_MAX_DIMENSION);
        assert_eq!(params.quality, MAX_QUALITY);
    }

    #[test]
    fn clamping_keeps_in_range_values() {
        let params = BatchParams::new()
            .with_max_dimension(1024)
            .with_quality(90)
            .clamped();
        assert_eq!(params.max_dimension, 1024);
        assert_eq!(params.quality, 90);
    }

    #[test]
    fn pool_options_defaults() {
        assert_eq!(PoolOptions::default().worker_count(), DEFAULT_WORKERS);
        assert_eq!(PoolOptions::new().with_workers(0).worker_count(), DEFAULT_WORKERS);
        assert_eq!(PoolOptions::new().with_workers(3).worker_count(), 3);
    }

    #[test]
    fn config_file_applies_onto_defaults() {
        let config: Config = toml::from_str(
            r#"
            [conversion]
            max_dimension = 1024
            quality = 90
            format = "jpeg"

            [pool]
            workers = 4
            "#,
        )
        .unwrap();

        let mut params = BatchParams::default();
        let mut pool = PoolOptions::default();
        config.apply(&mut params, &mut pool).unwrap();

        assert_eq!(params.max_dimension, 1024);
        assert_eq!(params.quality, 90);
        assert_eq!(params.target_format, TargetFormat::Jpeg);
        assert_eq!(pool.worker_count(), 4);
    }

    #[test]
    fn config_rejects_unknown_format() {
        let config: Config = toml::from_str(
            r#"
            [conversion]
            format = "avif"
            "#,
        )
        .unwrap();

        let mut params = BatchParams::default();
        let mut pool = PoolOptions::default();
        assert!(config.apply(&mut params, &mut pool).is_err());
    }

    #[test]
    fn cli_flags_override_config_file_values() {
        let config: Config = toml::from_str(
            r#"
            [conversion]
            max_dimension = 1024
            quality = 90
            format = "jpeg"

            [pool]
            workers = 4
            "#,
        )
        .unwrap();

        let overrides = Overrides {
            quality: Some(95),
            workers: Some(2),
            ..Overrides::default()
        };
        let (params, pool) = resolve_params(Some(&config), &overrides).unwrap();

        // Flagged values win over the file.
        assert_eq!(params.quality, 95);
        assert_eq!(pool.worker_count(), 2);
        // Unflagged values keep what the file set.
        assert_eq!(params.max_dimension, 1024);
        assert_eq!(params.target_format, TargetFormat::Jpeg);
    }

    #[test]
    fn resolve_without_config_uses_defaults_and_clamps_overrides() {
        let overrides = Overrides {
            max_dimension: Some(100_000),
            ..Overrides::default()
        };
        let (params, pool) = resolve_params(None, &overrides).unwrap();

        assert_eq!(params.max_dimension, MAX_MAX_DIMENSION);
        assert_eq!(params.quality, DEFAULT_QUALITY);
        assert_eq!(pool.worker_count(), DEFAULT_WORKERS);
    }

    #[test]
    fn partial_config_leaves_other_values_alone() {
        let config: Config = toml::from_str(
            r#"
            [conversion]
            quality = 65
            "#,
        )
        .unwrap();

        let mut params = BatchParams::default();
        let mut pool = PoolOptions::default();
        config.apply(&mut params, &mut pool).unwrap();

        assert_eq!(params.quality, 65);
        assert_eq!(params.max_dimension, DEFAULT_MAX_DIMENSION);
        assert_eq!(pool.worker_count(), DEFAULT_WORKERS);
    }
}
