//! Configuration loaded from `sqlmorph.toml`.
//!
//! ```toml
//! [conversion]
//! strict_mode = true
//! schema_owner = "HR"
//!
//! [batch]
//! chunk_size = 100
//! max_workers = 4
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConvertError, ConvertResult};
use crate::result::ConversionOptions;

pub const CONFIG_FILE: &str = "sqlmorph.toml";

/// Tuning for the streaming processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Statements per chunk.
    pub chunk_size: usize,
    /// Worker count; `None` uses the available parallelism.
    pub max_workers: Option<usize>,
    /// Upper bound on waiting for any one chunk.
    pub chunk_timeout_secs: u64,
    /// Sub-second bound; takes precedence over `chunk_timeout_secs`.
    pub chunk_timeout_ms: Option<u64>,
    /// Inputs at least this large run in parallel.
    pub parallel_threshold_bytes: usize,
    /// Inputs with at least this many statements run in parallel.
    pub parallel_threshold_statements: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 50,
            max_workers: None,
            chunk_timeout_secs: 300,
            chunk_timeout_ms: None,
            parallel_threshold_bytes: 256 * 1024,
            parallel_threshold_statements: 100,
        }
    }
}

impl BatchConfig {
    /// Worker pool size, clamped to `[2, 8]`.
    pub fn workers(&self) -> usize {
        self.max_workers
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(2, |n| n.get()))
            .clamp(2, 8)
    }

    pub fn chunk_timeout(&self) -> Duration {
        match self.chunk_timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_secs(self.chunk_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub conversion: ConversionOptions,
    pub batch: BatchConfig,
}

impl Config {
    pub fn from_toml(content: &str) -> ConvertResult<Self> {
        toml::from_str(content).map_err(|e| ConvertError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> ConvertResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            ConvertError::Config(msg) => ConvertError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Load from `explicit`, else `./sqlmorph.toml`, else the user config
    /// directory, else defaults. An explicit path must exist.
    pub fn load(explicit: Option<&Path>) -> ConvertResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => {
                debug!(path = %path.display(), "loading config");
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("sqlmorph").join("config.toml"));
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.conversion.format_output);
        assert_eq!(config.batch.chunk_size, 50);
        assert_eq!(config.batch.chunk_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml(
            r#"
            [conversion]
            strict_mode = true
            schema_owner = "HR"

            [batch]
            max_workers = 32
            "#,
        )
        .unwrap();
        assert!(config.conversion.strict_mode);
        assert!(config.conversion.include_warnings);
        assert_eq!(config.conversion.schema_owner.as_deref(), Some("HR"));
        assert_eq!(config.batch.workers(), 8);
        assert_eq!(config.batch.chunk_size, 50);
    }

    #[test]
    fn test_millisecond_timeout_wins() {
        let config = Config::from_toml(
            r#"
            [batch]
            chunk_timeout_secs = 10
            chunk_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.batch.chunk_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_workers_lower_bound() {
        let batch = BatchConfig {
            max_workers: Some(1),
            ..Default::default()
        };
        assert_eq!(batch.workers(), 2);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("[batch]\nchunk_size = \"many\"").unwrap_err();
        assert!(matches!(err, ConvertError::Config(_)));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/sqlmorph.toml"))).unwrap_err();
        assert!(matches!(err, ConvertError::Io(_)));
    }
}
