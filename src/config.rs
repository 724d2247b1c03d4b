//! Configuration types for bookcorpus-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Harvest behavior configuration (paths, filtering, worker pool)
///
/// Used as a flattened sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Directory receiving one `.txt` per validated book (required for `fetch`)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Newline-delimited JSON manifest (required for `fetch`)
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,

    /// Reject converted EPUB text whose word count strays too far from the
    /// count declared in the manifest (default: false)
    #[serde(default)]
    pub filter_word_count: bool,

    /// Number of items processed concurrently (default: available parallelism)
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            manifest_path: None,
            filter_word_count: false,
            workers: default_workers(),
        }
    }
}

/// Retry configuration shared by every network-facing operation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after a failed attempt (default: 1 second)
    #[serde(default = "default_backoff", with = "duration_millis_serde")]
    pub backoff: Duration,

    /// Multiplier applied to the backoff after each failure (default: 1.0, fixed backoff)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound for the backoff (default: 60 seconds)
    #[serde(default = "default_max_backoff", with = "duration_millis_serde")]
    pub max_backoff: Duration,

    /// Pacing delay after a successful attempt (default: 1 millisecond)
    #[serde(default = "default_success_delay", with = "duration_millis_serde")]
    pub success_delay: Duration,

    /// Add random jitter to backoff delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: default_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff: default_max_backoff(),
            success_delay: default_success_delay(),
            jitter: false,
        }
    }
}

/// HTTP client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Longest wait for a connection, the response headers, or the next body
    /// chunk (default: 60 seconds)
    ///
    /// A download that keeps making progress is never cut off.
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Keep cookies across requests within a run (default: true)
    #[serde(default = "default_true")]
    pub cookies: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            cookies: true,
        }
    }
}

/// Downstream corpus stage configuration (sentences, tokenize)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Lines per tokenization chunk (default: 1000)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

/// Main configuration
///
/// Every field has a default, so an empty JSON object is a valid config file.
/// Harvest fields are flattened to the top level.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Harvest paths, filtering and worker pool size
    #[serde(flatten)]
    pub harvest: HarvestConfig,

    /// Retry policy for network operations
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Sentence and tokenization stage settings
    #[serde(default)]
    pub corpus: CorpusConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file '{}': {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.harvest.workers == 0 {
            return Err(Error::Config {
                message: "workers must be at least 1".to_string(),
                key: Some("workers".to_string()),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config {
                message: "max_attempts must be at least 1".to_string(),
                key: Some("retry.max_attempts".to_string()),
            });
        }
        if self.corpus.chunk_size == 0 {
            return Err(Error::Config {
                message: "chunk_size must be at least 1".to_string(),
                key: Some("corpus.chunk_size".to_string()),
            });
        }
        Ok(())
    }

    /// Output directory, which `fetch` requires
    pub fn output_dir(&self) -> Result<&Path> {
        self.harvest
            .output_dir
            .as_deref()
            .ok_or_else(|| Error::Config {
                message: "an output directory is required".to_string(),
                key: Some("output_dir".to_string()),
            })
    }

    /// Manifest path, which `fetch` requires
    pub fn manifest_path(&self) -> Result<&Path> {
        self.harvest
            .manifest_path
            .as_deref()
            .ok_or_else(|| Error::Config {
                message: "a manifest path is required".to_string(),
                key: Some("manifest_path".to_string()),
            })
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(60)
}

fn default_success_delay() -> Duration {
    Duration::from_millis(1)
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_user_agent() -> String {
    concat!("bookcorpus-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    1000
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Retry delays go down to a millisecond, so they are stored as integer milliseconds
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
