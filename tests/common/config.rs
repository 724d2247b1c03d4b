//! Configuration helpers for integration tests

use bookcorpus_dl::{
    Config, EpubTextConverter, HarvestConfig, Harvester, HttpConfig, HttpRetrieval, RetryConfig,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Retry policy with the production attempt budget but millisecond delays
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        backoff: Duration::from_millis(5),
        success_delay: Duration::ZERO,
        ..RetryConfig::default()
    }
}

/// Config for a harvest of `manifest` into `out_dir`
pub fn test_config(out_dir: &Path, manifest: &Path, filter_word_count: bool) -> Config {
    Config {
        harvest: HarvestConfig {
            output_dir: Some(out_dir.to_path_buf()),
            manifest_path: Some(manifest.to_path_buf()),
            filter_word_count,
            workers: 4,
        },
        retry: fast_retry(3),
        http: HttpConfig {
            timeout: Duration::from_secs(5),
            ..HttpConfig::default()
        },
        ..Config::default()
    }
}

/// Harvester over real HTTP and the real EPUB converter
pub fn http_harvester(config: Config) -> Harvester {
    let retrieval = HttpRetrieval::new(&config.http, config.retry.clone()).expect("http client");
    Harvester::new(Arc::new(config), Arc::new(retrieval), Arc::new(EpubTextConverter))
}
