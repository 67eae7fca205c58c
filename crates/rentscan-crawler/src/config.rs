use std::cmp;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    #[serde(default = "default_throttle")]
    pub throttle: Option<Throttle>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            num_workers: default_num_workers(),
            throttle: default_throttle(),
            request_timeout_secs: default_request_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_user_agent() -> String {
    String::from("Mozilla/5.0")
}

fn default_num_workers() -> usize {
    // Walks are network bound, so the pool is wider than the CPU count
    cmp::max(1, num_cpus::get().saturating_sub(2)) * 4
}

fn default_throttle() -> Option<Throttle> {
    Some(Throttle::Delay(0.5, 2.0))
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    100
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Throttle {
    /// The maximum number of concurrent page downloads
    Concurrent(NonZeroUsize),
    /// The number of page downloads started per second
    PerSecond(NonZeroUsize),
    /// A random delay in seconds, drawn between min and max, before every page
    /// but the first one of a walk
    Delay(f32, f32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_uses_defaults() {
        let conf: CrawlerConfig =
            serde_json::from_str(r#"{"userAgent": "rentscan-test", "numWorkers": 3}"#).unwrap();
        assert_eq!(conf.user_agent, "rentscan-test");
        assert_eq!(conf.num_workers, 3);
        assert_eq!(conf.throttle, Some(Throttle::Delay(0.5, 2.0)));
        assert_eq!(conf.request_timeout_secs, 30);
        assert_eq!(conf.batch_size, 100);
    }

    #[test]
    fn throttle_variants_deserialize() {
        let conf: CrawlerConfig = serde_json::from_str(r#"{"throttle": {"PerSecond": 4}}"#).unwrap();
        assert_eq!(
            conf.throttle,
            Some(Throttle::PerSecond(NonZeroUsize::new(4).unwrap()))
        );

        let conf: CrawlerConfig = serde_json::from_str(r#"{"throttle": null}"#).unwrap();
        assert_eq!(conf.throttle, None);
    }
}
