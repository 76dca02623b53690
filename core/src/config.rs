/// Configuration for the chat core
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tunables for a [`crate::client::ChatClient`] instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for the on-device cache database. `None` disables the cache
    /// mirror entirely; feeds then run live-only.
    pub cache_dir: Option<PathBuf>,

    /// Capacity of each live-subscription broadcast channel; consumed by
    /// [`crate::store::ChatStore::from_config`]. A feed that lags past this
    /// many snapshots re-fetches the full list instead of failing.
    pub subscription_capacity: usize,

    /// Capacity of the per-feed delivery channel to the consumer.
    pub feed_capacity: usize,

    /// Automatic retries for one-shot writes that fail with a transient store
    /// error, before the failure surfaces to the user.
    pub write_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: None,
            subscription_capacity: 64,
            feed_capacity: 32,
            write_retries: 1,
        }
    }
}

impl Config {
    /// Config with the cache mirror enabled under `dir`.
    pub fn with_cache_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: Some(dir.into()),
            ..Self::default()
        }
    }
}
