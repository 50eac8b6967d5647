//! Session config handle with atomic reload support.
//!
//! Uses `arc-swap` for lock-free reads and atomic config replacement, so a
//! dev session can pick up `galley.toml` edits while cooks are in flight.
//! Each session owns its handle; nothing here is global.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use arc_swap::ArcSwap;

use crate::config::GalleyConfig;
use crate::utils::hash;

/// Shared, swappable configuration of one session.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    current: Arc<ArcSwap<GalleyConfig>>,
    /// Fingerprint of the config file content the current value came from.
    file_hash: Arc<AtomicU64>,
}

impl ConfigHandle {
    pub fn new(config: GalleyConfig) -> Self {
        let file_hash = std::fs::read_to_string(&config.config_path)
            .map(|content| hash::fingerprint(&content))
            .unwrap_or(0);
        Self {
            current: Arc::new(ArcSwap::from_pointee(config)),
            file_hash: Arc::new(AtomicU64::new(file_hash)),
        }
    }

    /// Current configuration.
    #[inline]
    pub fn get(&self) -> Arc<GalleyConfig> {
        self.current.load_full()
    }

    /// Replace the configuration.
    pub fn store(&self, config: GalleyConfig) {
        self.current.store(Arc::new(config));
    }

    /// Reload from disk if the file content changed.
    ///
    /// Returns `Ok(true)` if config was updated, `Ok(false)` if unchanged.
    pub fn reload(&self) -> Result<bool> {
        let path = self.get().config_path.clone();
        let content = std::fs::read_to_string(&path)?;
        let new_hash = hash::fingerprint(&content);
        if new_hash == self.file_hash.load(Ordering::Relaxed) {
            return Ok(false);
        }

        let config = GalleyConfig::load(&path)?;
        self.store(config);
        self.file_hash.store(new_hash, Ordering::Relaxed);
        Ok(true)
    }
}
