//! Shared state containers: the augmentation configuration and the status
//! flags.
//!
//! Both are owned by whoever builds the orchestrator and passed in as
//! handles. Each store has a single update entry point, so readers never see
//! a half-applied change.

use std::sync::Arc;

use morph_split_model::{AugConfig, ConfigError, ConfigUpdate, Split, StatusFlag, StatusFlags};
use parking_lot::RwLock;
use tracing::debug;

/// Holds the current [`AugConfig`].
///
/// Reads return a snapshot. Every update builds a new snapshot, so a
/// snapshot taken earlier never changes under its holder.
#[derive(Debug, Default)]
pub struct ConfigStore {
    current: RwLock<Arc<AugConfig>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AugConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn get(&self) -> Arc<AugConfig> {
        Arc::clone(&self.current.read())
    }

    /// Replace one field. Concurrent updates to different fields never
    /// conflict; the last write to a given field wins.
    pub fn dispatch(&self, update: ConfigUpdate) {
        debug!(field = update.key(), "Config update");
        let mut current = self.current.write();
        let mut next: AugConfig = (**current).clone();
        next.apply(update);
        *current = Arc::new(next);
    }

    /// Move one split ratio and redistribute the unlocked others.
    ///
    /// # Errors
    /// `ConfigError::RatioLocked` or `RatioOutOfRange`; the config is unchanged.
    pub fn adjust_ratio(&self, split: Split, value: f64) -> Result<(), ConfigError> {
        let mut current = self.current.write();
        let mut next: AugConfig = (**current).clone();
        next.adjust_ratio(split, value)?;
        debug!(
            split = %split,
            train = next.train_ratio,
            val = next.val_ratio,
            test = next.test_ratio,
            "Ratios adjusted"
        );
        *current = Arc::new(next);
        Ok(())
    }

    /// Replace the whole configuration.
    pub fn replace(&self, config: AugConfig) {
        *self.current.write() = Arc::new(config);
    }

    /// Restore defaults.
    pub fn reset(&self) {
        self.replace(AugConfig::default());
    }
}

/// Holds the in-flight [`StatusFlags`].
#[derive(Debug, Default)]
pub struct StatusFlagsStore {
    flags: RwLock<StatusFlags>,
}

impl StatusFlagsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> StatusFlags {
        *self.flags.read()
    }

    pub fn is_set(&self, flag: StatusFlag) -> bool {
        self.flags.read().get(flag)
    }

    pub fn set(&self, flag: StatusFlag, value: bool) {
        self.flags.write().set(flag, value);
    }

    pub fn reset(&self) {
        *self.flags.write() = StatusFlags::default();
    }

    /// Raise `flag` until the returned guard is dropped.
    pub fn raise(&self, flag: StatusFlag) -> FlagGuard<'_> {
        self.set(flag, true);
        FlagGuard { store: self, flag }
    }
}

/// Clears its status flag when dropped, on success and failure paths alike.
#[must_use = "the flag is cleared as soon as the guard is dropped"]
#[derive(Debug)]
pub struct FlagGuard<'a> {
    store: &'a StatusFlagsStore,
    flag: StatusFlag,
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.store.set(self.flag, false);
    }
}
