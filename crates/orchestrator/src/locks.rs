//! Keyed in-flight locks.
//!
//! A second invocation of an operation that is already running is rejected
//! right away instead of queueing behind the first one.

use std::fmt;

use dashmap::DashMap;
use tracing::debug;

use crate::error::OrchestrationError;

/// Operations that must not run twice at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKey {
    ImageUpload,
    MaskUpload,
    StratificationUpload,
    Augmentation,
    DeleteImages,
    DeleteMasks,
    DeleteStratificationFile,
    /// Start, end and reset of the session.
    Session,
    Download,
}

impl OperationKey {
    pub fn description(&self) -> &'static str {
        match self {
            OperationKey::ImageUpload => "Image upload",
            OperationKey::MaskUpload => "Mask upload",
            OperationKey::StratificationUpload => "Stratification file upload",
            OperationKey::Augmentation => "Augmentation",
            OperationKey::DeleteImages => "Image deletion",
            OperationKey::DeleteMasks => "Mask deletion",
            OperationKey::DeleteStratificationFile => "Stratification file deletion",
            OperationKey::Session => "A session operation",
            OperationKey::Download => "Download",
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Set of operations currently in flight.
#[derive(Debug, Default)]
pub struct OperationLocks {
    held: DashMap<OperationKey, ()>,
}

impl OperationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `key` until the returned permit is dropped.
    ///
    /// # Errors
    /// An [`OrchestrationError`] of kind `Busy` if `key` is already held.
    pub fn try_acquire(&self, key: OperationKey) -> Result<OperationPermit<'_>, OrchestrationError> {
        match self.held.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                debug!(operation = ?key, "Operation already in flight");
                Err(OrchestrationError::busy(key))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Ok(OperationPermit { locks: self, key })
            }
        }
    }

    pub fn is_held(&self, key: OperationKey) -> bool {
        self.held.contains_key(&key)
    }
}

/// Releases its operation lock when dropped.
#[must_use = "the lock is released as soon as the permit is dropped"]
#[derive(Debug)]
pub struct OperationPermit<'a> {
    locks: &'a OperationLocks,
    key: OperationKey,
}

impl OperationPermit<'_> {
    pub fn key(&self) -> OperationKey {
        self.key
    }
}

impl Drop for OperationPermit<'_> {
    fn drop(&mut self) {
        self.locks.held.remove(&self.key);
    }
}
