//! In-flight status flags.
//!
//! One boolean per long-running operation. Orchestrators raise a flag when an
//! operation starts and clear it when it ends, whatever the outcome; the UI
//! reads them to disable controls and show progress.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Names one of the [`StatusFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusFlag {
    ImageIsUploading,
    MaskIsUploading,
    AugmentationIsRunning,
    DeletingImages,
    DeletingMasks,
    DeletingStratDataFile,
    IsResetting,
    IsShuttingDown,
    IsDownloading,
}

impl StatusFlag {
    pub const ALL: [StatusFlag; 9] = [
        StatusFlag::ImageIsUploading,
        StatusFlag::MaskIsUploading,
        StatusFlag::AugmentationIsRunning,
        StatusFlag::DeletingImages,
        StatusFlag::DeletingMasks,
        StatusFlag::DeletingStratDataFile,
        StatusFlag::IsResetting,
        StatusFlag::IsShuttingDown,
        StatusFlag::IsDownloading,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFlag::ImageIsUploading => "imageIsUploading",
            StatusFlag::MaskIsUploading => "maskIsUploading",
            StatusFlag::AugmentationIsRunning => "augmentationIsRunning",
            StatusFlag::DeletingImages => "deletingImages",
            StatusFlag::DeletingMasks => "deletingMasks",
            StatusFlag::DeletingStratDataFile => "deletingStratDataFile",
            StatusFlag::IsResetting => "isResetting",
            StatusFlag::IsShuttingDown => "isShuttingDown",
            StatusFlag::IsDownloading => "isDownloading",
        }
    }
}

impl fmt::Display for StatusFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of every status flag. All clear by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFlags {
    pub image_is_uploading: bool,
    pub mask_is_uploading: bool,
    pub augmentation_is_running: bool,
    pub deleting_images: bool,
    pub deleting_masks: bool,
    pub deleting_strat_data_file: bool,
    pub is_resetting: bool,
    pub is_shutting_down: bool,
    pub is_downloading: bool,
}

impl StatusFlags {
    pub fn get(&self, flag: StatusFlag) -> bool {
        match flag {
            StatusFlag::ImageIsUploading => self.image_is_uploading,
            StatusFlag::MaskIsUploading => self.mask_is_uploading,
            StatusFlag::AugmentationIsRunning => self.augmentation_is_running,
            StatusFlag::DeletingImages => self.deleting_images,
            StatusFlag::DeletingMasks => self.deleting_masks,
            StatusFlag::DeletingStratDataFile => self.deleting_strat_data_file,
            StatusFlag::IsResetting => self.is_resetting,
            StatusFlag::IsShuttingDown => self.is_shutting_down,
            StatusFlag::IsDownloading => self.is_downloading,
        }
    }

    pub fn set(&mut self, flag: StatusFlag, value: bool) {
        let slot: &mut bool = match flag {
            StatusFlag::ImageIsUploading => &mut self.image_is_uploading,
            StatusFlag::MaskIsUploading => &mut self.mask_is_uploading,
            StatusFlag::AugmentationIsRunning => &mut self.augmentation_is_running,
            StatusFlag::DeletingImages => &mut self.deleting_images,
            StatusFlag::DeletingMasks => &mut self.deleting_masks,
            StatusFlag::DeletingStratDataFile => &mut self.deleting_strat_data_file,
            StatusFlag::IsResetting => &mut self.is_resetting,
            StatusFlag::IsShuttingDown => &mut self.is_shutting_down,
            StatusFlag::IsDownloading => &mut self.is_downloading,
        };
        *slot = value;
    }

    /// True while any operation is in flight.
    pub fn any_active(&self) -> bool {
        StatusFlag::ALL.iter().any(|flag| self.get(*flag))
    }

    /// Flags currently raised.
    pub fn active(&self) -> Vec<StatusFlag> {
        StatusFlag::ALL
            .into_iter()
            .filter(|flag| self.get(*flag))
            .collect()
    }
}
