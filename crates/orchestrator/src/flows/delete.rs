//! Deletion of uploaded images, masks and the stratification file.

use morph_split_model::{ConfigUpdate, StatusFlag};
use morph_split_storage::Transport;
use tracing::info;

use crate::cache::QueryKey;
use crate::error::OrchestrationError;
use crate::flows::DELETE_STRATIFICATION_FILE;
use crate::locks::OperationKey;
use crate::orchestrator::Orchestrator;
use crate::step::{FlowProgress, Step};

const DELETE_IMAGE_DIRECTORY: Step = Step::new(
    "/project_directory/images/delete",
    "Image Deletion Failed",
    "Failed to delete uploaded and resized images.",
    "images deleted",
);
const CREATE_IMAGE_DIRECTORY: Step = Step::new(
    "/project_directory/images/create",
    "Directory Creation Failed",
    "Failed to create new images directory.",
    "images directory recreated",
);
const DELETE_RESIZED_IMAGES: Step = Step::new(
    "/gcs/resized_original_images/delete",
    "Resized Image Directory Deletion Failed",
    "Failed to delete the resized images in Google Cloud.",
    "resized images deleted",
);
const DELETE_MASK_DIRECTORY: Step = Step::new(
    "/project_directory/masks/delete",
    "Mask Deletion Failed",
    "Failed to delete uploaded and resized masks.",
    "masks deleted",
);
const CREATE_MASK_DIRECTORY: Step = Step::new(
    "/project_directory/masks/create",
    "Directory Creation Failed",
    "Failed to create new masks directory.",
    "masks directory recreated",
);
const DELETE_RESIZED_MASKS: Step = Step::new(
    "/gcs/resized_original_masks/delete",
    "Resized Mask Directory Deletion Failed",
    "Failed to delete the resized masks in Google Cloud.",
    "resized masks deleted",
);
const RESET_PREVIEW_URLS: Step = Step::new(
    "/reset-signed-urls-for-resized-images-and-masks",
    "Signed URL Reset Failed",
    "Failed to reset signed URLs for resized images and masks.",
    "preview URLs reset",
);

const IMAGE_DELETION_KEYS: [QueryKey; 4] = [
    QueryKey::ImageNames,
    QueryKey::Metadata,
    QueryKey::ImageUploadStatus,
    QueryKey::ImageMaskBalanceStatus,
];
const MASK_DELETION_KEYS: [QueryKey; 4] = [
    QueryKey::MaskNames,
    QueryKey::Metadata,
    QueryKey::MaskUploadStatus,
    QueryKey::ImageMaskBalanceStatus,
];
const STRATIFICATION_DELETION_KEYS: [QueryKey; 2] = [
    QueryKey::StratificationFileName,
    QueryKey::StratifiedSplitParameters,
];

impl<T: Transport> Orchestrator<T> {
    /// Delete the uploaded images and their resized previews, leaving an
    /// empty images directory.
    ///
    /// # Errors
    /// `Busy`, or `StepFailed` naming the failing step. The directory is only
    /// recreated once the deletion succeeded.
    pub async fn delete_images(&self) -> Result<(), OrchestrationError> {
        let result: Result<(), OrchestrationError> = self
            .run_directory_deletion(
                "image deletion",
                OperationKey::DeleteImages,
                StatusFlag::DeletingImages,
                [
                    &DELETE_IMAGE_DIRECTORY,
                    &CREATE_IMAGE_DIRECTORY,
                    &DELETE_RESIZED_IMAGES,
                    &RESET_PREVIEW_URLS,
                ],
                &IMAGE_DELETION_KEYS,
            )
            .await;
        self.report(result, "Images Deleted", "Uploaded images were deleted.")
    }

    /// Delete the uploaded masks and their resized previews.
    ///
    /// # Errors
    /// Same as [`Orchestrator::delete_images`].
    pub async fn delete_masks(&self) -> Result<(), OrchestrationError> {
        let result: Result<(), OrchestrationError> = self
            .run_directory_deletion(
                "mask deletion",
                OperationKey::DeleteMasks,
                StatusFlag::DeletingMasks,
                [
                    &DELETE_MASK_DIRECTORY,
                    &CREATE_MASK_DIRECTORY,
                    &DELETE_RESIZED_MASKS,
                    &RESET_PREVIEW_URLS,
                ],
                &MASK_DELETION_KEYS,
            )
            .await;
        self.report(result, "Masks Deleted", "Uploaded masks were deleted.")
    }

    /// Steps are, in order: delete the directory, recreate it, delete the
    /// resized previews, reset the preview URLs.
    async fn run_directory_deletion(
        &self,
        flow: &'static str,
        operation: OperationKey,
        flag: StatusFlag,
        [delete, create, delete_resized, reset_urls]: [&Step; 4],
        keys: &[QueryKey],
    ) -> Result<(), OrchestrationError> {
        let _permit = self.locks.try_acquire(operation)?;
        let _flag = self.flags.raise(flag);
        let mut progress: FlowProgress = FlowProgress::new(flow);

        // 1. Uploaded files
        let deleted = self.remove(delete).await;
        progress.require(delete, deleted)?;

        // 2. Empty directory for the next upload
        let created = self.trigger(create).await;
        progress.require(create, created)?;

        // 3. Resized previews in the bucket
        let deleted = self.remove(delete_resized).await;
        progress.require(delete_resized, deleted)?;

        // 4. Preview URLs
        let reset = self.trigger(reset_urls).await;
        progress.require(reset_urls, reset)?;

        self.cache.invalidate(keys);
        info!(flow, "Deletion completed");
        Ok(())
    }

    /// Delete the stratification file. The selected split parameter is
    /// cleared whatever the outcome.
    ///
    /// # Errors
    /// `Busy`, or `StepFailed` if the backend could not delete the file.
    pub async fn delete_stratification_file(&self) -> Result<(), OrchestrationError> {
        let result: Result<(), OrchestrationError> = self.run_stratification_deletion().await;
        self.config
            .dispatch(ConfigUpdate::SplitParameter(String::new()));
        self.report(
            result,
            "Stratification File Deleted",
            "The stratification data file was deleted.",
        )
    }

    async fn run_stratification_deletion(&self) -> Result<(), OrchestrationError> {
        let _permit = self.locks.try_acquire(OperationKey::DeleteStratificationFile)?;
        let _flag = self.flags.raise(StatusFlag::DeletingStratDataFile);
        let mut progress: FlowProgress = FlowProgress::new("stratification file deletion");

        let deleted = self.remove(&DELETE_STRATIFICATION_FILE).await;
        progress.require(&DELETE_STRATIFICATION_FILE, deleted)?;

        self.cache.invalidate(&STRATIFICATION_DELETION_KEYS);
        info!("Stratification file deleted");
        Ok(())
    }
}
