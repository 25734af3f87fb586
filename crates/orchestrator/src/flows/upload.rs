//! Image, mask and stratification file uploads.

use morph_split_model::{
    file_extension, sort_by_name, validate_selection, BackendResponse, BucketFolder, ConfigUpdate,
    FileKind, StatusFlag, ValidationError,
};
use morph_split_storage::{ClientError, FormPart, RequestBody, Transport, UploadFile, UploadReport};
use tracing::info;

use crate::cache::QueryKey;
use crate::error::OrchestrationError;
use crate::flows::DELETE_STRATIFICATION_FILE;
use crate::locks::OperationKey;
use crate::orchestrator::Orchestrator;
use crate::step::{FlowProgress, Step};

const SIGNED_UPLOAD_URL: &str = "/generate-signed-upload-url";

const UPLOAD_IMAGES: Step = Step::new(
    SIGNED_UPLOAD_URL,
    "Upload Failed",
    "Failed to upload images to Google Cloud.",
    "images uploaded to the bucket",
);
const TRANSFER_IMAGES: Step = Step::new(
    "/gcs/transfer_images_to_backend",
    "Transfer Failed",
    "Failed to transfer images to the backend.",
    "images transferred to the backend",
);
const RESIZE_IMAGES: Step = Step::new(
    "/resize-uploaded-images",
    "Resize Failed",
    "Failed to resize uploaded images.",
    "images resized",
);
const TRANSFER_RESIZED_IMAGES: Step = Step::new(
    "/gcs/transfer_resized_original_images_to_gcs",
    "Resized Image Transfer Failed.",
    "Failed to transfer resized images.",
    "resized images transferred to the bucket",
);
const UPLOAD_MASKS: Step = Step::new(
    SIGNED_UPLOAD_URL,
    "Upload Failed",
    "Failed to upload masks to Google Cloud.",
    "masks uploaded to the bucket",
);
const TRANSFER_MASKS: Step = Step::new(
    "/gcs/transfer_masks_to_backend",
    "Transfer Failed",
    "Failed to transfer masks to the backend.",
    "masks transferred to the backend",
);
const UPLOAD_STRATIFICATION_FILE: Step = Step::new(
    "/upload/backend/stratification_file",
    "Upload Error",
    "Failed to upload the stratification data file.",
    "stratification file uploaded",
);

/// Multipart field carrying the stratification file.
pub(crate) const STRATIFICATION_FILE_FIELD: &str = "stratificationDataFile";

const IMAGE_UPLOAD_KEYS: [QueryKey; 6] = [
    QueryKey::ImageNames,
    QueryKey::Metadata,
    QueryKey::ImageUploadStatus,
    QueryKey::ImageMaskBalanceStatus,
    QueryKey::StratificationFileName,
    QueryKey::StratifiedSplitParameters,
];
const MASK_UPLOAD_KEYS: [QueryKey; 6] = [
    QueryKey::MaskNames,
    QueryKey::Metadata,
    QueryKey::MaskUploadStatus,
    QueryKey::ImageMaskBalanceStatus,
    QueryKey::StratificationFileName,
    QueryKey::StratifiedSplitParameters,
];
const STRATIFICATION_UPLOAD_KEYS: [QueryKey; 2] = [
    QueryKey::StratifiedSplitParameters,
    QueryKey::StratificationFileName,
];

impl<T: Transport> Orchestrator<T> {
    /// Upload images, hand them to the backend, resize them and publish the
    /// resized copies for preview.
    ///
    /// # Arguments
    /// * `files` - Selected images (`png`, `jpg`, `jpeg`)
    ///
    /// # Errors
    /// * `Validation` for an empty selection or a file with another extension
    /// * `Busy` while another image upload runs
    /// * `StepFailed` titled after the first step that failed
    pub async fn upload_images(&self, files: Vec<UploadFile>) -> Result<(), OrchestrationError> {
        let count: usize = files.len();
        let result: Result<(), OrchestrationError> = self.run_image_upload(files).await;
        self.report(
            result,
            "Upload Successful",
            &format!("{} image(s) uploaded successfully!", count),
        )
    }

    async fn run_image_upload(&self, mut files: Vec<UploadFile>) -> Result<(), OrchestrationError> {
        validate_files(FileKind::Image, &files)?;
        let _permit = self.locks.try_acquire(OperationKey::ImageUpload)?;
        let _flag = self.flags.raise(StatusFlag::ImageIsUploading);
        let mut progress: FlowProgress = FlowProgress::new("image upload");
        sort_by_name(&mut files, |f: &UploadFile| f.name.as_str());

        // 1. Files to the bucket
        let report = self
            .backend
            .endpoint(SIGNED_UPLOAD_URL)
            .upload_to_object_store(&files, &BucketFolder::Images.path())
            .await;
        require_upload(&mut progress, &UPLOAD_IMAGES, files.len(), report)?;

        // 2. Bucket to backend
        let transferred = self.trigger(&TRANSFER_IMAGES).await;
        progress.require(&TRANSFER_IMAGES, transferred)?;

        // 3. Resize
        let resized = self.trigger(&RESIZE_IMAGES).await;
        progress.require(&RESIZE_IMAGES, resized)?;

        // 4. Resized copies back to the bucket for preview
        let transferred = self.trigger(&TRANSFER_RESIZED_IMAGES).await;
        progress.require(&TRANSFER_RESIZED_IMAGES, transferred)?;

        // 5. The stratification file no longer matches the images
        let deleted = self.remove(&DELETE_STRATIFICATION_FILE).await;
        if let Some(err) = progress.allow_failure(&DELETE_STRATIFICATION_FILE, deleted) {
            self.report_non_fatal("image upload", &err);
        }

        if let Some(ext) = files.first().and_then(|f| file_extension(&f.name)) {
            self.config
                .dispatch(ConfigUpdate::ImageType(format!("image/{}", ext)));
        }
        self.cache.invalidate(&IMAGE_UPLOAD_KEYS);
        info!(files = files.len(), "Images uploaded");
        Ok(())
    }

    /// Upload masks and hand them to the backend.
    ///
    /// # Errors
    /// Same as [`Orchestrator::upload_images`].
    pub async fn upload_masks(&self, files: Vec<UploadFile>) -> Result<(), OrchestrationError> {
        let count: usize = files.len();
        let result: Result<(), OrchestrationError> = self.run_mask_upload(files).await;
        self.report(
            result,
            "Upload Successful",
            &format!("{} mask(s) uploaded successfully!", count),
        )
    }

    async fn run_mask_upload(&self, mut files: Vec<UploadFile>) -> Result<(), OrchestrationError> {
        validate_files(FileKind::Image, &files)?;
        let _permit = self.locks.try_acquire(OperationKey::MaskUpload)?;
        let _flag = self.flags.raise(StatusFlag::MaskIsUploading);
        let mut progress: FlowProgress = FlowProgress::new("mask upload");
        sort_by_name(&mut files, |f: &UploadFile| f.name.as_str());

        // 1. Files to the bucket
        let report = self
            .backend
            .endpoint(SIGNED_UPLOAD_URL)
            .upload_to_object_store(&files, &BucketFolder::Masks.path())
            .await;
        require_upload(&mut progress, &UPLOAD_MASKS, files.len(), report)?;

        // 2. Bucket to backend
        let transferred = self.trigger(&TRANSFER_MASKS).await;
        progress.require(&TRANSFER_MASKS, transferred)?;

        // 3. Stale stratification file
        let deleted = self.remove(&DELETE_STRATIFICATION_FILE).await;
        if let Some(err) = progress.allow_failure(&DELETE_STRATIFICATION_FILE, deleted) {
            self.report_non_fatal("mask upload", &err);
        }

        self.cache.invalidate(&MASK_UPLOAD_KEYS);
        info!(files = files.len(), "Masks uploaded");
        Ok(())
    }

    /// Upload the CSV used for stratified splitting and store the column
    /// names the backend found in it.
    ///
    /// # Returns
    /// The split parameters offered by the file.
    ///
    /// # Errors
    /// `Validation` for a non-CSV file, `Busy`, or `StepFailed`.
    pub async fn upload_stratification_file(
        &self,
        file: UploadFile,
    ) -> Result<Vec<String>, OrchestrationError> {
        let result: Result<Vec<String>, OrchestrationError> =
            self.run_stratification_upload(file).await;
        self.report(
            result,
            "Successful Upload",
            "Successfully uploaded the stratification data file.",
        )
    }

    async fn run_stratification_upload(
        &self,
        file: UploadFile,
    ) -> Result<Vec<String>, OrchestrationError> {
        validate_selection(FileKind::StratificationData, &[file.name.as_str()])?;
        let _permit = self.locks.try_acquire(OperationKey::StratificationUpload)?;
        let mut progress: FlowProgress = FlowProgress::new("stratification file upload");

        let body: RequestBody =
            RequestBody::Multipart(vec![FormPart::file(STRATIFICATION_FILE_FIELD, &file)]);
        let uploaded: Result<BackendResponse, ClientError> = self
            .backend
            .endpoint(UPLOAD_STRATIFICATION_FILE.endpoint)
            .post_data(body)
            .await;
        let response: BackendResponse = progress.require(&UPLOAD_STRATIFICATION_FILE, uploaded)?;

        let parameters: Vec<String> = response.results.unwrap_or_default();
        self.config
            .dispatch(ConfigUpdate::SplitParameters(parameters.clone()));
        self.cache.invalidate(&STRATIFICATION_UPLOAD_KEYS);
        info!(file = %file.name, parameters = parameters.len(), "Stratification file uploaded");
        Ok(parameters)
    }
}

fn validate_files(kind: FileKind, files: &[UploadFile]) -> Result<(), ValidationError> {
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    validate_selection(kind, &names)
}

/// Gate on an object-store batch: any file left behind fails the step.
fn require_upload(
    progress: &mut FlowProgress,
    step: &Step,
    total: usize,
    report: Result<UploadReport, ClientError>,
) -> Result<(), OrchestrationError> {
    match report {
        Ok(report) if report.success => {
            progress.complete(step);
            Ok(())
        }
        Ok(report) => Err(progress.fail(
            step,
            format!(
                "{} of {} files were not stored: {}",
                report.failed_files.len(),
                total,
                report.failed_files.join(", ")
            ),
        )),
        Err(err) => Err(progress.fail(step, err)),
    }
}
