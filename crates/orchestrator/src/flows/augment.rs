//! Augmentation run.

use morph_split_model::{AugConfig, BackendResponse, ErrorType, StatusFlag};
use morph_split_storage::{ClientError, FormPart, RequestBody, Transport, UploadFile};
use tracing::{info, warn};

use crate::cache::QueryKey;
use crate::error::{ErrorKind, OrchestrationError};
use crate::flows::upload::STRATIFICATION_FILE_FIELD;
use crate::locks::OperationKey;
use crate::orchestrator::Orchestrator;
use crate::step::{FlowProgress, Step};

const AUGMENT: Step = Step::new(
    "/augment",
    "Augmentation Failed",
    "Failed to complete augmentation.",
    "augmentation finished",
);
const TRANSFER_AUGMENTED_ZIP: Step = Step::new(
    "/gcs/transfer_augmented_zip_to_gcs",
    "Augmented Data Transfer Failed",
    "Failed to transfer the zipped augmented data to Google Cloud.",
    "augmented archive transferred to the bucket",
);
const TRANSFER_RESIZED_AUGMENTED: Step = Step::new(
    "/gcs/transfer_resized_augmented_data_to_gcs",
    "Resized Augmented Data Transfer Failed",
    "Failed to transfer the resized augmented data to Google Cloud.",
    "resized augmented data transferred to the bucket",
);
const RESET_SPLIT_URLS: Step = Step::new(
    "/reset-signed-urls-for-resized-train-val-test-sets",
    "Resetting Signed URLs",
    "Failed to reset signed URLs for the train, validation and test sets.",
    "split preview URLs reset",
);

const STRATIFIED_SPLIT_TITLE: &str = "Stratified Split Failed";
const CONFIG_FIELD: &str = "config";

const AUGMENTATION_KEYS: [QueryKey; 4] = [
    QueryKey::AugmentationIsComplete,
    QueryKey::TrainingSet,
    QueryKey::ValidationSet,
    QueryKey::TestingSet,
];

impl<T: Transport> Orchestrator<T> {
    /// Submit the current configuration for augmentation and publish the
    /// results.
    ///
    /// # Errors
    /// * `StratifiedSplit` when the backend cannot produce the requested
    ///   stratified split
    /// * `Busy` while another augmentation runs
    /// * `StepFailed` for any other failing step
    /// * `Client` if the stratification file cannot be read or the
    ///   configuration cannot be encoded
    pub async fn run_augmentation(&self) -> Result<(), OrchestrationError> {
        let result: Result<(), OrchestrationError> = self.run_augment().await;
        self.report(result, "Augmentation completed!", "Augmented data is ready.")
    }

    async fn run_augment(&self) -> Result<(), OrchestrationError> {
        let _permit = self.locks.try_acquire(OperationKey::Augmentation)?;
        let _flag = self.flags.raise(StatusFlag::AugmentationIsRunning);
        let mut progress: FlowProgress = FlowProgress::new("augmentation");

        // 1. Augment
        let config = self.config.get();
        let body: RequestBody = augmentation_form(&config).await?;
        let augmented: Result<BackendResponse, ClientError> =
            self.backend.endpoint(AUGMENT.endpoint).post_data(body).await;
        if let Some(detail) = stratified_split_failure(&augmented) {
            warn!(detail = %detail, "Stratified split failed");
            return Err(OrchestrationError::new(
                ErrorKind::StratifiedSplit,
                STRATIFIED_SPLIT_TITLE,
                detail,
            ));
        }
        progress.require(&AUGMENT, augmented)?;

        // 2. Zipped results to the bucket
        let transferred = self.trigger(&TRANSFER_AUGMENTED_ZIP).await;
        progress.require(&TRANSFER_AUGMENTED_ZIP, transferred)?;

        // 3. Resized previews to the bucket
        let transferred = self.trigger(&TRANSFER_RESIZED_AUGMENTED).await;
        progress.require(&TRANSFER_RESIZED_AUGMENTED, transferred)?;

        // 4. Preview URLs now point at stale objects
        let reset = self.trigger(&RESET_SPLIT_URLS).await;
        progress.require(&RESET_SPLIT_URLS, reset)?;

        self.cache.invalidate(&AUGMENTATION_KEYS);
        info!(
            total = config.total_augmented_images,
            seed = config.seed,
            "Augmentation completed"
        );
        Ok(())
    }
}

/// The `/augment` form: the configuration as JSON and, when one is set, the
/// stratification file.
async fn augmentation_form(config: &AugConfig) -> Result<RequestBody, OrchestrationError> {
    let mut parts: Vec<FormPart> = Vec::new();
    if let Some(strat) = &config.stratification_data_file {
        let file: UploadFile = UploadFile::from_path(&strat.path).await?;
        parts.push(FormPart::file(STRATIFICATION_FILE_FIELD, &file));
    }
    let payload: String = config.backend_payload().map_err(|e| {
        OrchestrationError::new(ErrorKind::Client, "Invalid Configuration", e.to_string())
    })?;
    parts.push(FormPart::text(CONFIG_FIELD, payload));
    Ok(RequestBody::Multipart(parts))
}

/// Description of a stratified split failure, whichever way it was reported.
fn stratified_split_failure(result: &Result<BackendResponse, ClientError>) -> Option<String> {
    match result {
        Err(err) if err.error_type() == Some(ErrorType::STRATIFIED_SPLIT) => Some(match err {
            ClientError::Backend { error, .. } => error.clone(),
            other => other.to_string(),
        }),
        Ok(response)
            if !response.success && response.error_kind() == Some(ErrorType::StratifiedSplit) =>
        {
            Some(response.describe())
        }
        _ => None,
    }
}
