//! Session lifecycle: start, end, reset.

use morph_split_model::StatusFlag;
use morph_split_storage::Transport;
use tracing::info;

use crate::cache::QueryKey;
use crate::effects::Route;
use crate::error::OrchestrationError;
use crate::flows::DELETE_STRATIFICATION_FILE;
use crate::locks::OperationKey;
use crate::orchestrator::{Orchestrator, SESSION_KEYS};
use crate::step::{FlowProgress, Step};

const CREATE_BUCKET: Step = Step::new(
    "/gcs/create_bucket",
    "GCS Bucket Creation",
    "Failed to create a Google Cloud Storage bucket.",
    "bucket created",
);
const CREATE_PROJECT_DIRECTORIES: Step = Step::new(
    "/project_directories/create",
    "Project Directory Creation",
    "Failed to create backend project directories.",
    "project directories created",
);
const DELETE_BUCKET: Step = Step::new(
    "/gcs/delete_bucket",
    "Bucket Deletion Failed",
    "Failed to delete Google Cloud Storage Bucket.",
    "bucket deleted",
);
const DELETE_PROJECT_DIRECTORIES: Step = Step::new(
    "/project_directories/delete",
    "Project Directory Deletion Failed",
    "Failed to delete project directories.",
    "project directories deleted",
);
const CLEAR_SESSION: Step = Step::new(
    "/session/clear_session",
    "Session Clear Failed",
    "Failed to clear the server-side session.",
    "server session cleared",
);
const RESET_SESSION: Step = Step::new(
    "/reset_session",
    "Session Reset Failed",
    "Failed to reset the session.",
    "session reset",
);

impl<T: Transport> Orchestrator<T> {
    /// Create the session's bucket and backend project directories, then move
    /// to the image upload page.
    ///
    /// # Errors
    /// `Busy` while another session operation runs; `StepFailed` naming the
    /// step that failed. A bucket created before a failure is left in place.
    pub async fn start_session(&self) -> Result<(), OrchestrationError> {
        let result: Result<(), OrchestrationError> = self.run_start_session().await;
        self.report(result, "Session Started", "The session is ready for uploads.")
    }

    async fn run_start_session(&self) -> Result<(), OrchestrationError> {
        let _permit = self.locks.try_acquire(OperationKey::Session)?;
        let mut progress: FlowProgress = FlowProgress::new("start session");

        // 1. Bucket
        let created = self.trigger(&CREATE_BUCKET).await;
        progress.require(&CREATE_BUCKET, created)?;

        // 2. Backend working directories
        let created = self.trigger(&CREATE_PROJECT_DIRECTORIES).await;
        progress.require(&CREATE_PROJECT_DIRECTORIES, created)?;

        self.navigator.navigate(Route::ImageUpload);
        self.cache.invalidate(&[QueryKey::BackendIsRunning]);
        info!("Session started");
        Ok(())
    }

    /// Tear the session down and clear every piece of local state.
    ///
    /// A failed stratification file deletion is notified but does not stop
    /// the teardown.
    ///
    /// # Errors
    /// `Busy`, or `StepFailed` for the bucket, project directory or session
    /// clearing steps; local state is kept when any of them fails.
    pub async fn end_session(&self) -> Result<(), OrchestrationError> {
        let result: Result<(), OrchestrationError> = self.run_end_session().await;
        self.report(result, "Session Ended", "All session resources were deleted.")
    }

    async fn run_end_session(&self) -> Result<(), OrchestrationError> {
        let _permit = self.locks.try_acquire(OperationKey::Session)?;
        let _flag = self.flags.raise(StatusFlag::IsShuttingDown);
        let mut progress: FlowProgress = FlowProgress::new("end session");

        // 1. Bucket
        let deleted = self.remove(&DELETE_BUCKET).await;
        progress.require(&DELETE_BUCKET, deleted)?;

        // 2. Stratification file; may already be gone
        let deleted = self.remove(&DELETE_STRATIFICATION_FILE).await;
        if let Some(err) = progress.allow_failure(&DELETE_STRATIFICATION_FILE, deleted) {
            self.report_non_fatal("end session", &err);
        }

        // 3. Backend working directories
        let deleted = self.remove(&DELETE_PROJECT_DIRECTORIES).await;
        progress.require(&DELETE_PROJECT_DIRECTORIES, deleted)?;

        // 4. Server-side session record
        let cleared = self.trigger(&CLEAR_SESSION).await;
        progress.require(&CLEAR_SESSION, cleared)?;

        // Forget the id first so a storage failure leaves local state intact.
        self.backend.identity().remove_session_id()?;
        self.clear_local_state();
        self.navigator.navigate(Route::Welcome);
        self.cache.invalidate(&SESSION_KEYS);
        info!("Session ended");
        Ok(())
    }

    /// Ask the backend to wipe the session's data and start over, keeping the
    /// session id.
    ///
    /// # Errors
    /// `Busy`, or `StepFailed` if the backend reset fails.
    pub async fn reset_session(&self) -> Result<(), OrchestrationError> {
        let result: Result<(), OrchestrationError> = self.run_reset_session().await;
        self.report(result, "Session Reset", "Session reset successfully!")
    }

    async fn run_reset_session(&self) -> Result<(), OrchestrationError> {
        let _permit = self.locks.try_acquire(OperationKey::Session)?;
        let _flag = self.flags.raise(StatusFlag::IsResetting);
        let mut progress: FlowProgress = FlowProgress::new("reset session");

        let reset = self.trigger(&RESET_SESSION).await;
        progress.require(&RESET_SESSION, reset)?;

        self.clear_local_state();
        self.navigator.navigate(Route::ImageUpload);
        self.cache.invalidate(&SESSION_KEYS);
        info!("Session reset");
        Ok(())
    }

    fn clear_local_state(&self) {
        self.config.reset();
        self.flags.reset();
    }
}
