//! The multi-step flows, as methods on [`Orchestrator`](crate::Orchestrator).
//!
//! Every public flow follows the same shape:
//!
//! 1. Validate local input; nothing reaches the network on failure
//! 2. Take the operation's in-flight lock
//! 3. Raise the operation's status flag; the guard clears it on every path
//! 4. Run the remote steps forward-only, stopping at the first failure
//! 5. Invalidate exactly the cache keys whose truth changed
//! 6. Notify the outcome and return it

mod augment;
mod delete;
mod download;
mod session;
mod upload;

use morph_split_model::BackendResponse;
use morph_split_storage::{ClientError, RequestBody, Transport};

use crate::orchestrator::Orchestrator;
use crate::step::Step;

/// Shared by several flows: a freshly uploaded image or mask set makes the
/// current stratification file stale.
pub(crate) const DELETE_STRATIFICATION_FILE: Step = Step::new(
    "/stratification_data_file/delete",
    "Stratification File Deletion Failed",
    "Failed to delete the stratification data file.",
    "stratification file deleted",
);

impl<T: Transport> Orchestrator<T> {
    /// POST a step's endpoint with no body.
    pub(crate) async fn trigger(&self, step: &Step) -> Result<BackendResponse, ClientError> {
        self.backend
            .endpoint(step.endpoint)
            .execute_action(RequestBody::Empty)
            .await
    }

    /// DELETE a step's endpoint.
    pub(crate) async fn remove(&self, step: &Step) -> Result<BackendResponse, ClientError> {
        self.backend
            .endpoint(step.endpoint)
            .delete_file_or_directory(None)
            .await
    }
}
