//! Forward-only step sequencing.
//!
//! A flow runs its remote steps in order and stops at the first one that does
//! not declare success. Completed steps are never undone; when a flow stops
//! after changing remote state, the completed steps are logged so orphaned
//! resources can be found later.

use std::fmt;

use morph_split_model::BackendResponse;
use morph_split_storage::ClientError;
use tracing::{debug, warn};

use crate::error::OrchestrationError;

/// One remote step and the error surfaced when it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Step {
    pub endpoint: &'static str,
    pub title: &'static str,
    pub message: &'static str,
    /// What the step leaves behind, e.g. "bucket created".
    pub effect: &'static str,
}

impl Step {
    pub const fn new(
        endpoint: &'static str,
        title: &'static str,
        message: &'static str,
        effect: &'static str,
    ) -> Self {
        Self {
            endpoint,
            title,
            message,
            effect,
        }
    }
}

/// Tracks the completed steps of one flow invocation.
#[derive(Debug)]
pub(crate) struct FlowProgress {
    flow: &'static str,
    completed: Vec<&'static str>,
}

impl FlowProgress {
    pub fn new(flow: &'static str) -> Self {
        debug!(flow, "Flow started");
        Self {
            flow,
            completed: Vec::new(),
        }
    }

    /// Gate on a step's declared result.
    ///
    /// # Errors
    /// A `StepFailed` error carrying the step's title when the call failed or
    /// the backend answered `success: false`.
    pub fn require(
        &mut self,
        step: &Step,
        result: Result<BackendResponse, ClientError>,
    ) -> Result<BackendResponse, OrchestrationError> {
        match result {
            Ok(response) if response.success => {
                self.complete(step);
                Ok(response)
            }
            Ok(response) => Err(self.fail(step, response.describe())),
            Err(err) => Err(self.fail(step, err)),
        }
    }

    /// Run a step whose failure does not stop the flow.
    ///
    /// # Returns
    /// The step's error when it failed, for the caller to surface.
    pub fn allow_failure(
        &mut self,
        step: &Step,
        result: Result<BackendResponse, ClientError>,
    ) -> Option<OrchestrationError> {
        let detail: String = match result {
            Ok(response) if response.success => {
                self.complete(step);
                return None;
            }
            Ok(response) => response.describe(),
            Err(err) => err.to_string(),
        };
        warn!(flow = self.flow, step = step.endpoint, detail = %detail, "Optional step failed");
        Some(OrchestrationError::step_failed(
            step.title,
            format!("{} ({})", step.message, detail),
        ))
    }

    /// Record a step that succeeded.
    pub fn complete(&mut self, step: &Step) {
        debug!(flow = self.flow, step = step.endpoint, "Step completed");
        self.completed.push(step.effect);
    }

    /// Build the error for a failed step and log what was left behind.
    pub fn fail(&self, step: &Step, detail: impl fmt::Display) -> OrchestrationError {
        let detail: String = detail.to_string();
        warn!(flow = self.flow, step = step.endpoint, detail = %detail, "Step failed");
        if !self.completed.is_empty() {
            warn!(
                flow = self.flow,
                completed = ?self.completed,
                "Flow stopped after remote changes; completed steps are not undone"
            );
        }
        OrchestrationError::step_failed(step.title, format!("{} ({})", step.message, detail))
    }

    pub fn completed(&self) -> &[&'static str] {
        &self.completed
    }
}
