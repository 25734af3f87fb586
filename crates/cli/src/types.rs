//! Serializable views printed by the CLI.

use morph_split_model::{BackendResponse, StatusFlag, StatusFlags};
use morph_split_orchestrator::StatusCheck;
use serde::Serialize;

/// Result of one backend status check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusLine {
    pub check: String,
    pub success: bool,
    pub is_running: Option<bool>,
    /// Message or error text, whichever the backend sent.
    pub detail: Option<String>,
}

impl StatusLine {
    pub fn new(check: StatusCheck, response: &BackendResponse) -> Self {
        Self {
            check: check.query_key().to_string(),
            success: response.success,
            is_running: response.is_running,
            detail: response.error.clone().or_else(|| response.message.clone()),
        }
    }

    /// A check whose request failed outright.
    pub fn unreachable(check: StatusCheck, error: impl ToString) -> Self {
        Self {
            check: check.query_key().to_string(),
            success: false,
            is_running: None,
            detail: Some(error.to_string()),
        }
    }
}

/// Backend status checks plus the flags raised locally.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub checks: Vec<StatusLine>,
    pub active_flags: Vec<String>,
}

impl StatusReport {
    pub fn new(checks: Vec<StatusLine>, flags: &StatusFlags) -> Self {
        Self {
            checks,
            active_flags: flags
                .active()
                .into_iter()
                .map(|f: StatusFlag| f.as_str().to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line_prefers_error() {
        let mut response: BackendResponse = BackendResponse::failure("no bucket");
        response.message = Some("ignored".into());
        let line: StatusLine = StatusLine::new(StatusCheck::SessionIsRunning, &response);

        assert_eq!(line.check, "sessionIsRunning");
        assert_eq!(line.detail.as_deref(), Some("no bucket"));
    }

    #[test]
    fn test_report_lists_active_flags() {
        let mut flags: StatusFlags = StatusFlags::default();
        flags.set(StatusFlag::IsDownloading, true);
        let report: StatusReport = StatusReport::new(Vec::new(), &flags);
        assert_eq!(report.active_flags, vec!["isDownloading".to_string()]);
    }
}
