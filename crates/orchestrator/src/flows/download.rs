//! Download of augmentation results through signed URLs.

use std::path::{Path, PathBuf};

use morph_split_model::{SignedUrl, StatusFlag};
use morph_split_storage::{download_blob, ClientError, Transport};
use tracing::{debug, info};

use crate::error::OrchestrationError;
use crate::locks::OperationKey;
use crate::orchestrator::Orchestrator;
use crate::step::{FlowProgress, Step};

const SIGN_DOWNLOADS: Step = Step::new(
    "/generate-signed-download-url",
    "Download Failed",
    "Failed to get download links.",
    "download links issued",
);
const FETCH_OBJECT: Step = Step::new(
    "<signed-url>",
    "Download Failed",
    "Failed to fetch a file from Google Cloud.",
    "file downloaded",
);

impl<T: Transport> Orchestrator<T> {
    /// Download files from the session bucket into `dir`.
    ///
    /// # Arguments
    /// * `filenames` - Objects to fetch, e.g. the augmented archive
    /// * `dir` - Destination directory, created if missing
    ///
    /// # Returns
    /// The paths written, in the order the backend listed the URLs.
    ///
    /// # Errors
    /// `Busy`, or `StepFailed` when no URL comes back or a fetch or write
    /// fails. Files saved before the failure are kept.
    pub async fn download_results(
        &self,
        filenames: &[String],
        dir: &Path,
    ) -> Result<Vec<PathBuf>, OrchestrationError> {
        let result: Result<Vec<PathBuf>, OrchestrationError> =
            self.run_download(filenames, dir).await;
        let message: String = match &result {
            Ok(saved) => format!("{} file(s) saved to {}", saved.len(), dir.display()),
            Err(_) => String::new(),
        };
        self.report(result, "Download Complete", &message)
    }

    async fn run_download(
        &self,
        filenames: &[String],
        dir: &Path,
    ) -> Result<Vec<PathBuf>, OrchestrationError> {
        let _permit = self.locks.try_acquire(OperationKey::Download)?;
        let _flag = self.flags.raise(StatusFlag::IsDownloading);
        let mut progress: FlowProgress = FlowProgress::new("download");

        // 1. Signed read URLs
        let client = self.backend.endpoint(SIGN_DOWNLOADS.endpoint);
        let urls: Vec<SignedUrl> = match client.get_signed_download_urls(filenames).await {
            Ok(urls) if urls.is_empty() => {
                return Err(progress.fail(&SIGN_DOWNLOADS, "No signed URLs found."))
            }
            Ok(urls) => urls,
            Err(err) => return Err(progress.fail(&SIGN_DOWNLOADS, err)),
        };
        progress.complete(&SIGN_DOWNLOADS);

        // 2. Each object, one at a time
        let mut saved: Vec<PathBuf> = Vec::with_capacity(urls.len());
        for signed in &urls {
            debug!(file = %signed.filename, "Downloading");
            let fetched: Result<PathBuf, ClientError> = async {
                let bytes: Vec<u8> = client.download_object(&signed.url).await?;
                download_blob(&bytes, dir, &signed.filename).await
            }
            .await;
            match fetched {
                Ok(path) => {
                    progress.complete(&FETCH_OBJECT);
                    saved.push(path);
                }
                Err(err) => {
                    return Err(progress.fail(&FETCH_OBJECT, format!("{}: {}", signed.filename, err)))
                }
            }
        }

        info!(files = saved.len(), dir = %dir.display(), "Download finished");
        Ok(saved)
    }
}
