//! Integration tests for the orchestration flows.
//!
//! A scripted Transport stands in for the backend and the object store; the
//! notifier and navigator record what the flows surface.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use morph_split_model::{AugConfig, ConfigUpdate, StatusFlag};
use morph_split_orchestrator::{
    ErrorKind, Navigator, Notification, NotificationLevel, Notifier, OperationKey,
    OrchestrationError, Orchestrator, QueryKey, Route, SESSION_KEYS,
};
use morph_split_storage::{
    ApiRequest, ApiResponse, Backend, ClientError, HttpMethod, MemorySessionStore,
    SessionIdentity, SessionStore, Transport, UploadFile,
};
use serde_json::{json, Value};

// ============================================================================
// Test Infrastructure
// ============================================================================

#[derive(Debug, Default)]
struct MockTransport {
    /// Responses by endpoint path. Unscripted paths answer `{success: true}`.
    responses: Mutex<HashMap<String, ApiResponse>>,
    requests: Mutex<Vec<ApiRequest>>,
    /// Objects by URL.
    objects: Mutex<HashMap<String, Vec<u8>>>,
    put_count: AtomicU64,
}

impl MockTransport {
    fn respond(&self, path: &str, status: u16, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), ApiResponse::json(status, &body));
    }

    fn fail(&self, path: &str, error: &str) {
        self.respond(path, 500, json!({"success": false, "error": error}));
    }

    fn put_object_at(&self, url: &str, bytes: &[u8]) {
        self.objects.lock().unwrap().insert(url.to_string(), bytes.to_vec());
    }

    fn paths(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.path.clone())
            .collect()
    }

    fn called(&self, path: &str) -> bool {
        self.paths().iter().any(|p| p == path)
    }

    fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let path: String = request.path.clone();
        self.requests.lock().unwrap().push(request);
        let scripted: Option<ApiResponse> = self.responses.lock().unwrap().get(&path).cloned();
        Ok(scripted.unwrap_or_else(|| ApiResponse::json(200, &json!({"success": true}))))
    }

    async fn put_object(
        &self,
        url: &str,
        _content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<u16, ClientError> {
        self.put_count.fetch_add(1, Ordering::Relaxed);
        self.objects.lock().unwrap().insert(url.to_string(), bytes);
        Ok(200)
    }

    async fn get_object(&self, url: &str) -> Result<Vec<u8>, ClientError> {
        self.objects
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| ClientError::Http {
                path: url.to_string(),
                status: 404,
                body: String::new(),
            })
    }
}

#[derive(Debug, Default)]
struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    fn all(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<Notification> {
        self.all()
            .into_iter()
            .filter(|n| n.level == NotificationLevel::Error)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

#[derive(Debug, Default)]
struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    fn routes(&self) -> Vec<Route> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.routes.lock().unwrap().push(route);
    }
}

struct Harness {
    transport: Arc<MockTransport>,
    notifier: Arc<RecordingNotifier>,
    navigator: Arc<RecordingNavigator>,
    orchestrator: Orchestrator<MockTransport>,
}

/// Session storage whose removals always fail.
#[derive(Default)]
struct StuckSessionStore {
    inner: MemorySessionStore,
}

impl SessionStore for StuckSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.inner.set(key, value)
    }

    fn remove(&self, _key: &str) -> Result<(), ClientError> {
        Err(ClientError::Session {
            message: "disk is read-only".into(),
        })
    }
}

fn harness() -> Harness {
    harness_with_identity(SessionIdentity::in_memory())
}

fn harness_with_identity(identity: SessionIdentity) -> Harness {
    let transport: Arc<MockTransport> = Arc::new(MockTransport::default());
    let notifier: Arc<RecordingNotifier> = Arc::new(RecordingNotifier::default());
    let navigator: Arc<RecordingNavigator> = Arc::new(RecordingNavigator::default());
    let backend: Backend<MockTransport> = Backend::new(Arc::clone(&transport), identity);
    let orchestrator: Orchestrator<MockTransport> = Orchestrator::builder(backend)
        .notifier(notifier.clone())
        .navigator(navigator.clone())
        .build();
    Harness {
        transport,
        notifier,
        navigator,
        orchestrator,
    }
}

fn signed_urls_for(names: &[&str]) -> Value {
    let results: Vec<Value> = names
        .iter()
        .map(|n| json!({"filename": n, "url": format!("https://store/{}", n)}))
        .collect();
    json!({"success": true, "results": results})
}

fn images(names: &[&str]) -> Vec<UploadFile> {
    names
        .iter()
        .map(|n| UploadFile::new(*n, n.as_bytes().to_vec()))
        .collect()
}

/// Assert that exactly `expected` were invalidated, once each.
fn assert_invalidated(orchestrator: &Orchestrator<MockTransport>, expected: &[QueryKey]) {
    let expected: HashSet<QueryKey> = expected.iter().copied().collect();
    for key in QueryKey::ALL {
        let count: u64 = orchestrator.cache().invalidation_count(key);
        if expected.contains(&key) {
            assert_eq!(count, 1, "{} should be invalidated once", key);
        } else {
            assert_eq!(count, 0, "{} should not be invalidated", key);
        }
    }
}

// ============================================================================
// Image and mask upload
// ============================================================================

#[tokio::test]
async fn test_image_upload_runs_every_step() {
    let h = harness();
    h.transport
        .respond("/generate-signed-upload-url", 200, signed_urls_for(&["img_1.png", "img_2.png"]));

    h.orchestrator
        .upload_images(images(&["img_2.png", "img_1.png"]))
        .await
        .unwrap();

    assert_eq!(
        h.transport.paths(),
        vec![
            "/generate-signed-upload-url",
            "/gcs/transfer_images_to_backend",
            "/resize-uploaded-images",
            "/gcs/transfer_resized_original_images_to_gcs",
            "/stratification_data_file/delete",
        ]
    );
    assert_eq!(h.transport.put_count.load(Ordering::Relaxed), 2);
    assert_invalidated(
        &h.orchestrator,
        &[
            QueryKey::ImageNames,
            QueryKey::Metadata,
            QueryKey::ImageUploadStatus,
            QueryKey::ImageMaskBalanceStatus,
            QueryKey::StratificationFileName,
            QueryKey::StratifiedSplitParameters,
        ],
    );
    assert_eq!(h.orchestrator.config().get().image_type, "image/png");
    assert!(!h.orchestrator.flags().is_set(StatusFlag::ImageIsUploading));
    assert_eq!(h.notifier.all().last().unwrap().level, NotificationLevel::Success);
}

#[tokio::test]
async fn test_failed_transfer_never_resizes() {
    let h = harness();
    h.transport
        .respond("/generate-signed-upload-url", 200, signed_urls_for(&["a.png"]));
    h.transport.fail("/gcs/transfer_images_to_backend", "bucket empty");

    let err: OrchestrationError = h
        .orchestrator
        .upload_images(images(&["a.png"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::StepFailed);
    assert_eq!(err.title, "Transfer Failed");
    assert!(!h.transport.called("/resize-uploaded-images"));
    assert!(!h.orchestrator.flags().is_set(StatusFlag::ImageIsUploading));
    assert_invalidated(&h.orchestrator, &[]);
    assert_eq!(h.notifier.errors()[0].title, "Transfer Failed");
}

#[tokio::test]
async fn test_partial_object_upload_stops_flow() {
    let h = harness();
    // URL for one file of two.
    h.transport
        .respond("/generate-signed-upload-url", 200, signed_urls_for(&["a.png"]));

    let err: OrchestrationError = h
        .orchestrator
        .upload_images(images(&["a.png", "b.png"]))
        .await
        .unwrap_err();

    assert_eq!(err.title, "Upload Failed");
    assert!(err.message.contains("b.png"));
    assert_eq!(h.transport.put_count.load(Ordering::Relaxed), 1);
    assert!(!h.transport.called("/gcs/transfer_images_to_backend"));
}

#[tokio::test]
async fn test_invalid_selection_never_reaches_network() {
    let h = harness();

    let err: OrchestrationError = h
        .orchestrator
        .upload_images(images(&["a.png", "notes.txt"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(err.title, "Invalid File Format");

    let err: OrchestrationError = h.orchestrator.upload_masks(Vec::new()).await.unwrap_err();
    assert_eq!(err.title, "No File Selected");

    assert!(h.transport.requests().is_empty());
    assert_eq!(h.notifier.errors().len(), 2);
}

#[tokio::test]
async fn test_stratification_cleanup_failure_is_not_fatal_for_masks() {
    let h = harness();
    h.transport
        .respond("/generate-signed-upload-url", 200, signed_urls_for(&["m.png"]));
    h.transport.fail("/stratification_data_file/delete", "no file");

    h.orchestrator.upload_masks(images(&["m.png"])).await.unwrap();

    assert_eq!(
        h.transport.paths(),
        vec![
            "/generate-signed-upload-url",
            "/gcs/transfer_masks_to_backend",
            "/stratification_data_file/delete",
        ]
    );
    assert_invalidated(
        &h.orchestrator,
        &[
            QueryKey::MaskNames,
            QueryKey::Metadata,
            QueryKey::MaskUploadStatus,
            QueryKey::ImageMaskBalanceStatus,
            QueryKey::StratificationFileName,
            QueryKey::StratifiedSplitParameters,
        ],
    );
    assert_eq!(h.notifier.errors().len(), 1);
}

#[tokio::test]
async fn test_busy_upload_is_rejected() {
    let h = harness();
    let _held = h
        .orchestrator
        .locks()
        .try_acquire(OperationKey::ImageUpload)
        .unwrap();

    let err: OrchestrationError = h
        .orchestrator
        .upload_images(images(&["a.png"]))
        .await
        .unwrap_err();

    assert!(err.is_busy());
    assert!(h.transport.requests().is_empty());
    assert!(!h.orchestrator.flags().is_set(StatusFlag::ImageIsUploading));
}

#[tokio::test]
async fn test_stratification_upload_stores_parameters() {
    let h = harness();
    h.transport.respond(
        "/upload/backend/stratification_file",
        200,
        json!({"success": true, "results": ["area", "perimeter"]}),
    );

    let parameters: Vec<String> = h
        .orchestrator
        .upload_stratification_file(UploadFile::new("features.csv", b"name,area".to_vec()))
        .await
        .unwrap();

    assert_eq!(parameters, vec!["area".to_string(), "perimeter".to_string()]);
    assert_eq!(h.orchestrator.config().get().split_parameters, parameters);
    assert_invalidated(
        &h.orchestrator,
        &[QueryKey::StratificationFileName, QueryKey::StratifiedSplitParameters],
    );

    let err: OrchestrationError = h
        .orchestrator
        .upload_stratification_file(UploadFile::new("features.xlsx", Vec::new()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn test_start_session_stops_at_bucket_failure() {
    let h = harness();
    h.transport.fail("/gcs/create_bucket", "credit exhausted");

    let err: OrchestrationError = h.orchestrator.start_session().await.unwrap_err();

    assert_eq!(err.title, "GCS Bucket Creation");
    assert!(!h.transport.called("/project_directories/create"));
    assert!(h.navigator.routes().is_empty());
}

#[tokio::test]
async fn test_start_session_navigates_to_upload() {
    let h = harness();

    h.orchestrator.start_session().await.unwrap();

    assert_eq!(
        h.transport.paths(),
        vec!["/gcs/create_bucket", "/project_directories/create"]
    );
    assert_eq!(h.navigator.routes(), vec![Route::ImageUpload]);
    assert_invalidated(&h.orchestrator, &[QueryKey::BackendIsRunning]);
}

#[tokio::test]
async fn test_end_session_survives_stratification_failure() {
    let h = harness();
    let session_id: String = h.orchestrator.backend().identity().session_id().unwrap();
    h.orchestrator.config().dispatch(ConfigUpdate::Crop(true));
    h.transport.fail("/stratification_data_file/delete", "no such file");

    h.orchestrator.end_session().await.unwrap();

    let requests: Vec<ApiRequest> = h.transport.requests();
    let steps: Vec<(HttpMethod, &str)> = requests
        .iter()
        .map(|r| (r.method, r.path.as_str()))
        .collect();
    assert_eq!(
        steps,
        vec![
            (HttpMethod::Delete, "/gcs/delete_bucket"),
            (HttpMethod::Delete, "/stratification_data_file/delete"),
            (HttpMethod::Delete, "/project_directories/delete"),
            (HttpMethod::Post, "/session/clear_session"),
        ]
    );
    assert_eq!(*h.orchestrator.config().get(), AugConfig::default());
    assert!(!h.orchestrator.flags().get().any_active());
    assert_ne!(
        h.orchestrator.backend().identity().session_id().unwrap(),
        session_id
    );
    assert_eq!(h.navigator.routes(), vec![Route::Welcome]);
    assert_invalidated(&h.orchestrator, &SESSION_KEYS);

    // The stratification failure was surfaced, then the overall success.
    let notifications: Vec<Notification> = h.notifier.all();
    assert_eq!(notifications.len(), 2);
    assert_eq!(notifications[0].level, NotificationLevel::Error);
    assert_eq!(notifications[1].level, NotificationLevel::Success);
}

#[tokio::test]
async fn test_end_session_keeps_state_when_bucket_deletion_fails() {
    let h = harness();
    let session_id: String = h.orchestrator.backend().identity().session_id().unwrap();
    h.orchestrator.config().dispatch(ConfigUpdate::Seed(7));
    h.transport.fail("/gcs/delete_bucket", "permission denied");

    let err: OrchestrationError = h.orchestrator.end_session().await.unwrap_err();

    assert_eq!(err.title, "Bucket Deletion Failed");
    assert_eq!(h.transport.paths(), vec!["/gcs/delete_bucket"]);
    assert_eq!(h.orchestrator.config().get().seed, 7);
    assert_eq!(
        h.orchestrator.backend().identity().session_id().unwrap(),
        session_id
    );
    assert!(!h.orchestrator.flags().is_set(StatusFlag::IsShuttingDown));
    assert!(h.navigator.routes().is_empty());
}

#[tokio::test]
async fn test_end_session_keeps_state_when_session_id_cannot_be_removed() {
    let h = harness_with_identity(SessionIdentity::new(Arc::new(StuckSessionStore::default())));
    let session_id: String = h.orchestrator.backend().identity().session_id().unwrap();
    h.orchestrator.config().dispatch(ConfigUpdate::Seed(11));

    let err: OrchestrationError = h.orchestrator.end_session().await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Client);
    assert_eq!(h.orchestrator.config().get().seed, 11);
    assert_eq!(
        h.orchestrator.backend().identity().session_id().unwrap(),
        session_id
    );
    assert!(h.navigator.routes().is_empty());
    assert_invalidated(&h.orchestrator, &[]);
}

#[tokio::test]
async fn test_reset_session_keeps_identity() {
    let h = harness();
    let session_id: String = h.orchestrator.backend().identity().session_id().unwrap();
    h.orchestrator.config().dispatch(ConfigUpdate::Seed(9));

    h.orchestrator.reset_session().await.unwrap();

    assert_eq!(h.transport.paths(), vec!["/reset_session"]);
    assert_eq!(h.orchestrator.config().get().seed, 42);
    assert_eq!(
        h.orchestrator.backend().identity().session_id().unwrap(),
        session_id
    );
    assert_eq!(h.navigator.routes(), vec![Route::ImageUpload]);
    assert_invalidated(&h.orchestrator, &SESSION_KEYS);
}

// ============================================================================
// Deletion
// ============================================================================

#[tokio::test]
async fn test_failed_image_deletion_never_recreates() {
    let h = harness();
    h.transport.fail("/project_directory/images/delete", "busy");

    let err: OrchestrationError = h.orchestrator.delete_images().await.unwrap_err();

    assert_eq!(err.title, "Image Deletion Failed");
    assert!(!h.transport.called("/project_directory/images/create"));
    assert!(!h.orchestrator.flags().is_set(StatusFlag::DeletingImages));
    assert_invalidated(&h.orchestrator, &[]);
}

#[tokio::test]
async fn test_image_deletion_steps_and_keys() {
    let h = harness();

    h.orchestrator.delete_images().await.unwrap();

    let requests: Vec<ApiRequest> = h.transport.requests();
    let steps: Vec<(HttpMethod, &str)> = requests
        .iter()
        .map(|r| (r.method, r.path.as_str()))
        .collect();
    assert_eq!(
        steps,
        vec![
            (HttpMethod::Delete, "/project_directory/images/delete"),
            (HttpMethod::Post, "/project_directory/images/create"),
            (HttpMethod::Delete, "/gcs/resized_original_images/delete"),
            (HttpMethod::Post, "/reset-signed-urls-for-resized-images-and-masks"),
        ]
    );
    assert_invalidated(
        &h.orchestrator,
        &[
            QueryKey::ImageNames,
            QueryKey::Metadata,
            QueryKey::ImageUploadStatus,
            QueryKey::ImageMaskBalanceStatus,
        ],
    );
}

#[tokio::test]
async fn test_mask_deletion_keys() {
    let h = harness();

    h.orchestrator.delete_masks().await.unwrap();

    assert!(h.transport.called("/gcs/resized_original_masks/delete"));
    assert_invalidated(
        &h.orchestrator,
        &[
            QueryKey::MaskNames,
            QueryKey::Metadata,
            QueryKey::MaskUploadStatus,
            QueryKey::ImageMaskBalanceStatus,
        ],
    );
}

#[tokio::test]
async fn test_stratification_deletion_clears_parameter_on_failure() {
    let h = harness();
    h.orchestrator
        .config()
        .dispatch(ConfigUpdate::SplitParameter("area".to_string()));
    h.transport.fail("/stratification_data_file/delete", "missing");

    assert!(h.orchestrator.delete_stratification_file().await.is_err());

    assert_eq!(h.orchestrator.config().get().split_parameter, "");
    assert!(!h.orchestrator.flags().is_set(StatusFlag::DeletingStratDataFile));
    assert_invalidated(&h.orchestrator, &[]);
}

// ============================================================================
// Augmentation
// ============================================================================

#[tokio::test]
async fn test_augmentation_publishes_results() {
    let h = harness();

    h.orchestrator.run_augmentation().await.unwrap();

    assert_eq!(
        h.transport.paths(),
        vec![
            "/augment",
            "/gcs/transfer_augmented_zip_to_gcs",
            "/gcs/transfer_resized_augmented_data_to_gcs",
            "/reset-signed-urls-for-resized-train-val-test-sets",
        ]
    );
    assert_invalidated(
        &h.orchestrator,
        &[
            QueryKey::AugmentationIsComplete,
            QueryKey::TrainingSet,
            QueryKey::ValidationSet,
            QueryKey::TestingSet,
        ],
    );
    assert!(!h.orchestrator.flags().is_set(StatusFlag::AugmentationIsRunning));
}

#[tokio::test]
async fn test_stratified_split_failure_has_its_own_kind() {
    let h = harness();
    h.transport.respond(
        "/augment",
        500,
        json!({
            "success": false,
            "error": "The least populated class has only 1 member",
            "errorType": "StratifiedSplitError"
        }),
    );

    let err: OrchestrationError = h.orchestrator.run_augmentation().await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::StratifiedSplit);
    assert_eq!(err.title, "Stratified Split Failed");
    assert!(err.message.contains("least populated class"));
    assert_eq!(h.transport.paths(), vec!["/augment"]);
}

#[tokio::test]
async fn test_generic_augmentation_failure() {
    let h = harness();
    h.transport.fail("/augment", "out of memory");

    let err: OrchestrationError = h.orchestrator.run_augmentation().await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::StepFailed);
    assert_eq!(err.title, "Augmentation Failed");
    assert!(!h.transport.called("/gcs/transfer_augmented_zip_to_gcs"));
}

// ============================================================================
// Download
// ============================================================================

#[tokio::test]
async fn test_download_saves_every_file() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    h.transport.respond(
        "/generate-signed-download-url",
        200,
        json!({"success": true, "results": [
            {"filename": "augmented.zip", "url": "https://store/augmented.zip"}
        ]}),
    );
    h.transport.put_object_at("https://store/augmented.zip", b"PK");

    let saved = h
        .orchestrator
        .download_results(&["augmented.zip".to_string()], dir.path())
        .await
        .unwrap();

    assert_eq!(saved, vec![dir.path().join("augmented.zip")]);
    assert_eq!(std::fs::read(&saved[0]).unwrap(), b"PK");
    assert!(!h.orchestrator.flags().is_set(StatusFlag::IsDownloading));
}

#[tokio::test]
async fn test_download_without_urls_fails() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    h.transport.respond(
        "/generate-signed-download-url",
        200,
        json!({"success": true, "results": []}),
    );

    let err: OrchestrationError = h
        .orchestrator
        .download_results(&["augmented.zip".to_string()], dir.path())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::StepFailed);
    assert!(err.message.contains("No signed URLs found"));
}

// ============================================================================
// Cached queries
// ============================================================================

#[tokio::test]
async fn test_names_are_cached_until_upload_invalidates() {
    let h = harness();
    h.transport.respond(
        "/upload/backend/image_names",
        200,
        json!({"count": 1, "results": ["a.png"]}),
    );
    h.transport
        .respond("/generate-signed-upload-url", 200, signed_urls_for(&["b.png"]));
    let queries = h.orchestrator.queries();

    assert_eq!(queries.image_names().await.unwrap(), vec!["a.png".to_string()]);
    queries.image_names().await.unwrap();
    let name_reads = || {
        h.transport
            .paths()
            .iter()
            .filter(|p| p.as_str() == "/upload/backend/image_names")
            .count()
    };
    assert_eq!(name_reads(), 1);

    h.orchestrator.upload_images(images(&["b.png"])).await.unwrap();
    queries.image_names().await.unwrap();
    assert_eq!(name_reads(), 2);
}

#[tokio::test]
async fn test_split_set_pages_are_requested_by_page() {
    let h = harness();
    h.transport.respond(
        "/metadata/val_images_masks",
        200,
        json!({"count": 0, "next": null, "previous": null, "results": []}),
    );

    let page = h
        .orchestrator
        .queries()
        .split_set(morph_split_model::Split::Val, 2)
        .await
        .unwrap();

    assert!(!page.has_next());
    let request: ApiRequest = h.transport.requests().remove(0);
    assert_eq!(request.query_value("page"), Some("2"));
    assert_eq!(request.query_value("page_size"), Some("10"));
}
