//! The [`Orchestrator`]: every handle a flow needs, passed in explicitly.

use std::sync::Arc;

use morph_split_storage::{Backend, Transport};
use tracing::warn;

use crate::cache::{CacheSettings, QueryCache, QueryKey};
use crate::effects::{Navigator, NoopNavigator, Notification, Notifier, TracingNotifier};
use crate::error::OrchestrationError;
use crate::locks::OperationLocks;
use crate::queries::Queries;
use crate::stores::{ConfigStore, StatusFlagsStore};

/// Keys whose truth changes when a whole session is torn down or reset.
pub const SESSION_KEYS: [QueryKey; 12] = [
    QueryKey::ImageNames,
    QueryKey::MaskNames,
    QueryKey::Metadata,
    QueryKey::AugmentationIsComplete,
    QueryKey::ImageUploadStatus,
    QueryKey::MaskUploadStatus,
    QueryKey::ImageMaskBalanceStatus,
    QueryKey::StratificationFileName,
    QueryKey::StratifiedSplitParameters,
    QueryKey::TrainingSet,
    QueryKey::ValidationSet,
    QueryKey::TestingSet,
];

/// Runs the multi-step flows against one backend.
///
/// Stores, cache and effect handlers are shared handles, so the caller keeps
/// reading the same state the flows write.
pub struct Orchestrator<T: Transport> {
    pub(crate) backend: Backend<T>,
    pub(crate) config: Arc<ConfigStore>,
    pub(crate) flags: Arc<StatusFlagsStore>,
    pub(crate) cache: Arc<QueryCache>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) navigator: Arc<dyn Navigator>,
    pub(crate) locks: OperationLocks,
}

impl<T: Transport> Orchestrator<T> {
    /// Orchestrator with fresh stores, a default cache and logging effects.
    pub fn new(backend: Backend<T>) -> Self {
        OrchestratorBuilder::new(backend).build()
    }

    pub fn builder(backend: Backend<T>) -> OrchestratorBuilder<T> {
        OrchestratorBuilder::new(backend)
    }

    pub fn backend(&self) -> &Backend<T> {
        &self.backend
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn flags(&self) -> &Arc<StatusFlagsStore> {
        &self.flags
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn locks(&self) -> &OperationLocks {
        &self.locks
    }

    /// Cached reads sharing this orchestrator's cache.
    pub fn queries(&self) -> Queries<T> {
        Queries::new(self.backend.clone(), Arc::clone(&self.cache))
    }

    /// Notify the outcome of a flow and hand the result back.
    pub(crate) fn report<R>(
        &self,
        result: Result<R, OrchestrationError>,
        title: &str,
        message: &str,
    ) -> Result<R, OrchestrationError> {
        match &result {
            Ok(_) => self.notifier.notify(Notification::success(title, message)),
            Err(err) => self
                .notifier
                .notify(Notification::error(err.title.clone(), err.message.clone())),
        }
        result
    }

    /// Surface a failed best-effort step without stopping the flow.
    pub(crate) fn report_non_fatal(&self, flow: &str, err: &OrchestrationError) {
        warn!(flow, error = %err, "Non-fatal step failed");
        self.notifier
            .notify(Notification::error(err.title.clone(), err.message.clone()));
    }
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder<T: Transport> {
    backend: Backend<T>,
    config: Option<Arc<ConfigStore>>,
    flags: Option<Arc<StatusFlagsStore>>,
    cache: Option<Arc<QueryCache>>,
    notifier: Option<Arc<dyn Notifier>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl<T: Transport> OrchestratorBuilder<T> {
    pub fn new(backend: Backend<T>) -> Self {
        Self {
            backend,
            config: None,
            flags: None,
            cache: None,
            notifier: None,
            navigator: None,
        }
    }

    pub fn config_store(mut self, config: Arc<ConfigStore>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn flags_store(mut self, flags: Arc<StatusFlagsStore>) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache_settings(self, settings: CacheSettings) -> Self {
        self.cache(Arc::new(QueryCache::new(settings)))
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn build(self) -> Orchestrator<T> {
        Orchestrator {
            backend: self.backend,
            config: self.config.unwrap_or_default(),
            flags: self.flags.unwrap_or_default(),
            cache: self.cache.unwrap_or_default(),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
            navigator: self.navigator.unwrap_or_else(|| Arc::new(NoopNavigator)),
            locks: OperationLocks::new(),
        }
    }
}
