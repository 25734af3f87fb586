//! State directory shared between CLI invocations.
//!
//! Holds the session id document written by the storage crate and the
//! augmentation configuration, saved as `config.json` after every command.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use morph_split_model::AugConfig;
use morph_split_orchestrator::{ConfigStore, Orchestrator};
use morph_split_storage::{
    Backend, ClientSettings, FileSessionStore, HttpTransport, SessionIdentity, SessionStore,
};
use tracing::debug;

use crate::error::CommandError;
use crate::notify::{ConsoleNavigator, ConsoleNotifier};

/// File name of the persisted configuration.
pub const CONFIG_FILE: &str = "config.json";

const APP_DIR: &str = "morph-split";

/// Directory holding the session id and the configuration.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The platform's local data directory, falling back to the working directory.
    pub fn default_location() -> Self {
        let base: PathBuf = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join(APP_DIR))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Load the saved configuration, or the defaults when none was saved.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_config(&self) -> Result<AugConfig, CommandError> {
        let path: PathBuf = self.config_path();
        match fs::read(&path) {
            Ok(bytes) => {
                let config: AugConfig = serde_json::from_slice(&bytes).map_err(|e| {
                    CommandError::io_error(format!("{}: {}", path.display(), e))
                })?;
                Ok(config)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(AugConfig::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the configuration through a temporary file renamed into place.
    pub fn save_config(&self, config: &AugConfig) -> Result<(), CommandError> {
        fs::create_dir_all(&self.root)?;
        let path: PathBuf = self.config_path();
        let tmp: PathBuf = path.with_extension("json.tmp");
        let bytes: Vec<u8> = serde_json::to_vec_pretty(config)?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Remove the saved configuration. Missing files are fine.
    pub fn remove_config(&self) -> Result<(), CommandError> {
        match fs::remove_file(self.config_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Wire an orchestrator onto this directory and the given backend.
    ///
    /// # Arguments
    /// * `settings` - Backend connection settings
    ///
    /// # Errors
    /// Fails when the HTTP client cannot be built, the directory cannot be
    /// created, or the saved configuration is unreadable.
    pub fn open(&self, settings: &ClientSettings) -> Result<Context, CommandError> {
        let transport: Arc<HttpTransport> = Arc::new(HttpTransport::new(settings)?);
        let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(&self.root)?);
        let backend: Backend<HttpTransport> = Backend::new(transport, SessionIdentity::new(store));
        let config: Arc<ConfigStore> = Arc::new(ConfigStore::with_config(self.load_config()?));

        let orchestrator: Orchestrator<HttpTransport> = Orchestrator::builder(backend)
            .config_store(config)
            .notifier(Arc::new(ConsoleNotifier))
            .navigator(Arc::new(ConsoleNavigator))
            .build();
        debug!(state_dir = %self.root().display(), base_url = %settings.base_url, "Opened state");

        Ok(Context {
            state: self.clone(),
            orchestrator,
        })
    }
}

/// Everything a command needs.
pub struct Context {
    pub state: StateDir,
    pub orchestrator: Orchestrator<HttpTransport>,
}

impl Context {
    /// Save the current configuration back to the state directory.
    pub fn persist_config(&self) -> Result<(), CommandError> {
        let config: Arc<AugConfig> = self.orchestrator.config().get();
        self.state.save_config(&config)
    }
}
