//! Session and transfer orchestration for Morph & Split.
//!
//! This crate composes the remote action client into the user-visible
//! operations of the augmentation front-end:
//!
//! - **Session** - Start, end and reset a working session
//! - **Uploads** - Images, masks and the stratification file
//! - **Augmentation** - Submit the configuration and publish the results
//! - **Deletion** - Remove uploads and their resized previews
//! - **Download** - Fetch results through signed URLs
//!
//! Each flow is a forward-only sequence of remote steps that stops at the
//! first failure. Flows share explicit state handles: the [`ConfigStore`],
//! the [`StatusFlagsStore`] and the [`QueryCache`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use morph_split_orchestrator::Orchestrator;
//! use morph_split_storage::{Backend, ClientSettings, HttpTransport, SessionIdentity};
//!
//! async fn start() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = Arc::new(HttpTransport::new(&ClientSettings::default())?);
//!     let backend = Backend::new(transport, SessionIdentity::in_memory());
//!     let orchestrator = Orchestrator::new(backend);
//!
//!     orchestrator.start_session().await?;
//!     orchestrator.run_augmentation().await?;
//!     Ok(())
//! }
//! ```

mod cache;
mod effects;
mod error;
mod flows;
mod locks;
mod orchestrator;
mod queries;
mod step;
mod stores;

pub use cache::{CacheSettings, QueryCache, QueryKey, DEFAULT_PAGE_CAPACITY};
pub use effects::{
    Navigator, NoopNavigator, Notification, NotificationLevel, Notifier, Route, TracingNotifier,
};
pub use error::{ErrorKind, OrchestrationError};
pub use locks::{OperationKey, OperationLocks, OperationPermit};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, SESSION_KEYS};
pub use queries::{split_set_key, Queries, StatusCheck, PAGE_SIZE};
pub use stores::{ConfigStore, FlagGuard, StatusFlagsStore};
