//! Subcommands and their handlers.
//!
//! Each handler drives one orchestrator operation and then saves the
//! configuration back to the state directory, except for `end` and `reset`
//! which remove it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Subcommand;
use morph_split_model::{
    format_file_size, AugConfig, ConfigUpdate, Split, StratificationDataFile,
};
use morph_split_orchestrator::{OrchestrationError, Queries, StatusCheck};
use morph_split_storage::{HttpTransport, UploadFile};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::CommandError;
use crate::state::Context;
use crate::types::{StatusLine, StatusReport};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the session bucket and project directories
    Start,
    /// Delete every remote resource of the session and forget it
    End,
    /// Clear remote data but keep the session
    Reset,
    /// Upload PNG or JPEG images
    UploadImages {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Upload PNG or JPEG masks
    UploadMasks {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Upload the CSV used for stratified splitting
    UploadStratFile { file: PathBuf },
    /// Delete uploaded images and their previews
    DeleteImages,
    /// Delete uploaded masks and their previews
    DeleteMasks,
    /// Delete the stratification file
    DeleteStratFile,
    /// Inspect or change the augmentation configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run the augmentation with the current configuration
    Augment,
    /// Download result files through signed URLs
    Download {
        #[arg(required = true)]
        filenames: Vec<String>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print backend, session, upload and augmentation status
    Status,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the configuration as JSON
    Show,
    /// Replace one field, e.g. `set seed 42` or `set cropDimension '{...}'`
    Set { key: String, value: String },
    /// Move one split ratio; unlocked splits absorb the difference
    Ratio { split: Split, value: f64 },
    /// Lock or unlock a split ratio
    Lock {
        split: Split,
        #[arg(action = clap::ArgAction::Set)]
        locked: bool,
    },
    /// Restore the defaults
    Reset,
}

impl Command {
    /// Run the command against `ctx`.
    ///
    /// # Errors
    /// Returns the first failure. Flow failures come back marked as
    /// already reported.
    pub async fn run(self, ctx: &Context) -> Result<(), CommandError> {
        match self {
            Command::Start => {
                ctx.orchestrator.start_session().await?;
                ctx.persist_config()
            }
            Command::End => {
                ctx.orchestrator.end_session().await?;
                ctx.state.remove_config()
            }
            Command::Reset => {
                ctx.orchestrator.reset_session().await?;
                ctx.state.remove_config()
            }
            Command::UploadImages { files } => {
                let files: Vec<UploadFile> = read_files(&files).await?;
                ctx.orchestrator.upload_images(files).await?;
                ctx.persist_config()
            }
            Command::UploadMasks { files } => {
                let files: Vec<UploadFile> = read_files(&files).await?;
                ctx.orchestrator.upload_masks(files).await?;
                ctx.persist_config()
            }
            Command::UploadStratFile { file } => upload_strat_file(ctx, &file).await,
            Command::DeleteImages => {
                ctx.orchestrator.delete_images().await?;
                ctx.persist_config()
            }
            Command::DeleteMasks => {
                ctx.orchestrator.delete_masks().await?;
                ctx.persist_config()
            }
            Command::DeleteStratFile => {
                let result: Result<(), OrchestrationError> =
                    ctx.orchestrator.delete_stratification_file().await;
                if result.is_ok() {
                    ctx.orchestrator
                        .config()
                        .dispatch(ConfigUpdate::StratificationDataFile(None));
                }
                // The split parameter is cleared even on failure.
                ctx.persist_config()?;
                result.map_err(Into::into)
            }
            Command::Config { action } => action.run(ctx),
            Command::Augment => {
                ctx.orchestrator.run_augmentation().await?;
                ctx.persist_config()
            }
            Command::Download { filenames, out } => {
                let saved: Vec<PathBuf> =
                    ctx.orchestrator.download_results(&filenames, &out).await?;
                for path in saved {
                    println!("{}", path.display());
                }
                Ok(())
            }
            Command::Status => print_status(ctx).await,
        }
    }
}

impl ConfigAction {
    fn run(self, ctx: &Context) -> Result<(), CommandError> {
        match self {
            ConfigAction::Show => {
                let config: Arc<AugConfig> = ctx.orchestrator.config().get();
                println!("{}", serde_json::to_string_pretty(config.as_ref())?);
                return Ok(());
            }
            ConfigAction::Set { key, value } => {
                let update: ConfigUpdate = ConfigUpdate::parse(&key, parse_value(&value))?;
                ctx.orchestrator.config().dispatch(update);
            }
            ConfigAction::Ratio { split, value } => {
                ctx.orchestrator.config().adjust_ratio(split, value)?;
                let config: Arc<AugConfig> = ctx.orchestrator.config().get();
                println!(
                    "train={:.2} val={:.2} test={:.2}",
                    config.train_ratio, config.val_ratio, config.test_ratio
                );
            }
            ConfigAction::Lock { split, locked } => {
                ctx.orchestrator
                    .config()
                    .dispatch(ConfigUpdate::RatioLocked { split, locked });
            }
            ConfigAction::Reset => ctx.orchestrator.config().reset(),
        }
        ctx.persist_config()
    }
}

/// Values that are not valid JSON are taken as plain strings, so
/// `set splitParameter area` works without quoting.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

async fn read_files(paths: &[PathBuf]) -> Result<Vec<UploadFile>, CommandError> {
    let mut files: Vec<UploadFile> = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(UploadFile::from_path(path).await?);
    }
    let total: u64 = files.iter().map(UploadFile::size).sum();
    debug!(count = files.len(), size = %format_file_size(total), "Read files for upload");
    Ok(files)
}

async fn upload_strat_file(ctx: &Context, path: &Path) -> Result<(), CommandError> {
    let file: UploadFile = UploadFile::from_path(path).await?;
    let parameters: Vec<String> = ctx.orchestrator.upload_stratification_file(file).await?;

    // The augmentation form re-reads the file from here.
    let absolute: PathBuf = std::fs::canonicalize(path)?;
    ctx.orchestrator
        .config()
        .dispatch(ConfigUpdate::StratificationDataFile(Some(
            StratificationDataFile::new(absolute),
        )));
    info!(count = parameters.len(), "Stratification parameters available");
    for parameter in &parameters {
        println!("{}", parameter);
    }
    ctx.persist_config()
}

async fn print_status(ctx: &Context) -> Result<(), CommandError> {
    let queries: Queries<HttpTransport> = ctx.orchestrator.queries();
    let mut checks: Vec<StatusLine> = Vec::with_capacity(StatusCheck::ALL.len());
    for check in StatusCheck::ALL {
        let line: StatusLine = match queries.status(check).await {
            Ok(response) => StatusLine::new(check, &response),
            Err(e) => StatusLine::unreachable(check, e),
        };
        checks.push(line);
    }
    let report: StatusReport = StatusReport::new(checks, &ctx.orchestrator.flags().get());
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
