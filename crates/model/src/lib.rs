//! Data model for the Morph & Split augmentation front-end.
//!
//! This crate holds everything the orchestration layers pass around, with no I/O:
//!
//! - `config` - The augmentation configuration record and its field-level updates
//! - `ratios` - Train/validation/test ratio redistribution with per-split locks
//! - `status` - In-flight status flags shown by the UI
//! - `response` - Backend response records, signed URLs, paginated collections
//! - `folders` - Object-store folder layout
//! - `files` - Client-side file validation and ordering

pub mod config;
pub mod error;
pub mod files;
pub mod folders;
pub mod ratios;
pub mod response;
pub mod status;

pub use config::{
    AugConfig, ConfigUpdate, CropDimension, ImageDimension, ImageMaskChannels,
    StratificationDataFile, VisualAttribute, VisualAttributes,
};
pub use error::{ConfigError, ValidationError};
pub use files::{
    content_type_for, file_extension, format_file_size, sort_by_name, validate_selection, FileKind,
};
pub use folders::BucketFolder;
pub use ratios::{redistribute, Split, SplitLocks, SplitRatios, RATIO_TOLERANCE};
pub use response::{
    BackendResponse, ErrorType, FetchResponse, ImageMaskPair, NamedUrl, SignedUrl, SignedUrls,
};
pub use status::{StatusFlag, StatusFlags};
