//! The augmentation configuration record.
//!
//! `AugConfig` holds every parameter the user picks before an augmentation
//! run. It is serialized with camelCase keys because the backend reads the
//! JSON verbatim. Updates go through [`ConfigUpdate`], one variant per field,
//! so a field can only ever be replaced by a value of its own type.

use std::fmt;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::ratios::{redistribute, Split, SplitLocks, SplitRatios};

/// Crop window applied before augmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropDimension {
    pub offset_height: u32,
    pub offset_width: u32,
    pub target_height: u32,
    pub target_width: u32,
}

impl Default for CropDimension {
    fn default() -> Self {
        Self {
            offset_height: 0,
            offset_width: 0,
            target_height: 128,
            target_width: 128,
        }
    }
}

/// Output size of augmented images when resizing is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimension {
    pub width: u32,
    pub height: u32,
}

impl Default for ImageDimension {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
        }
    }
}

/// Channel counts of the images and their masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMaskChannels {
    pub img_channels: u8,
    pub mask_channels: u8,
}

impl Default for ImageMaskChannels {
    fn default() -> Self {
        Self {
            img_channels: 3,
            mask_channels: 3,
        }
    }
}

/// Local reference to the stratification CSV.
///
/// This never goes into the backend payload; the file itself is sent as a
/// separate multipart part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratificationDataFile {
    pub name: String,
    pub path: PathBuf,
}

impl StratificationDataFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        let name: String = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, path }
    }
}

/// Shape and texture features available for stratified splitting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisualAttributes {
    pub eccentricity: bool,
    pub equivalent_diameter: bool,
    pub feret_diameter_max: bool,
    pub filled_area: bool,
    pub perimeter: bool,
    pub roundness: bool,
    pub l: bool,
    pub a: bool,
    pub b: bool,
    pub contrast: bool,
    pub correlation: bool,
    pub energy: bool,
}

/// Names one of the [`VisualAttributes`] flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualAttribute {
    Eccentricity,
    EquivalentDiameter,
    FeretDiameterMax,
    FilledArea,
    Perimeter,
    Roundness,
    L,
    A,
    B,
    Contrast,
    Correlation,
    Energy,
}

impl VisualAttribute {
    pub const ALL: [VisualAttribute; 12] = [
        VisualAttribute::Eccentricity,
        VisualAttribute::EquivalentDiameter,
        VisualAttribute::FeretDiameterMax,
        VisualAttribute::FilledArea,
        VisualAttribute::Perimeter,
        VisualAttribute::Roundness,
        VisualAttribute::L,
        VisualAttribute::A,
        VisualAttribute::B,
        VisualAttribute::Contrast,
        VisualAttribute::Correlation,
        VisualAttribute::Energy,
    ];

    /// The camelCase key used in the serialized configuration.
    pub fn key(&self) -> &'static str {
        match self {
            VisualAttribute::Eccentricity => "eccentricity",
            VisualAttribute::EquivalentDiameter => "equivalentDiameter",
            VisualAttribute::FeretDiameterMax => "feretDiameterMax",
            VisualAttribute::FilledArea => "filledArea",
            VisualAttribute::Perimeter => "perimeter",
            VisualAttribute::Roundness => "roundness",
            VisualAttribute::L => "l",
            VisualAttribute::A => "a",
            VisualAttribute::B => "b",
            VisualAttribute::Contrast => "contrast",
            VisualAttribute::Correlation => "correlation",
            VisualAttribute::Energy => "energy",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|attr| attr.key() == key)
    }
}

impl VisualAttributes {
    pub fn get(&self, attribute: VisualAttribute) -> bool {
        *self.slot(attribute)
    }

    pub fn set(&mut self, attribute: VisualAttribute, enabled: bool) {
        *self.slot_mut(attribute) = enabled;
    }

    fn slot(&self, attribute: VisualAttribute) -> &bool {
        match attribute {
            VisualAttribute::Eccentricity => &self.eccentricity,
            VisualAttribute::EquivalentDiameter => &self.equivalent_diameter,
            VisualAttribute::FeretDiameterMax => &self.feret_diameter_max,
            VisualAttribute::FilledArea => &self.filled_area,
            VisualAttribute::Perimeter => &self.perimeter,
            VisualAttribute::Roundness => &self.roundness,
            VisualAttribute::L => &self.l,
            VisualAttribute::A => &self.a,
            VisualAttribute::B => &self.b,
            VisualAttribute::Contrast => &self.contrast,
            VisualAttribute::Correlation => &self.correlation,
            VisualAttribute::Energy => &self.energy,
        }
    }

    fn slot_mut(&mut self, attribute: VisualAttribute) -> &mut bool {
        match attribute {
            VisualAttribute::Eccentricity => &mut self.eccentricity,
            VisualAttribute::EquivalentDiameter => &mut self.equivalent_diameter,
            VisualAttribute::FeretDiameterMax => &mut self.feret_diameter_max,
            VisualAttribute::FilledArea => &mut self.filled_area,
            VisualAttribute::Perimeter => &mut self.perimeter,
            VisualAttribute::Roundness => &mut self.roundness,
            VisualAttribute::L => &mut self.l,
            VisualAttribute::A => &mut self.a,
            VisualAttribute::B => &mut self.b,
            VisualAttribute::Contrast => &mut self.contrast,
            VisualAttribute::Correlation => &mut self.correlation,
            VisualAttribute::Energy => &mut self.energy,
        }
    }
}

/// Everything the user configures for one augmentation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AugConfig {
    // Save and indexing
    /// Backend-side directory the augmented set is written to.
    pub save_directory: String,
    pub initial_train_save_id: u32,
    pub initial_val_save_id: u32,
    pub initial_test_save_id: u32,
    pub seed: u64,
    pub total_augmented_images: u32,

    // Geometry
    pub crop: bool,
    pub crop_dimension: CropDimension,
    pub resize_aug_image: bool,
    pub aug_image_dimension: ImageDimension,
    pub image_mask_channels: ImageMaskChannels,
    pub image_type: String,

    // Transformations
    pub augment_val_data: bool,
    pub random_crop: bool,
    pub flip_left_right: bool,
    pub flip_up_down: bool,
    pub random_rotate: bool,
    pub corrupt_brightness: bool,
    pub corrupt_contrast: bool,
    pub corrupt_saturation: bool,

    // Split
    pub train_ratio: f64,
    pub val_ratio: f64,
    pub test_ratio: f64,
    pub train_ratio_locked: bool,
    pub val_ratio_locked: bool,
    pub test_ratio_locked: bool,
    pub split_parameter: String,
    pub split_parameters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stratification_data_file: Option<StratificationDataFile>,
    #[serde(flatten)]
    pub visual_attributes: VisualAttributes,

    // Preview
    pub previewed_set: Split,
}

impl Default for AugConfig {
    fn default() -> Self {
        Self {
            save_directory: String::new(),
            initial_train_save_id: 1,
            initial_val_save_id: 1,
            initial_test_save_id: 1,
            seed: 42,
            total_augmented_images: 150,
            crop: false,
            crop_dimension: CropDimension::default(),
            resize_aug_image: false,
            aug_image_dimension: ImageDimension::default(),
            image_mask_channels: ImageMaskChannels::default(),
            image_type: String::new(),
            augment_val_data: false,
            random_crop: false,
            flip_left_right: false,
            flip_up_down: false,
            random_rotate: false,
            corrupt_brightness: false,
            corrupt_contrast: false,
            corrupt_saturation: false,
            train_ratio: 0.6,
            val_ratio: 0.2,
            test_ratio: 0.2,
            train_ratio_locked: false,
            val_ratio_locked: false,
            test_ratio_locked: false,
            split_parameter: String::new(),
            split_parameters: Vec::new(),
            stratification_data_file: None,
            visual_attributes: VisualAttributes::default(),
            previewed_set: Split::Train,
        }
    }
}

impl AugConfig {
    pub fn ratios(&self) -> SplitRatios {
        SplitRatios::new(self.train_ratio, self.val_ratio, self.test_ratio)
    }

    pub fn locks(&self) -> SplitLocks {
        SplitLocks {
            train: self.train_ratio_locked,
            val: self.val_ratio_locked,
            test: self.test_ratio_locked,
        }
    }

    /// Replace exactly the field named by `update`.
    pub fn apply(&mut self, update: ConfigUpdate) {
        match update {
            ConfigUpdate::SaveDirectory(v) => self.save_directory = v,
            ConfigUpdate::InitialTrainSaveId(v) => self.initial_train_save_id = v,
            ConfigUpdate::InitialValSaveId(v) => self.initial_val_save_id = v,
            ConfigUpdate::InitialTestSaveId(v) => self.initial_test_save_id = v,
            ConfigUpdate::Seed(v) => self.seed = v,
            ConfigUpdate::TotalAugmentedImages(v) => self.total_augmented_images = v,
            ConfigUpdate::Crop(v) => self.crop = v,
            ConfigUpdate::CropDimension(v) => self.crop_dimension = v,
            ConfigUpdate::ResizeAugImage(v) => self.resize_aug_image = v,
            ConfigUpdate::AugImageDimension(v) => self.aug_image_dimension = v,
            ConfigUpdate::ImageMaskChannels(v) => self.image_mask_channels = v,
            ConfigUpdate::ImageType(v) => self.image_type = v,
            ConfigUpdate::AugmentValData(v) => self.augment_val_data = v,
            ConfigUpdate::RandomCrop(v) => self.random_crop = v,
            ConfigUpdate::FlipLeftRight(v) => self.flip_left_right = v,
            ConfigUpdate::FlipUpDown(v) => self.flip_up_down = v,
            ConfigUpdate::RandomRotate(v) => self.random_rotate = v,
            ConfigUpdate::CorruptBrightness(v) => self.corrupt_brightness = v,
            ConfigUpdate::CorruptContrast(v) => self.corrupt_contrast = v,
            ConfigUpdate::CorruptSaturation(v) => self.corrupt_saturation = v,
            ConfigUpdate::TrainRatio(v) => self.train_ratio = v,
            ConfigUpdate::ValRatio(v) => self.val_ratio = v,
            ConfigUpdate::TestRatio(v) => self.test_ratio = v,
            ConfigUpdate::RatioLocked { split, locked } => match split {
                Split::Train => self.train_ratio_locked = locked,
                Split::Val => self.val_ratio_locked = locked,
                Split::Test => self.test_ratio_locked = locked,
            },
            ConfigUpdate::SplitParameter(v) => self.split_parameter = v,
            ConfigUpdate::SplitParameters(v) => self.split_parameters = v,
            ConfigUpdate::StratificationDataFile(v) => self.stratification_data_file = v,
            ConfigUpdate::VisualAttribute { attribute, enabled } => {
                self.visual_attributes.set(attribute, enabled)
            }
            ConfigUpdate::PreviewedSet(v) => self.previewed_set = v,
        }
    }

    /// Move one split ratio and redistribute the others.
    ///
    /// # Errors
    /// Returns the error from [`redistribute`] and leaves the config untouched.
    pub fn adjust_ratio(&mut self, split: Split, value: f64) -> Result<(), ConfigError> {
        let ratios: SplitRatios = redistribute(self.ratios(), self.locks(), split, value)?;
        self.train_ratio = ratios.train;
        self.val_ratio = ratios.val;
        self.test_ratio = ratios.test;
        Ok(())
    }

    /// JSON sent to the backend as the `config` form part.
    ///
    /// The local stratification file reference is left out.
    pub fn backend_payload(&self) -> Result<String, serde_json::Error> {
        let mut value: Value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove("stratificationDataFile");
        }
        serde_json::to_string(&value)
    }
}

/// A single-field replacement of [`AugConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigUpdate {
    SaveDirectory(String),
    InitialTrainSaveId(u32),
    InitialValSaveId(u32),
    InitialTestSaveId(u32),
    Seed(u64),
    TotalAugmentedImages(u32),
    Crop(bool),
    CropDimension(CropDimension),
    ResizeAugImage(bool),
    AugImageDimension(ImageDimension),
    ImageMaskChannels(ImageMaskChannels),
    ImageType(String),
    AugmentValData(bool),
    RandomCrop(bool),
    FlipLeftRight(bool),
    FlipUpDown(bool),
    RandomRotate(bool),
    CorruptBrightness(bool),
    CorruptContrast(bool),
    CorruptSaturation(bool),
    TrainRatio(f64),
    ValRatio(f64),
    TestRatio(f64),
    RatioLocked { split: Split, locked: bool },
    SplitParameter(String),
    SplitParameters(Vec<String>),
    StratificationDataFile(Option<StratificationDataFile>),
    VisualAttribute { attribute: VisualAttribute, enabled: bool },
    PreviewedSet(Split),
}

impl ConfigUpdate {
    /// Build an update from a camelCase field name and a JSON value.
    ///
    /// # Errors
    /// * `ConfigError::UnknownField` if `key` names no settable field
    /// * `ConfigError::InvalidValue` if `value` has the wrong shape for it
    pub fn parse(key: &str, value: Value) -> Result<Self, ConfigError> {
        if let Some(attribute) = VisualAttribute::from_key(key) {
            return Ok(ConfigUpdate::VisualAttribute {
                attribute,
                enabled: field(key, value)?,
            });
        }

        let update: ConfigUpdate = match key {
            "saveDirectory" => ConfigUpdate::SaveDirectory(field(key, value)?),
            "initialTrainSaveId" => ConfigUpdate::InitialTrainSaveId(field(key, value)?),
            "initialValSaveId" => ConfigUpdate::InitialValSaveId(field(key, value)?),
            "initialTestSaveId" => ConfigUpdate::InitialTestSaveId(field(key, value)?),
            "seed" => ConfigUpdate::Seed(field(key, value)?),
            "totalAugmentedImages" => ConfigUpdate::TotalAugmentedImages(field(key, value)?),
            "crop" => ConfigUpdate::Crop(field(key, value)?),
            "cropDimension" => ConfigUpdate::CropDimension(field(key, value)?),
            "resizeAugImage" => ConfigUpdate::ResizeAugImage(field(key, value)?),
            "augImageDimension" => ConfigUpdate::AugImageDimension(field(key, value)?),
            "imageMaskChannels" => ConfigUpdate::ImageMaskChannels(field(key, value)?),
            "imageType" => ConfigUpdate::ImageType(field(key, value)?),
            "augmentValData" => ConfigUpdate::AugmentValData(field(key, value)?),
            "randomCrop" => ConfigUpdate::RandomCrop(field(key, value)?),
            "flipLeftRight" => ConfigUpdate::FlipLeftRight(field(key, value)?),
            "flipUpDown" => ConfigUpdate::FlipUpDown(field(key, value)?),
            "randomRotate" => ConfigUpdate::RandomRotate(field(key, value)?),
            "corruptBrightness" => ConfigUpdate::CorruptBrightness(field(key, value)?),
            "corruptContrast" => ConfigUpdate::CorruptContrast(field(key, value)?),
            "corruptSaturation" => ConfigUpdate::CorruptSaturation(field(key, value)?),
            "trainRatio" => ConfigUpdate::TrainRatio(field(key, value)?),
            "valRatio" => ConfigUpdate::ValRatio(field(key, value)?),
            "testRatio" => ConfigUpdate::TestRatio(field(key, value)?),
            "trainRatioLocked" => ConfigUpdate::RatioLocked {
                split: Split::Train,
                locked: field(key, value)?,
            },
            "valRatioLocked" => ConfigUpdate::RatioLocked {
                split: Split::Val,
                locked: field(key, value)?,
            },
            "testRatioLocked" => ConfigUpdate::RatioLocked {
                split: Split::Test,
                locked: field(key, value)?,
            },
            "splitParameter" => ConfigUpdate::SplitParameter(field(key, value)?),
            "splitParameters" => ConfigUpdate::SplitParameters(field(key, value)?),
            "stratificationDataFile" => ConfigUpdate::StratificationDataFile(field(key, value)?),
            "previewedSet" => ConfigUpdate::PreviewedSet(field(key, value)?),
            other => return Err(ConfigError::UnknownField(other.to_string())),
        };
        Ok(update)
    }

    /// The camelCase name of the field this update replaces.
    pub fn key(&self) -> &'static str {
        match self {
            ConfigUpdate::SaveDirectory(_) => "saveDirectory",
            ConfigUpdate::InitialTrainSaveId(_) => "initialTrainSaveId",
            ConfigUpdate::InitialValSaveId(_) => "initialValSaveId",
            ConfigUpdate::InitialTestSaveId(_) => "initialTestSaveId",
            ConfigUpdate::Seed(_) => "seed",
            ConfigUpdate::TotalAugmentedImages(_) => "totalAugmentedImages",
            ConfigUpdate::Crop(_) => "crop",
            ConfigUpdate::CropDimension(_) => "cropDimension",
            ConfigUpdate::ResizeAugImage(_) => "resizeAugImage",
            ConfigUpdate::AugImageDimension(_) => "augImageDimension",
            ConfigUpdate::ImageMaskChannels(_) => "imageMaskChannels",
            ConfigUpdate::ImageType(_) => "imageType",
            ConfigUpdate::AugmentValData(_) => "augmentValData",
            ConfigUpdate::RandomCrop(_) => "randomCrop",
            ConfigUpdate::FlipLeftRight(_) => "flipLeftRight",
            ConfigUpdate::FlipUpDown(_) => "flipUpDown",
            ConfigUpdate::RandomRotate(_) => "randomRotate",
            ConfigUpdate::CorruptBrightness(_) => "corruptBrightness",
            ConfigUpdate::CorruptContrast(_) => "corruptContrast",
            ConfigUpdate::CorruptSaturation(_) => "corruptSaturation",
            ConfigUpdate::TrainRatio(_) => "trainRatio",
            ConfigUpdate::ValRatio(_) => "valRatio",
            ConfigUpdate::TestRatio(_) => "testRatio",
            ConfigUpdate::RatioLocked { split, .. } => match split {
                Split::Train => "trainRatioLocked",
                Split::Val => "valRatioLocked",
                Split::Test => "testRatioLocked",
            },
            ConfigUpdate::SplitParameter(_) => "splitParameter",
            ConfigUpdate::SplitParameters(_) => "splitParameters",
            ConfigUpdate::StratificationDataFile(_) => "stratificationDataFile",
            ConfigUpdate::VisualAttribute { attribute, .. } => attribute.key(),
            ConfigUpdate::PreviewedSet(_) => "previewedSet",
        }
    }
}

impl fmt::Display for ConfigUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

fn field<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, ConfigError> {
    serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
        field: key.to_string(),
        reason: e.to_string(),
    })
}
