//! Object-store folder layout of a session bucket.

use std::fmt;

use crate::ratios::Split;

/// A folder (key prefix) inside the session's bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketFolder {
    /// Original uploaded images.
    Images,
    /// Original uploaded masks.
    Masks,
    /// Resized copies of the uploaded images, used for previews.
    ResizedImages,
    /// Resized copies of the uploaded masks.
    ResizedMasks,
    /// Resized augmented images of one split.
    AugmentedImages(Split),
    /// Resized augmented masks of one split.
    AugmentedMasks(Split),
}

impl BucketFolder {
    pub fn path(&self) -> String {
        match self {
            BucketFolder::Images => "images".to_string(),
            BucketFolder::Masks => "masks".to_string(),
            BucketFolder::ResizedImages => "resized_images".to_string(),
            BucketFolder::ResizedMasks => "resized_masks".to_string(),
            BucketFolder::AugmentedImages(split) => format!("resized_augmented/{}/images", split),
            BucketFolder::AugmentedMasks(split) => format!("resized_augmented/{}/masks", split),
        }
    }
}

impl fmt::Display for BucketFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_paths() {
        assert_eq!(BucketFolder::Images.path(), "images");
        assert_eq!(BucketFolder::ResizedMasks.path(), "resized_masks");
        assert_eq!(
            BucketFolder::AugmentedImages(Split::Val).path(),
            "resized_augmented/val/images"
        );
        assert_eq!(
            BucketFolder::AugmentedMasks(Split::Test).to_string(),
            "resized_augmented/test/masks"
        );
    }
}
