//! Client-side checks on selected files.
//!
//! Everything here runs before any request is built, so a bad selection
//! never reaches the network.

use std::cmp::Ordering;

use crate::error::ValidationError;

/// What a selection is meant to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Images or masks (`png`, `jpg`, `jpeg`).
    Image,
    /// The stratification data table (`csv`).
    StratificationData,
}

impl FileKind {
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            FileKind::Image => &["png", "jpg", "jpeg"],
            FileKind::StratificationData => &["csv"],
        }
    }

    pub fn accepts(&self, filename: &str) -> bool {
        file_extension(filename)
            .map(|ext| self.allowed_extensions().contains(&ext.as_str()))
            .unwrap_or(false)
    }
}

/// Lowercased extension of `filename`, without the dot.
pub fn file_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// MIME type sent with an object-store upload.
pub fn content_type_for(filename: &str) -> &'static str {
    match file_extension(filename).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("csv") => "text/csv",
        _ => "application/octet-stream",
    }
}

/// Check a whole selection; the first offending file rejects all of it.
///
/// # Errors
/// * `ValidationError::NoFileSelected` for an empty selection
/// * `ValidationError::InvalidFileFormat` naming the first rejected file
pub fn validate_selection<S: AsRef<str>>(
    kind: FileKind,
    filenames: &[S],
) -> Result<(), ValidationError> {
    if filenames.is_empty() {
        return Err(ValidationError::NoFileSelected);
    }
    for name in filenames {
        let name: &str = name.as_ref();
        if !kind.accepts(name) {
            return Err(ValidationError::InvalidFileFormat {
                filename: name.to_string(),
                allowed: kind.allowed_extensions().join(", "),
            });
        }
    }
    Ok(())
}

/// Sort by name in natural order: the first run of digits compares
/// numerically, so `img_2` sorts before `img_10`.
pub fn sort_by_name<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> &str,
{
    items.sort_by(|a, b| natural_cmp(key(a), key(b)));
}

fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a: String = a.to_lowercase();
    let b: String = b.to_lowercase();

    if let (Some(na), Some(nb)) = (first_number(&a), first_number(&b)) {
        if na != nb {
            return na.cmp(&nb);
        }
    }
    a.cmp(&b)
}

fn first_number(s: &str) -> Option<u128> {
    let start: usize = s.find(|c: char| c.is_ascii_digit())?;
    let digits: &str = &s[start..];
    let end: usize = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().ok()
}

/// Human-readable size: bytes below 1 KiB, then KB, then MB.
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    if bytes < KB {
        format!("{} bytes", bytes)
    } else if bytes < MB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_and_content_type() {
        assert_eq!(file_extension("IMG_01.PNG").as_deref(), Some("png"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension(".hidden"), None);

        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("split.csv"), "text/csv");
        assert_eq!(content_type_for("a.tiff"), "application/octet-stream");
    }

    #[test]
    fn test_empty_selection_rejected() {
        let names: Vec<String> = Vec::new();
        assert_eq!(
            validate_selection(FileKind::Image, &names),
            Err(ValidationError::NoFileSelected)
        );
    }

    #[test]
    fn test_first_invalid_file_rejects_selection() {
        let names: [&str; 3] = ["a.png", "b.bmp", "c.gif"];
        let err: ValidationError = validate_selection(FileKind::Image, &names).unwrap_err();

        assert_eq!(
            err,
            ValidationError::InvalidFileFormat {
                filename: "b.bmp".into(),
                allowed: "png, jpg, jpeg".into(),
            }
        );
    }

    #[test]
    fn test_csv_selection() {
        assert!(validate_selection(FileKind::StratificationData, &["features.CSV"]).is_ok());
        assert!(validate_selection(FileKind::StratificationData, &["features.xlsx"]).is_err());
    }

    #[test]
    fn test_natural_sort() {
        let mut names: Vec<&str> = vec!["img_10.png", "img_2.png", "IMG_1.png", "cover.png"];
        sort_by_name(&mut names, |n: &&str| *n);

        assert_eq!(names, vec!["cover.png", "IMG_1.png", "img_2.png", "img_10.png"]);
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512 bytes");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
    }
}
