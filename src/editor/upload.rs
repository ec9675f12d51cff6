//! Upload validation: format sniffing, size ceiling, duplicate detection.
//!
//! Validation failures are non-fatal — each rejected file is reported
//! alongside the accepted ones so the batch can proceed with what's valid.

use std::collections::HashSet;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::MAX_UPLOAD_BYTES;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Not a recognizable image file")]
    NotAnImage,

    #[error("File too large: {size_mb:.1}MB exceeds {max_mb}MB limit")]
    FileTooLarge { size_mb: f64, max_mb: u64 },

    #[error("Duplicate of an image already in this batch")]
    Duplicate,

    #[error("Empty file")]
    Empty,

    #[error("Could not read file: {0}")]
    FileRead(String),
}

/// Image formats the backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    WebP,
}

impl ImageKind {
    /// File extension used when exporting results.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }
}

/// An upload that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub bytes: Vec<u8>,
    pub kind: ImageKind,
    /// SHA-256 content hash (hex), used for duplicate detection.
    pub hash: String,
}

/// Validates a batch of uploads, tracking content hashes to reject
/// duplicate selections within the batch.
#[derive(Debug, Default)]
pub struct UploadValidator {
    seen_hashes: HashSet<String>,
}

impl UploadValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate one file. Order matters: format first (cheapest rejection
    /// message for the user), then size, then duplicate.
    pub fn validate(&mut self, bytes: Vec<u8>) -> Result<ValidatedUpload, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }

        let kind = sniff_format(&bytes)?;

        if bytes.len() as u64 > MAX_UPLOAD_BYTES {
            return Err(UploadError::FileTooLarge {
                size_mb: bytes.len() as f64 / (1024.0 * 1024.0),
                max_mb: MAX_UPLOAD_BYTES / (1024 * 1024),
            });
        }

        let hash = content_hash(&bytes);
        if !self.seen_hashes.insert(hash.clone()) {
            return Err(UploadError::Duplicate);
        }

        Ok(ValidatedUpload { bytes, kind, hash })
    }

    /// Validate a whole selection. Returns the accepted uploads plus the
    /// index and reason of every rejection.
    pub fn validate_batch(
        &mut self,
        files: Vec<Vec<u8>>,
    ) -> (Vec<ValidatedUpload>, Vec<(usize, UploadError)>) {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for (i, bytes) in files.into_iter().enumerate() {
            match self.validate(bytes) {
                Ok(upload) => accepted.push(upload),
                Err(e) => {
                    tracing::debug!(index = i, error = %e, "Upload rejected");
                    rejected.push((i, e));
                }
            }
        }

        (accepted, rejected)
    }

    /// Forget seen hashes (a new batch starts fresh).
    pub fn reset(&mut self) {
        self.seen_hashes.clear();
    }
}

/// Detect the image format from magic bytes.
pub fn sniff_format(bytes: &[u8]) -> Result<ImageKind, UploadError> {
    let format = image::guess_format(bytes).map_err(|_| UploadError::NotAnImage)?;
    match format {
        image::ImageFormat::Jpeg => Ok(ImageKind::Jpeg),
        image::ImageFormat::Png => Ok(ImageKind::Png),
        image::ImageFormat::WebP => Ok(ImageKind::WebP),
        other => Err(UploadError::UnsupportedFormat(format!("{other:?}"))),
    }
}

/// SHA-256 hex digest of the raw file content.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Read a file from disk for upload (drag-and-drop path in the shell).
pub fn read_file(path: &std::path::Path) -> Result<Vec<u8>, UploadError> {
    std::fs::read(path).map_err(|e| UploadError::FileRead(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal valid headers — enough for magic-byte sniffing.
    pub(crate) fn png_bytes(seed: u8) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R', seed]);
        bytes
    }

    fn jpeg_bytes() -> Vec<u8> {
        vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00]
    }

    #[test]
    fn accepts_png_and_jpeg() {
        let mut v = UploadValidator::new();
        assert_eq!(v.validate(png_bytes(1)).unwrap().kind, ImageKind::Png);
        assert_eq!(v.validate(jpeg_bytes()).unwrap().kind, ImageKind::Jpeg);
    }

    #[test]
    fn rejects_non_image() {
        let mut v = UploadValidator::new();
        let err = v.validate(b"MZ\x00\x00 definitely not pixels".to_vec());
        assert!(matches!(err, Err(UploadError::NotAnImage)));
    }

    #[test]
    fn rejects_empty_file() {
        let mut v = UploadValidator::new();
        assert!(matches!(v.validate(Vec::new()), Err(UploadError::Empty)));
    }

    #[test]
    fn rejects_duplicate_in_batch() {
        let mut v = UploadValidator::new();
        v.validate(png_bytes(7)).unwrap();
        assert!(matches!(
            v.validate(png_bytes(7)),
            Err(UploadError::Duplicate)
        ));
        // Different content is fine
        assert!(v.validate(png_bytes(8)).is_ok());
    }

    #[test]
    fn reset_clears_duplicate_tracking() {
        let mut v = UploadValidator::new();
        v.validate(png_bytes(7)).unwrap();
        v.reset();
        assert!(v.validate(png_bytes(7)).is_ok());
    }

    #[test]
    fn validate_batch_isolates_failures() {
        let mut v = UploadValidator::new();
        let files = vec![
            png_bytes(1),
            b"garbage".to_vec(),
            png_bytes(2),
            png_bytes(1), // duplicate of the first
        ];
        let (accepted, rejected) = v.validate_batch(files);
        assert_eq!(accepted.len(), 2);
        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].0, 1);
        assert_eq!(rejected[1].0, 3);
        assert!(matches!(rejected[1].1, UploadError::Duplicate));
    }

    #[test]
    fn content_hash_is_stable_hex() {
        let h1 = content_hash(b"abc");
        let h2 = content_hash(b"abc");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn read_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, png_bytes(3)).unwrap();

        let bytes = read_file(&path).unwrap();
        assert_eq!(bytes, png_bytes(3));

        let missing = read_file(&dir.path().join("absent.png"));
        assert!(matches!(missing, Err(UploadError::FileRead(_))));
    }
}
