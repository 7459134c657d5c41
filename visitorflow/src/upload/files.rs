//! Visitor file preparation and validation.

use base64::Engine;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::warn;

use crate::errors::VisitorflowError;
use crate::registration::VisitorRegistration;
use crate::utils::{file_safe_timestamp, now_utc};

/// Image MIME types accepted for upload.
pub const SUPPORTED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];
/// Document MIME types accepted for upload.
pub const SUPPORTED_PDF_TYPES: [&str; 1] = ["application/pdf"];
/// Largest accepted image, in bytes.
pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;
/// Largest accepted document, in bytes.
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Record column holding visitor photos.
pub const PHOTO_COLUMN: &str = "files";
/// Record column holding signatures.
pub const SIGNATURE_COLUMN: &str = "files9";

static DATA_URL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^data:(?P<mime>[^;,]*)(?P<b64>;base64)?,(?P<data>.*)$").ok()
});

/// A file ready to be attached to a visitor record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorFile {
    /// Content.
    pub bytes: Vec<u8>,
    /// MIME type.
    pub mime_type: String,
    /// Filename stored on the record.
    pub filename: String,
    /// Target record column.
    pub column_id: String,
}

impl VisitorFile {
    /// Creates a file.
    #[must_use]
    pub fn new(
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
        filename: impl Into<String>,
        column_id: impl Into<String>,
    ) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            filename: filename.into(),
            column_id: column_id.into(),
        }
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Photo and signature extracted from a registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorFiles {
    /// Visitor photo, JPEG.
    pub photo: Option<VisitorFile>,
    /// NDA signature, PNG.
    pub signature: Option<VisitorFile>,
}

impl VisitorFiles {
    /// True when neither file is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.photo.is_none() && self.signature.is_none()
    }
}

/// Why a file was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FileValidationError {
    /// Not an accepted image type.
    #[error("Unsupported image format. Please use JPEG, PNG, or WebP.")]
    UnsupportedImage,
    /// Image over [`MAX_IMAGE_SIZE`].
    #[error("Image file is too large. Maximum size is 5MB.")]
    ImageTooLarge,
    /// Not a PDF.
    #[error("File must be a PDF document.")]
    NotPdf,
    /// PDF over [`MAX_FILE_SIZE`].
    #[error("PDF file is too large. Maximum size is 10MB.")]
    PdfTooLarge,
}

/// Checks an image's type and size.
pub fn validate_image_file(file: &VisitorFile) -> Result<(), FileValidationError> {
    if !SUPPORTED_IMAGE_TYPES.contains(&file.mime_type.as_str()) {
        return Err(FileValidationError::UnsupportedImage);
    }
    if file.size() > MAX_IMAGE_SIZE {
        return Err(FileValidationError::ImageTooLarge);
    }
    Ok(())
}

/// Checks a document's type and size.
pub fn validate_pdf_file(file: &VisitorFile) -> Result<(), FileValidationError> {
    if !SUPPORTED_PDF_TYPES.contains(&file.mime_type.as_str()) {
        return Err(FileValidationError::NotPdf);
    }
    if file.size() > MAX_FILE_SIZE {
        return Err(FileValidationError::PdfTooLarge);
    }
    Ok(())
}

/// `{prefix}_{timestamp}.{extension}` with a filesystem-safe timestamp.
#[must_use]
pub fn generate_file_name(prefix: &str, extension: &str) -> String {
    format!("{prefix}_{}.{extension}", file_safe_timestamp(&now_utc()))
}

/// Decodes a `data:` URL into its bytes and MIME type.
pub fn data_url_to_bytes(data_url: &str) -> Result<(Vec<u8>, String), VisitorflowError> {
    let captures = DATA_URL
        .as_ref()
        .and_then(|re| re.captures(data_url.trim()))
        .ok_or_else(|| VisitorflowError::Upload("not a data URL".to_string()))?;

    let mime = captures
        .name("mime")
        .map(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .unwrap_or("text/plain")
        .to_string();
    let data = captures.name("data").map_or("", |m| m.as_str());

    if captures.name("b64").is_none() {
        return Ok((data.as_bytes().to_vec(), mime));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| VisitorflowError::Upload(format!("invalid base64 payload: {e}")))?;
    Ok((bytes, mime))
}

/// Pulls the photo and signature out of a registration.
///
/// A signature blob wins over a signature data URL. A data URL that fails
/// to decode is logged and skipped.
#[must_use]
pub fn prepare_visitor_files(reg: &VisitorRegistration) -> VisitorFiles {
    let stem = format!("{}_{}", reg.first_name, reg.last_name);

    let photo = reg.photo.as_ref().map(|bytes| {
        VisitorFile::new(
            bytes.clone(),
            "image/jpeg",
            generate_file_name(&format!("{stem}_photo"), "jpg"),
            PHOTO_COLUMN,
        )
    });

    let signature_bytes = match (&reg.signature_blob, &reg.signature_data_url) {
        (Some(blob), _) => Some(blob.clone()),
        (None, Some(data_url)) => match data_url_to_bytes(data_url) {
            Ok((bytes, _)) => Some(bytes),
            Err(e) => {
                warn!(error = %e, "Failed to convert signature data URL");
                None
            }
        },
        (None, None) => None,
    };
    let signature = signature_bytes.map(|bytes| {
        VisitorFile::new(
            bytes,
            "image/png",
            generate_file_name(&format!("{stem}_signature"), "png"),
            SIGNATURE_COLUMN,
        )
    });

    VisitorFiles { photo, signature }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(mime: &str, size: usize) -> VisitorFile {
        VisitorFile::new(vec![0; size], mime, "f", "files")
    }

    #[test]
    fn test_validate_image_types() {
        for mime in SUPPORTED_IMAGE_TYPES {
            assert_eq!(validate_image_file(&file(mime, 10)), Ok(()));
        }
        let err = validate_image_file(&file("image/gif", 10)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported image format. Please use JPEG, PNG, or WebP."
        );
    }

    #[test]
    fn test_validate_image_size_limit() {
        assert!(validate_image_file(&file("image/png", MAX_IMAGE_SIZE)).is_ok());
        assert_eq!(
            validate_image_file(&file("image/png", MAX_IMAGE_SIZE + 1)),
            Err(FileValidationError::ImageTooLarge)
        );
    }

    #[test]
    fn test_validate_pdf() {
        assert!(validate_pdf_file(&file("application/pdf", 1)).is_ok());
        assert_eq!(
            validate_pdf_file(&file("image/png", 1)).unwrap_err().to_string(),
            "File must be a PDF document."
        );
        assert_eq!(
            validate_pdf_file(&file("application/pdf", MAX_FILE_SIZE + 1)),
            Err(FileValidationError::PdfTooLarge)
        );
    }

    #[test]
    fn test_generate_file_name() {
        let name = generate_file_name("John_Doe_photo", "jpg");
        assert!(name.starts_with("John_Doe_photo_"));
        assert!(name.ends_with(".jpg"));
        let stamp = &name["John_Doe_photo_".len()..name.len() - 4];
        assert!(!stamp.contains(':'));
        assert!(!stamp.contains('.'));
    }

    #[test]
    fn test_data_url_to_bytes() {
        let (bytes, mime) = data_url_to_bytes("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(mime, "image/png");

        let (plain, mime) = data_url_to_bytes("data:,hi").unwrap();
        assert_eq!(plain, b"hi");
        assert_eq!(mime, "text/plain");

        assert!(data_url_to_bytes("https://example.com/x.png").is_err());
        assert!(data_url_to_bytes("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn test_prepare_files_from_blobs() {
        let reg = VisitorRegistration::new("John", "Doe", "j@x.com")
            .with_photo(vec![1, 2])
            .with_signature_blob(vec![3])
            .with_signature_data_url("data:image/png;base64,aGVsbG8=");

        let files = prepare_visitor_files(&reg);
        let photo = files.photo.unwrap();
        assert_eq!(photo.mime_type, "image/jpeg");
        assert_eq!(photo.column_id, "files");
        assert!(photo.filename.starts_with("John_Doe_photo_"));

        let signature = files.signature.unwrap();
        assert_eq!(signature.bytes, vec![3]);
        assert_eq!(signature.column_id, "files9");
    }

    #[test]
    fn test_prepare_files_decodes_data_url() {
        let reg = VisitorRegistration::new("A", "B", "a@b.c")
            .with_signature_data_url("data:image/png;base64,aGVsbG8=");
        let files = prepare_visitor_files(&reg);
        assert!(files.photo.is_none());
        assert_eq!(files.signature.unwrap().bytes, b"hello");
    }

    #[test]
    fn test_prepare_files_skips_bad_data_url() {
        let reg = VisitorRegistration::new("A", "B", "a@b.c").with_signature_data_url("garbage");
        assert!(prepare_visitor_files(&reg).is_empty());
    }
}
