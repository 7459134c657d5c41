//! Visitor file handling: preparation, validation, optimisation and upload.

mod files;
mod optimizer;
mod service;

pub use files::{
    data_url_to_bytes, generate_file_name, prepare_visitor_files, validate_image_file,
    validate_pdf_file, FileValidationError, VisitorFile, VisitorFiles, MAX_FILE_SIZE,
    MAX_IMAGE_SIZE, PHOTO_COLUMN, SIGNATURE_COLUMN, SUPPORTED_IMAGE_TYPES, SUPPORTED_PDF_TYPES,
};
pub use optimizer::{ImageOptimizer, PassthroughOptimizer, ResizingOptimizer};
pub use service::{FileMetadata, FileUploadResult, FileUploadService, FileUrls, UploadedFiles};
