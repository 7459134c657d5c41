//! Upload orchestration for visitor photos and signatures.

use futures::future::join;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::files::{prepare_visitor_files, validate_image_file, VisitorFile, VisitorFiles};
use super::optimizer::{ImageOptimizer, ResizingOptimizer};
use crate::errors::{ServiceError, VisitorflowError};
use crate::recovery::ServiceRecovery;
use crate::registration::VisitorRegistration;
use crate::services::{ColumnValues, NewVisitorRecord, RecordStore, UploadedFile};

/// Descriptors of the files that made it onto the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFiles {
    /// Photo descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<UploadedFile>,
    /// Signature descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<UploadedFile>,
}

/// Outcome of [`FileUploadService::upload_visitor_files`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadResult {
    /// At least one file was uploaded, or there was nothing to upload.
    pub success: bool,
    /// What was uploaded.
    pub uploaded_files: UploadedFiles,
    /// Every problem encountered, in order.
    pub errors: Vec<String>,
    /// Record the files belong to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<u64>,
}

/// URLs to write back onto a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUrls {
    /// Where the photo lives.
    pub photo_url: Option<String>,
    /// Where the signature lives.
    pub signature_url: Option<String>,
}

/// File information for a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Photo descriptors.
    pub photos: Vec<UploadedFile>,
    /// Signature descriptors.
    pub signatures: Vec<UploadedFile>,
    /// Record status at lookup time.
    pub status: Option<String>,
}

/// Validates, optimises and uploads visitor files.
///
/// Every record-store call goes through the recovery facade's monday
/// service.
pub struct FileUploadService {
    records: Arc<dyn RecordStore>,
    recovery: Arc<ServiceRecovery>,
    optimizer: Arc<dyn ImageOptimizer>,
}

impl std::fmt::Debug for FileUploadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileUploadService").finish_non_exhaustive()
    }
}

impl FileUploadService {
    /// Creates a service using [`ResizingOptimizer`] defaults.
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>, recovery: Arc<ServiceRecovery>) -> Self {
        Self {
            records,
            recovery,
            optimizer: Arc::new(ResizingOptimizer::default()),
        }
    }

    /// Replaces the photo optimizer.
    #[must_use]
    pub fn with_optimizer(mut self, optimizer: Arc<dyn ImageOptimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Uploads the registration's photo and signature.
    ///
    /// Creates the visitor record first when `item_id` is `None`. Both
    /// uploads run concurrently and one failing does not cancel the other.
    pub async fn upload_visitor_files(
        &self,
        reg: &VisitorRegistration,
        item_id: Option<u64>,
    ) -> FileUploadResult {
        let mut result = FileUploadResult::default();

        let files = prepare_visitor_files(reg);
        let supplied = !files.is_empty();
        let validated = self.validate_and_optimize(files, &mut result.errors).await;

        let item_id = match item_id {
            Some(id) => id,
            None => match self.create_record(reg).await {
                Ok(id) => id,
                Err(e) => {
                    result
                        .errors
                        .push(format!("Failed to create visitor record: {e}"));
                    return result;
                }
            },
        };
        result.item_id = Some(item_id);

        if validated.is_empty() {
            if supplied {
                result.errors.push("No valid files to upload".to_string());
            } else {
                debug!(item_id, "No files supplied");
                result.success = true;
            }
            return result;
        }

        let (photo, signature) = join(
            self.upload_optional(item_id, validated.photo.as_ref()),
            self.upload_optional(item_id, validated.signature.as_ref()),
        )
        .await;

        let mut uploaded = 0;
        for (kind, outcome, slot) in [
            ("photo", photo, &mut result.uploaded_files.photo),
            ("signature", signature, &mut result.uploaded_files.signature),
        ] {
            match outcome {
                Some(Ok(descriptor)) => {
                    uploaded += 1;
                    *slot = Some(descriptor);
                }
                Some(Err(e)) => {
                    warn!(item_id, kind, error = %e, "File upload failed");
                    result.errors.push(format!("Failed to upload {kind}: {e}"));
                }
                None => {}
            }
        }

        result.success = uploaded > 0;
        info!(item_id, uploaded, errors = result.errors.len(), "Visitor files processed");
        result
    }

    /// Writes file URLs onto a record. Nothing is sent when both are absent.
    pub async fn update_visitor_with_file_urls(
        &self,
        item_id: u64,
        urls: &FileUrls,
    ) -> Result<(), VisitorflowError> {
        let mut columns = ColumnValues::new();
        if let Some(url) = &urls.photo_url {
            columns.insert("photo_url".to_string(), url.clone().into());
        }
        if let Some(url) = &urls.signature_url {
            columns.insert("signature_url".to_string(), url.clone().into());
        }
        if columns.is_empty() {
            return Ok(());
        }

        self.recovery
            .execute_monday(|| self.records.update_item(item_id, columns.clone()))
            .await?;
        Ok(())
    }

    /// Looks up file information for a record. Lookup failures are logged
    /// and yield empty metadata.
    pub async fn get_file_metadata(&self, item_id: u64) -> FileMetadata {
        match self
            .recovery
            .execute_monday(|| self.records.get_item_status(item_id))
            .await
        {
            Ok(status) => FileMetadata {
                status: Some(status.status),
                ..FileMetadata::default()
            },
            Err(e) => {
                warn!(item_id, error = %e, "Failed to get file metadata");
                FileMetadata::default()
            }
        }
    }

    async fn create_record(&self, reg: &VisitorRegistration) -> Result<u64, ServiceError> {
        let record = NewVisitorRecord::from_registration(reg);
        let created = self
            .recovery
            .execute_monday(|| self.records.create_visitor_record(record.clone()))
            .await?;
        info!(item_id = created.id, name = %created.name, "Visitor record created");
        Ok(created.id)
    }

    async fn upload_optional(
        &self,
        item_id: u64,
        file: Option<&VisitorFile>,
    ) -> Option<Result<UploadedFile, ServiceError>> {
        let file = file?;
        Some(
            self.recovery
                .execute_monday(|| self.records.upload_file(item_id, &file.column_id, file))
                .await,
        )
    }

    async fn validate_and_optimize(
        &self,
        files: VisitorFiles,
        errors: &mut Vec<String>,
    ) -> VisitorFiles {
        let mut validated = VisitorFiles::default();

        if let Some(photo) = files.photo {
            match validate_image_file(&photo) {
                Ok(()) => match self.optimize(photo).await {
                    Ok(optimized) => validated.photo = Some(optimized),
                    Err(e) => errors.push(format!("Failed to optimize photo: {e}")),
                },
                Err(e) => errors.push(format!("Photo validation failed: {e}")),
            }
        }

        if let Some(signature) = files.signature {
            match validate_image_file(&signature) {
                Ok(()) => validated.signature = Some(signature),
                Err(e) => errors.push(format!("Signature validation failed: {e}")),
            }
        }

        validated
    }

    async fn optimize(&self, file: VisitorFile) -> Result<VisitorFile, VisitorflowError> {
        let optimizer = Arc::clone(&self.optimizer);
        tokio::task::spawn_blocking(move || optimizer.optimize(&file))
            .await
            .map_err(|e| VisitorflowError::Upload(format!("optimizer task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::RecoveryConfig;
    use crate::services::memory::InMemoryRecordStore;
    use crate::services::ports::{MockRecordStore, RecordRef};
    use crate::upload::{PassthroughOptimizer, MAX_IMAGE_SIZE};
    use pretty_assertions::assert_eq;

    fn recovery() -> Arc<ServiceRecovery> {
        Arc::new(ServiceRecovery::new(RecoveryConfig::default().with_base_delay_ms(1)))
    }

    fn service(records: Arc<dyn RecordStore>) -> FileUploadService {
        FileUploadService::new(records, recovery()).with_optimizer(Arc::new(PassthroughOptimizer))
    }

    fn registration() -> VisitorRegistration {
        VisitorRegistration::new("John", "Doe", "j@x.com").with_host("1", "Sarah", "sarah@sqla.com")
    }

    fn descriptor(item_id: u64, column_id: &str, file: &VisitorFile) -> UploadedFile {
        UploadedFile {
            item_id,
            column_id: column_id.to_string(),
            filename: file.filename.clone(),
            size: file.size(),
            url: None,
        }
    }

    #[tokio::test]
    async fn test_no_files_creates_record_and_succeeds() {
        let store = Arc::new(InMemoryRecordStore::new());
        let result = service(store.clone()).upload_visitor_files(&registration(), None).await;

        assert!(result.success);
        assert!(result.errors.is_empty());
        assert_eq!(result.item_id, Some(InMemoryRecordStore::FIRST_ID));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_uploads_photo_and_signature() {
        let store = Arc::new(InMemoryRecordStore::new());
        let reg = registration()
            .with_photo(vec![0xFF, 0xD8, 0xFF])
            .with_signature_blob(vec![0x89, 0x50]);

        let result = service(store.clone()).upload_visitor_files(&reg, None).await;

        assert!(result.success, "{:?}", result.errors);
        let photo = result.uploaded_files.photo.unwrap();
        assert_eq!(photo.column_id, "files");
        assert_eq!(result.uploaded_files.signature.unwrap().column_id, "files9");
        assert_eq!(store.record(photo.item_id).unwrap().files.len(), 2);
    }

    #[tokio::test]
    async fn test_one_failed_upload_still_succeeds() {
        let mut store = MockRecordStore::new();
        store
            .expect_create_visitor_record()
            .times(1)
            .returning(|r| Ok(RecordRef { id: 5, name: r.item_name() }));
        store.expect_upload_file().returning(|id, column, file| {
            if column == "files" {
                Err(ServiceError::http(429, "rate limit exceeded"))
            } else {
                Ok(descriptor(id, column, file))
            }
        });

        let reg = registration().with_photo(vec![1]).with_signature_blob(vec![2]);
        let result = service(Arc::new(store)).upload_visitor_files(&reg, None).await;

        assert!(result.success);
        assert!(result.uploaded_files.photo.is_none());
        assert!(result.uploaded_files.signature.is_some());
        assert_eq!(
            result.errors,
            vec!["Failed to upload photo: HTTP 429: rate limit exceeded".to_string()]
        );
    }

    #[tokio::test]
    async fn test_rejected_photo_alone_is_failure() {
        let store = Arc::new(InMemoryRecordStore::new());
        let reg = registration().with_photo(vec![0; MAX_IMAGE_SIZE + 1]);

        let result = service(store).upload_visitor_files(&reg, None).await;

        assert!(!result.success);
        assert_eq!(
            result.errors,
            vec![
                "Photo validation failed: Image file is too large. Maximum size is 5MB."
                    .to_string(),
                "No valid files to upload".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_record_creation_failure_stops_upload() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.fail_always(ServiceError::other("rate limit reached"));

        let result = service(store.clone())
            .upload_visitor_files(&registration().with_photo(vec![1]), None)
            .await;

        assert!(!result.success);
        assert_eq!(result.item_id, None);
        assert_eq!(
            result.errors,
            vec!["Failed to create visitor record: rate limit reached".to_string()]
        );
        assert_eq!(store.call_count(), 1);
    }

    #[tokio::test]
    async fn test_existing_item_skips_creation() {
        let mut store = MockRecordStore::new();
        store.expect_create_visitor_record().never();
        store
            .expect_upload_file()
            .times(1)
            .returning(|id, column, file| Ok(descriptor(id, column, file)));

        let result = service(Arc::new(store))
            .upload_visitor_files(&registration().with_signature_blob(vec![7]), Some(77))
            .await;

        assert!(result.success);
        assert_eq!(result.item_id, Some(77));
        assert_eq!(result.uploaded_files.signature.unwrap().item_id, 77);
    }

    #[tokio::test]
    async fn test_photo_is_optimized_before_upload() {
        use image::{DynamicImage, ImageFormat, RgbImage};
        use std::io::Cursor;

        let mut png = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(1000, 500))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let store = Arc::new(InMemoryRecordStore::new());
        let service = FileUploadService::new(store.clone(), recovery());
        let result = service
            .upload_visitor_files(&registration().with_photo(png.clone()), None)
            .await;

        assert!(result.success);
        let uploaded = result.uploaded_files.photo.unwrap();
        assert_ne!(uploaded.size, png.len());
    }

    #[tokio::test]
    async fn test_update_with_no_urls_makes_no_call() {
        let mut store = MockRecordStore::new();
        store.expect_update_item().never();

        service(Arc::new(store))
            .update_visitor_with_file_urls(1, &FileUrls::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_writes_present_urls() {
        let mut store = MockRecordStore::new();
        store
            .expect_update_item()
            .withf(|id, columns| {
                *id == 9
                    && columns.get("photo_url").and_then(|v| v.as_str()) == Some("https://p")
                    && !columns.contains_key("signature_url")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let urls = FileUrls {
            photo_url: Some("https://p".into()),
            signature_url: None,
        };
        service(Arc::new(store))
            .update_visitor_with_file_urls(9, &urls)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_metadata_lookup_failure_is_empty() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.fail_always(ServiceError::other("rate limit"));

        let metadata = service(store).get_file_metadata(3).await;
        assert_eq!(metadata, FileMetadata::default());
    }
}
