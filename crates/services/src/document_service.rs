use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use storage::repository::{ResourceRepository, StorageError};
use study_core::model::{Resource, ResourceId, UserId};
use study_core::retrieval::{KEYWORD_CONTEXT_CHARS, KEYWORD_LIMIT, KeywordMatch, keyword_search};
use study_core::validate;

use crate::Clock;
use crate::error::DocumentError;
use crate::rag_service::RagService;

/// Hex characters of the content digest kept in stored file names.
const DIGEST_PREFIX_LEN: usize = 16;

/// A file as received from the learner.
#[derive(Clone, Debug)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub topic: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UploadOutcome {
    pub resource: Resource,
    /// Chunks embedded right after the upload, if that was attempted and worked.
    pub chunks: Option<usize>,
    pub warning: Option<String>,
}

/// Stores uploaded PDFs, their extracted text and (optionally) embeddings.
#[derive(Clone)]
pub struct DocumentService {
    clock: Clock,
    resources: Arc<dyn ResourceRepository>,
    rag: RagService,
    upload_dir: PathBuf,
    embed_on_upload: bool,
}

impl DocumentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        resources: Arc<dyn ResourceRepository>,
        rag: RagService,
        upload_dir: impl Into<PathBuf>,
        embed_on_upload: bool,
    ) -> Self {
        Self {
            clock,
            resources,
            rag,
            upload_dir: upload_dir.into(),
            embed_on_upload,
        }
    }

    /// Validate, store and extract an uploaded PDF.
    ///
    /// The file is removed again if no text can be extracted or the row
    /// cannot be stored. An embedding failure does not fail the upload; it
    /// is reported as a warning.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Validation` for a rejected file,
    /// `DocumentError::ExtractionFailed` when the PDF yields no text and
    /// `DocumentError::Io` when the file cannot be written.
    pub async fn upload(&self, user_id: UserId, upload: Upload) -> Result<UploadOutcome, DocumentError> {
        validate::upload(&upload.filename, upload.bytes.len() as u64)?;
        let path = self.stored_path(user_id, &upload.filename, &upload.bytes);
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::write(&path, &upload.bytes).await?;

        let text = match extract_pdf_text(upload.bytes).await {
            Some(text) => text,
            None => {
                remove_file(&path).await;
                return Err(DocumentError::ExtractionFailed);
            }
        };
        self.ingest(user_id, upload.filename, upload.topic, &path, text)
            .await
    }

    /// Store the row for a file already written to `path`.
    pub(crate) async fn ingest(
        &self,
        user_id: UserId,
        filename: String,
        topic: Option<String>,
        path: &Path,
        text: String,
    ) -> Result<UploadOutcome, DocumentError> {
        if text.trim().is_empty() {
            remove_file(path).await;
            return Err(DocumentError::ExtractionFailed);
        }

        let mut resource = Resource {
            id: ResourceId::generate(),
            user_id,
            filename,
            file_path: path.to_string_lossy().into_owned(),
            file_type: "pdf".to_string(),
            topic: topic.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            extracted_text: text,
            processed: true,
            embeddings_generated: false,
            uploaded_at: self.clock.now(),
        };
        if let Err(err) = self.resources.insert_resource(&resource).await {
            remove_file(path).await;
            return Err(err.into());
        }
        info!(
            %user_id,
            resource_id = %resource.id,
            filename = %resource.filename,
            chars = resource.text_len(),
            "stored document"
        );

        let mut outcome = UploadOutcome {
            resource: resource.clone(),
            chunks: None,
            warning: None,
        };
        if self.embed_on_upload {
            match self.rag.generate_embeddings(resource.id).await {
                Ok(count) => {
                    resource.embeddings_generated = true;
                    outcome.resource = resource;
                    outcome.chunks = Some(count);
                }
                Err(err) => {
                    warn!(resource_id = %resource.id, error = %err, "embedding after upload failed");
                    outcome.warning = Some(format!(
                        "Document saved, but it is not searchable yet: {err}"
                    ));
                }
            }
        }
        Ok(outcome)
    }

    fn stored_path(&self, user_id: UserId, filename: &str, bytes: &[u8]) -> PathBuf {
        let digest = Sha256::digest(bytes);
        let hex: String = digest
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>()
            .chars()
            .take(DIGEST_PREFIX_LEN)
            .collect();
        let base = Path::new(filename)
            .file_name()
            .map_or_else(|| "upload.pdf".to_string(), |n| n.to_string_lossy().into_owned());
        self.upload_dir.join(format!("{user_id}_{hex}_{base}"))
    }

    /// # Errors
    ///
    /// Returns `DocumentError::Storage` on backend failures.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Resource>, DocumentError> {
        Ok(self.resources.list_resources(user_id).await?)
    }

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` (wrapped) for a missing or foreign document.
    pub async fn get(&self, user_id: UserId, id: ResourceId) -> Result<Resource, DocumentError> {
        let resource = self.resources.get_resource(id).await?;
        if resource.user_id != user_id {
            return Err(StorageError::NotFound.into());
        }
        Ok(resource)
    }

    /// Remove the stored file, the chunks and the row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` (wrapped) for a missing or foreign document.
    pub async fn delete(&self, user_id: UserId, id: ResourceId) -> Result<(), DocumentError> {
        let resource = self.get(user_id, id).await?;
        remove_file(Path::new(&resource.file_path)).await;
        self.resources.delete_resource(id).await?;
        info!(%user_id, resource_id = %id, "deleted document");
        Ok(())
    }

    /// Remove every stored file the user uploaded; rows are left alone.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    pub async fn remove_files(&self, user_id: UserId) -> Result<usize, StorageError> {
        let resources = self.resources.list_resources(user_id).await?;
        for resource in &resources {
            remove_file(Path::new(&resource.file_path)).await;
        }
        Ok(resources.len())
    }

    /// Case-insensitive occurrences of `query` in one document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` (wrapped) for a missing or foreign document.
    pub async fn keyword_search(
        &self,
        user_id: UserId,
        id: ResourceId,
        query: &str,
    ) -> Result<Vec<KeywordMatch>, DocumentError> {
        let resource = self.get(user_id, id).await?;
        Ok(keyword_search(
            &resource.extracted_text,
            query.trim(),
            KEYWORD_CONTEXT_CHARS,
            KEYWORD_LIMIT,
        ))
    }
}

/// Text of a PDF, `None` when the bytes cannot be read as one.
async fn extract_pdf_text(bytes: Vec<u8>) -> Option<String> {
    match tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await {
        Ok(Ok(text)) => Some(text),
        Ok(Err(err)) => {
            warn!(error = %err, "pdf text extraction failed");
            None
        }
        Err(err) => {
            warn!(error = %err, "pdf text extraction aborted");
            None
        }
    }
}

async fn remove_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "could not remove uploaded file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::Storage;
    use study_core::time::fixed_now;

    use crate::ai::HashingEmbeddingProvider;
    use crate::testing::learner;

    fn service(storage: &Storage, dir: &Path, embed: bool) -> DocumentService {
        let rag = RagService::new(
            storage.resources.clone(),
            Arc::new(HashingEmbeddingProvider::new(64)),
        );
        DocumentService::new(
            Clock::fixed(fixed_now()),
            storage.resources.clone(),
            rag,
            dir,
            embed,
        )
    }

    async fn written(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, b"%PDF-1.4").await.unwrap();
        path
    }

    #[tokio::test]
    async fn rejected_uploads_leave_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, user) = learner(&["Biology"]).await;
        let service = service(&storage, dir.path(), false);

        let not_pdf = Upload {
            filename: "notes.txt".into(),
            bytes: b"hello".to_vec(),
            topic: None,
        };
        assert!(matches!(
            service.upload(user.id, not_pdf).await,
            Err(DocumentError::Validation(_))
        ));

        let garbage = Upload {
            filename: "broken.pdf".into(),
            bytes: b"definitely not a pdf".to_vec(),
            topic: None,
        };
        assert!(matches!(
            service.upload(user.id, garbage).await,
            Err(DocumentError::ExtractionFailed)
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn stored_names_carry_user_and_digest() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, user) = learner(&["Biology"]).await;
        let service = service(&storage, dir.path(), false);
        let path = service.stored_path(user.id, "../../etc/cells.pdf", b"abc");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        // sha256("abc") starts with ba7816bf8f01cfea
        assert_eq!(name, format!("{}_ba7816bf8f01cfea_cells.pdf", user.id));
        assert_eq!(path.parent().unwrap(), dir.path());
    }

    #[tokio::test]
    async fn ingested_documents_are_embedded_listed_and_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, user) = learner(&["Biology"]).await;
        let service = service(&storage, dir.path(), true);
        let path = written(dir.path(), "cells.pdf").await;

        let outcome = service
            .ingest(
                user.id,
                "cells.pdf".into(),
                Some(" Biology ".into()),
                &path,
                "The mitochondria is the powerhouse of the cell. Mitochondria make ATP.".into(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.chunks, Some(1));
        assert!(outcome.resource.embeddings_generated);
        assert_eq!(outcome.resource.topic.as_deref(), Some("Biology"));

        let id = outcome.resource.id;
        let matches = service.keyword_search(user.id, id, "MITOCHONDRIA").await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(service.list(user.id).await.unwrap().len(), 1);
        assert!(matches!(
            service.get(UserId::generate(), id).await,
            Err(DocumentError::Storage(StorageError::NotFound))
        ));

        service.delete(user.id, id).await.unwrap();
        assert!(!path.exists());
        assert!(service.list(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_text_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let (storage, user) = learner(&["Biology"]).await;
        let service = service(&storage, dir.path(), true);
        let path = written(dir.path(), "scan.pdf").await;

        assert!(matches!(
            service
                .ingest(user.id, "scan.pdf".into(), None, &path, "  \n".into())
                .await,
            Err(DocumentError::ExtractionFailed)
        ));
        assert!(!path.exists());
    }
}
