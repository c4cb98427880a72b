//! File operations used by the HTTP handlers.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    category_for_mime, is_allowed_mime, resolve_mime, sanitize_filename, BlobStore, ContentChain,
    FileContent, FilePage, FileQuery, FileRecord, FileRegistry, FileStorage, StorageSource,
};
use crate::remote::{reconcile, RemoteMirror, SyncReport};
use crate::{FiledockError, Result};

/// Message returned for a disallowed upload type.
pub const INVALID_TYPE_MESSAGE: &str =
    "Invalid file type. Only PNG, JPG, GIF, DOC, XLS, and PDF allowed.";

const MAX_CATEGORY_CHARS: usize = 100;

/// Per-request upload limits.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_file_size: u64,
    pub max_files: usize,
}

/// One file part received from a client.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// A parsed upload request.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub files: Vec<IncomingFile>,
    pub category: Option<String>,
    pub amount: Option<String>,
}

/// Where new uploads are written.
#[derive(Debug, Clone)]
pub enum ContentTarget {
    Local(FileStorage),
    Database(BlobStore),
}

struct PreparedFile {
    original_name: String,
    mime_type: String,
    category: String,
    data: Vec<u8>,
}

/// Upload, listing, retrieval and delete over the configured stores.
pub struct FileService {
    registry: Arc<dyn FileRegistry>,
    target: ContentTarget,
    chain: ContentChain,
    mirror: Option<RemoteMirror>,
    limits: UploadLimits,
}

impl FileService {
    pub fn new(
        registry: Arc<dyn FileRegistry>,
        target: ContentTarget,
        chain: ContentChain,
        mirror: Option<RemoteMirror>,
        limits: UploadLimits,
    ) -> Self {
        Self {
            registry,
            target,
            chain,
            mirror,
            limits,
        }
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }

    pub fn registry(&self) -> &Arc<dyn FileRegistry> {
        &self.registry
    }

    pub fn mirror(&self) -> Option<&RemoteMirror> {
        self.mirror.as_ref()
    }

    /// Validate and persist every file of an upload.
    ///
    /// Nothing is written unless all files pass validation.
    pub async fn upload(&self, form: UploadForm) -> Result<Vec<FileRecord>> {
        let amount = normalize_amount(form.amount.as_deref())?;
        let category = normalize_category(form.category.as_deref())?;
        let prepared = self.validate(form.files, category.as_deref())?;

        let mut records = Vec::with_capacity(prepared.len());
        for file in prepared {
            records.push(self.persist(file, amount.clone()).await?);
        }
        Ok(records)
    }

    fn validate(&self, files: Vec<IncomingFile>, category: Option<&str>) -> Result<Vec<PreparedFile>> {
        if files.is_empty() {
            return Err(FiledockError::Validation("No files uploaded".to_string()));
        }
        if files.len() > self.limits.max_files {
            return Err(FiledockError::Validation(format!(
                "Too many files: at most {} per upload",
                self.limits.max_files
            )));
        }

        files
            .into_iter()
            .map(|file| {
                if file.file_name.trim().is_empty() {
                    return Err(FiledockError::Validation("File name is required".to_string()));
                }
                if file.data.len() as u64 > self.limits.max_file_size {
                    return Err(FiledockError::Validation(format!(
                        "{} exceeds the maximum size of {} bytes",
                        file.file_name, self.limits.max_file_size
                    )));
                }
                let mime_type = resolve_mime(file.content_type.as_deref(), &file.file_name);
                if !is_allowed_mime(&mime_type) {
                    return Err(FiledockError::Validation(INVALID_TYPE_MESSAGE.to_string()));
                }
                let category = category
                    .map(str::to_string)
                    .unwrap_or_else(|| category_for_mime(&mime_type).to_string());

                Ok(PreparedFile {
                    original_name: file.file_name,
                    mime_type,
                    category,
                    data: file.data,
                })
            })
            .collect()
    }

    async fn persist(&self, file: PreparedFile, amount: Option<String>) -> Result<FileRecord> {
        let id = Uuid::new_v4().to_string();
        let name = sanitize_filename(&file.original_name);
        let sha256 = format!("{:x}", Sha256::digest(&file.data));

        let (source, local_path) = match &self.target {
            ContentTarget::Local(storage) => {
                let path = storage.save(&file.data, &name).await?;
                (StorageSource::Local, Some(path.to_string_lossy().into_owned()))
            }
            ContentTarget::Database(_) => (StorageSource::Db, None),
        };

        let ftp_path = match &self.mirror {
            Some(mirror) => match mirror.push(&name, &file.data).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(name = %name, error = %e, "Mirror upload failed, keeping local copy only");
                    None
                }
            },
            None => None,
        };

        let record = FileRecord {
            id,
            name,
            original_name: file.original_name,
            size: file.data.len() as i64,
            mime_type: file.mime_type,
            category: file.category,
            amount,
            uploaded_at: FileRecord::timestamp_now(),
            is_processed: true,
            source,
            local_path,
            ftp_path,
            sha256: Some(sha256),
        };

        if let Err(e) = self.registry.insert(record.clone()).await {
            self.chain.remove_all(&record).await;
            return Err(e);
        }

        if let ContentTarget::Database(blobs) = &self.target {
            if let Err(e) = blobs.save(&record.id, &file.data).await {
                if let Err(cleanup) = self.registry.delete(&record.id).await {
                    warn!(file_id = %record.id, error = %cleanup, "Failed to roll back record");
                }
                self.chain.remove_all(&record).await;
                return Err(e);
            }
        }

        info!(
            file_id = %record.id,
            name = %record.name,
            size = record.size,
            source = %record.source,
            mirrored = record.ftp_path.is_some(),
            "File uploaded"
        );
        Ok(record)
    }

    pub async fn list(&self, query: &FileQuery) -> Result<FilePage> {
        self.registry.search(query).await
    }

    pub async fn get(&self, id: &str) -> Result<FileRecord> {
        self.registry
            .get(id)
            .await?
            .ok_or_else(|| FiledockError::NotFound("file".to_string()))
    }

    /// Remove the record, then its content from every store.
    ///
    /// Content removal is best-effort.
    pub async fn delete(&self, id: &str) -> Result<FileRecord> {
        let record = self
            .registry
            .delete(id)
            .await?
            .ok_or_else(|| FiledockError::NotFound("file".to_string()))?;

        let removed = self.chain.remove_all(&record).await;
        info!(file_id = %record.id, name = %record.name, stores = removed, "File deleted");
        Ok(record)
    }

    /// Look up a record and the first available copy of its content.
    pub async fn open(&self, id: &str) -> Result<(FileRecord, FileContent)> {
        let record = self.get(id).await?;
        match self.chain.fetch(&record).await {
            Some(content) => Ok((record, content)),
            None => Err(FiledockError::ContentUnavailable(record.id)),
        }
    }

    /// Whether the remote mirror is configured and reachable.
    pub async fn mirror_connected(&self) -> bool {
        match &self.mirror {
            Some(mirror) => mirror.is_connected().await,
            None => false,
        }
    }

    /// Reconcile the remote mirror into the registry.
    pub async fn sync(&self) -> SyncReport {
        match &self.mirror {
            Some(mirror) => reconcile(self.registry.as_ref(), mirror).await,
            None => SyncReport::default(),
        }
    }
}

fn normalize_category(category: Option<&str>) -> Result<Option<String>> {
    let Some(category) = category.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    if category.chars().count() > MAX_CATEGORY_CHARS {
        return Err(FiledockError::Validation(format!(
            "Category must be at most {MAX_CATEGORY_CHARS} characters"
        )));
    }
    Ok(Some(category.to_string()))
}

fn normalize_amount(amount: Option<&str>) -> Result<Option<String>> {
    let Some(amount) = amount.map(str::trim).filter(|a| !a.is_empty()) else {
        return Ok(None);
    };
    match amount.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(amount.to_string())),
        _ => Err(FiledockError::Validation(format!(
            "Amount must be a number, got {amount:?}"
        ))),
    }
}
