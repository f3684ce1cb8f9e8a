//! Proof store gateway
//!
//! Invoice and payment proofs are opaque blobs handed to a [`ProofStore`].
//! The gateway checks the size/type contract and bounds every upload with the
//! configured timeout; a ledger row only ever references a URL the store has
//! already returned.

use crate::error::{LedgerError, LedgerResult};
use crate::services::ServiceContext;
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// A file to upload
#[derive(Debug, Clone)]
pub struct ProofUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: Option<String>,
}

impl ProofUpload {
    pub fn new(bytes: Vec<u8>, content_type: &str) -> Self {
        Self {
            bytes,
            content_type: content_type.trim().to_lowercase(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: &str) -> Self {
        self.file_name = Some(name.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension: taken from the file name when it has a sane one,
    /// otherwise from the content type
    pub fn extension(&self) -> String {
        let from_name = self
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.len() <= 5)
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()));
        if let Some(ext) = from_name {
            return ext.to_lowercase();
        }

        match self.content_type.as_str() {
            "application/pdf" => "pdf".to_string(),
            "image/jpeg" | "image/jpg" => "jpg".to_string(),
            other => other
                .strip_prefix("image/")
                .map(|sub| sub.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>())
                .filter(|sub| !sub.is_empty())
                .unwrap_or_else(|| "bin".to_string()),
        }
    }

    /// Accepted: `image/*` and `application/pdf`
    pub fn is_allowed_type(&self) -> bool {
        let ct = self.content_type.as_str();
        ct == "application/pdf" || (ct.starts_with("image/") && ct.len() > "image/".len())
    }
}

/// Durable storage for proof files
#[async_trait]
pub trait ProofStore: Send + Sync {
    /// Store name for logging
    fn name(&self) -> &str;

    /// Store the blob and return a retrievable URL
    async fn upload(&self, upload: &ProofUpload) -> LedgerResult<String>;
}

/// Writes proofs as files under a directory and returns `file://` URLs
#[derive(Debug, Clone)]
pub struct LocalProofStore {
    dir: PathBuf,
}

impl LocalProofStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ProofStore for LocalProofStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn upload(&self, upload: &ProofUpload) -> LedgerResult<String> {
        let io_err = |e: std::io::Error| LedgerError::UploadError(format!("{}: {}", self.dir.display(), e));

        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;
        let dir = tokio::fs::canonicalize(&self.dir).await.map_err(io_err)?;

        let file_name = format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4(),
            upload.extension()
        );
        let path = dir.join(file_name);
        tokio::fs::write(&path, &upload.bytes).await.map_err(io_err)?;

        Ok(format!("file://{}", path.display()))
    }
}

/// Contract checks and timeout around the configured [`ProofStore`]
pub struct ProofGateway<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ProofGateway<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Reject uploads the store must never see
    pub fn check(&self, upload: &ProofUpload) -> LedgerResult<()> {
        let max = self.ctx.config().max_proof_bytes;
        if upload.is_empty() {
            return Err(LedgerError::UploadError("proof file is empty".to_string()));
        }
        if upload.len() > max {
            return Err(LedgerError::UploadError(format!(
                "proof file is {} bytes, limit is {}",
                upload.len(),
                max
            )));
        }
        if !upload.is_allowed_type() {
            return Err(LedgerError::UploadError(format!(
                "unsupported content type '{}'",
                upload.content_type
            )));
        }
        Ok(())
    }

    /// Upload a proof and return its URL.
    ///
    /// A timed-out upload is an error, never a success.
    pub async fn upload(&self, upload: &ProofUpload) -> LedgerResult<String> {
        self.check(upload)?;

        let store = self.ctx.proofs();
        let limit = self.ctx.config().upload_timeout();
        let url = match tokio::time::timeout(limit, store.upload(upload)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    store = store.name(),
                    timeout_ms = self.ctx.config().upload_timeout_ms,
                    "proof upload timed out"
                );
                return Err(LedgerError::UploadError(format!(
                    "upload timed out after {}ms",
                    self.ctx.config().upload_timeout_ms
                )));
            }
        };

        if url.trim().is_empty() {
            return Err(LedgerError::UploadError(format!(
                "store '{}' returned an empty URL",
                store.name()
            )));
        }

        debug!(store = store.name(), bytes = upload.len(), %url, "proof uploaded");
        Ok(url)
    }
}
