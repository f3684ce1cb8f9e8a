//! Command handlers

pub mod expense;
pub mod identity;
pub mod payment;

use anyhow::{Context, Result};
use expensebook_business::ProofUpload;
use std::path::Path;

/// Read a proof file, guessing its content type from the extension
pub fn load_proof(path: &Path) -> Result<ProofUpload> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    let content_type = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    };

    let mut upload = ProofUpload::new(bytes, content_type);
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        upload = upload.with_file_name(name);
    }
    Ok(upload)
}
