//! Two-phase submission workflow: transfer files to storage, then register
//! the submission that references them.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument};

use crate::api::{ApiError, TaskService};
use crate::model::{FileRef, Submission};

#[derive(Debug, Error)]
pub enum SubmitError {
    /// Rejected before any network traffic.
    #[error("invalid submission: {0}")]
    Validation(String),
    /// A file failed to reach storage; nothing was registered.
    #[error("file transfer failed: {0}")]
    Transfer(#[source] ApiError),
    /// The files are stored but the submission record was not created.
    #[error("submission registration failed after upload: {0}")]
    Registration(#[source] ApiError),
}

impl SubmitError {
    /// True when the underlying failure was a credential rejection, which
    /// the gateway has already turned into a session teardown.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            SubmitError::Transfer(ApiError::AuthExpired)
                | SubmitError::Registration(ApiError::AuthExpired)
        )
    }
}

/// Content type for the document formats the service accepts.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_ascii_lowercase())
    {
        Some(ext) if ext == "pdf" => "application/pdf",
        Some(ext) if ext == "doc" => "application/msword",
        Some(ext) if ext == "docx" => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some(ext) if ext == "xls" => "application/vnd.ms-excel",
        Some(ext) if ext == "xlsx" => {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        }
        Some(ext) if ext == "ppt" => "application/vnd.ms-powerpoint",
        Some(ext) if ext == "pptx" => {
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        }
        Some(ext) if ext == "txt" => "text/plain",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// Run the two-phase protocol. Every file goes to storage first; the
/// submission record referencing them is only created once all transfers
/// succeeded. A registration failure leaves the uploads in place (the server
/// tolerates orphaned files), and a retried submit starts over from the
/// first phase.
#[instrument(skip_all)]
pub async fn submit_files(
    api: &dyn TaskService,
    task_id: u64,
    paths: &[PathBuf],
) -> Result<Submission, SubmitError> {
    if paths.is_empty() {
        return Err(SubmitError::Validation("no file selected".into()));
    }

    // Read everything up front so a bad path never leaves a partial upload.
    let mut prepared = Vec::with_capacity(paths.len());
    for path in paths {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                SubmitError::Validation(format!("invalid file name: {}", path.display()))
            })?;
        let content = fs::read(path).await.map_err(|err| {
            SubmitError::Validation(format!("cannot read {}: {}", path.display(), err))
        })?;
        prepared.push((file_name.to_string(), content_type_for(path), content));
    }

    let mut refs: Vec<FileRef> = Vec::with_capacity(prepared.len());
    for (file_name, content_type, content) in prepared {
        let stored = api
            .upload_file(&file_name, content_type, content)
            .await
            .map_err(SubmitError::Transfer)?;
        info!(file = %file_name, "file stored");
        refs.push(stored);
    }

    let submission = api
        .register_submission(task_id, &refs)
        .await
        .map_err(SubmitError::Registration)?;
    info!(
        submission_id = submission.id,
        files = refs.len(),
        "submission registered"
    );
    Ok(submission)
}
