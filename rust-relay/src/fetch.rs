//! Document fetching - downloading signed files from SAS URLs.
//!
//! Every descriptor gets exactly one GET with a bounded timeout. Failures are
//! logged and the file is left out; nothing here fails the request.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::event::{FileDescriptor, InboundEvent};
use crate::util::{redact_url, sanitize_component, truncate_chars, LOG_BODY_LIMIT};

/// A successfully downloaded document, held in memory for one request.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub file_name: String,
    pub content: Vec<u8>,
    /// Where the audit copy was written, if saving succeeded
    pub saved_path: Option<PathBuf>,
}

/// Why a single download failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("download timed out")]
    Timeout(#[source] reqwest::Error),

    #[error("download request failed: {0}")]
    Request(#[source] reqwest::Error),
}

// reqwest embeds the request URL in its errors; a SAS URL carries its
// signature in the query, so it is dropped before the error goes anywhere.
impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            FetchError::Timeout(e)
        } else {
            FetchError::Request(e)
        }
    }
}

/// Download a single file. Any 2xx is a success.
pub async fn fetch_document(
    client: &Client,
    descriptor: &FileDescriptor,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    let url = redact_url(&descriptor.sas_url);

    info!(
        url = %url,
        file_name = %descriptor.file_name,
        timeout_seconds = timeout.as_secs_f64(),
        "document_fetch_starting"
    );

    let resp = client
        .get(&descriptor.sas_url)
        .timeout(timeout)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(FetchError::Status {
            status: status.as_u16(),
            body: truncate_chars(&body, LOG_BODY_LIMIT),
        });
    }

    let content = resp.bytes().await?.to_vec();

    info!(
        url = %url,
        file_name = %descriptor.file_name,
        status_code = status.as_u16(),
        content_length = content.len(),
        "document_fetch_complete"
    );

    Ok(content)
}

/// Fetch every file an event references.
///
/// Downloads run concurrently and the result keeps descriptor order, minus
/// anything that failed. Saving an audit copy is best-effort.
pub async fn fetch_documents(
    client: &Client,
    config: &Config,
    event: &InboundEvent,
) -> Vec<FetchedDocument> {
    if event.files.is_empty() {
        info!(
            client_id = %event.client_id,
            document_id = %event.document_id,
            "document_fetch_no_files"
        );
        return Vec::new();
    }

    let timeout = config.request_timeout();
    let futures: Vec<_> = event
        .files
        .iter()
        .map(|descriptor| fetch_document(client, descriptor, timeout))
        .collect();

    let results = futures::future::join_all(futures).await;
    let now = Utc::now();

    let mut documents = Vec::with_capacity(results.len());
    for (index, (descriptor, result)) in event.files.iter().zip(results).enumerate() {
        match result {
            Ok(content) => {
                let saved_path = if config.save_documents {
                    let name = audit_file_name(event, index + 1, &descriptor.file_name, now);
                    save_document(&config.storage_dir, &name, &content).await
                } else {
                    None
                };

                documents.push(FetchedDocument {
                    file_name: descriptor.file_name.clone(),
                    content,
                    saved_path,
                });
            }
            Err(FetchError::Status { status, body }) => {
                warn!(
                    url = %redact_url(&descriptor.sas_url),
                    file_name = %descriptor.file_name,
                    status_code = status,
                    body = %body,
                    "document_fetch_failed"
                );
            }
            Err(e) => {
                error!(
                    url = %redact_url(&descriptor.sas_url),
                    file_name = %descriptor.file_name,
                    error = %e,
                    "document_fetch_error"
                );
            }
        }
    }

    info!(
        requested = event.files.len(),
        fetched = documents.len(),
        "document_fetch_summary"
    );

    documents
}

/// Most suffixed names tried before giving up on an audit copy.
const MAX_SAVE_ATTEMPTS: u32 = 100;

/// Build the audit file name:
/// `{clientId}_{documentId}_{timestamp}_{position}_{fileName}`.
///
/// `position` is the descriptor's 1-based place in the event, so files that
/// share a name within one event never collide.
pub fn audit_file_name(
    event: &InboundEvent,
    position: usize,
    file_name: &str,
    at: DateTime<Utc>,
) -> String {
    format!(
        "{}_{}_{}_{}_{}",
        sanitize_component(&event.client_id),
        sanitize_component(&event.document_id),
        at.format("%Y%m%d%H%M%S%3f"),
        position,
        sanitize_component(file_name)
    )
}

/// Candidate name for a save attempt. Retries insert `-{n}` before the
/// extension: `a_1_return.pdf` becomes `a_1_return-1.pdf`.
fn attempt_name(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_string();
    }

    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, attempt, ext),
        _ => format!("{}-{}", name, attempt),
    }
}

/// Write a copy of a document under `dir` without replacing an existing
/// file. Returns `None` on any I/O failure.
async fn save_document(dir: &Path, name: &str, content: &[u8]) -> Option<PathBuf> {
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!(dir = %dir.display(), error = %e, "document_save_dir_failed");
        return None;
    }

    for attempt in 0..MAX_SAVE_ATTEMPTS {
        let path = dir.join(attempt_name(name, attempt));
        let open = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;

        let mut file = match open {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "document_save_failed");
                return None;
            }
        };

        let written = match file.write_all(content).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        return match written {
            Ok(()) => {
                info!(path = %path.display(), bytes = content.len(), "document_saved");
                Some(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "document_save_failed");
                None
            }
        };
    }

    warn!(dir = %dir.display(), name = %name, "document_save_name_exhausted");
    None
}
