//! Download pipeline: signed-URL resolution and streaming transfer.
//!
//! Two steps per (item, format) pair. [`resolve_url`] asks the files
//! endpoint for a signed, time-limited URL; [`stream_to_file`] GETs that URL
//! with streaming semantics and writes the body to disk chunk by chunk, so
//! large assets never sit in memory. Both steps go through the session's
//! single 401-refresh rule.
//!
//! Bodies stream into `<dest>.part` and are renamed onto `<dest>` only on
//! completion; a failed stream removes the partial file. An interrupted run
//! therefore never leaves a truncated file that a re-run would mistake for
//! a finished download.

mod error;

pub use error::DownloadError;

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use crate::catalog::CatalogItem;
use crate::endpoints;
use crate::session::Session;

/// Reference transfer chunk size; disk writes are batched at this
/// granularity.
const STREAM_CHUNK_BYTES: usize = 16 * 1024;

/// Byte-level progress seam for the surrounding CLI.
///
/// The pipeline reports the expected total (when the server sends
/// `Content-Length`; `None` means indeterminate, not an error) and then
/// every chunk as it is written.
pub trait TransferObserver {
    /// Called once before the first chunk.
    fn on_start(&mut self, total_bytes: Option<u64>);
    /// Called after each chunk is handed to the writer.
    fn on_chunk(&mut self, bytes: u64);
}

/// No-op observer for callers that do not track byte progress.
impl TransferObserver for () {
    fn on_start(&mut self, _total_bytes: Option<u64>) {}
    fn on_chunk(&mut self, _bytes: u64) {}
}

#[derive(Debug, Deserialize)]
struct FileUrlResponse {
    #[serde(default)]
    data: String,
}

/// Resolves the signed download URL for one (item, format) pair.
///
/// # Errors
///
/// Returns [`DownloadError::UrlResolve`] for a non-success response (after
/// the session's single 401 refresh) and [`DownloadError::MissingUrl`] when
/// the endpoint answers 200 without a URL. Both mean "skip this pair".
#[instrument(skip(session, item), fields(product_id = item.product_id))]
pub async fn resolve_url(
    session: &mut Session,
    item: &CatalogItem,
    format: &str,
) -> Result<String, DownloadError> {
    let url = endpoints::file_url(session.base_url(), item.product_id, format);
    debug!(url = %url, "GET signed download URL");

    let response = session.get_with_refresh(&url).await?;
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(DownloadError::UrlResolve {
            product_id: item.product_id,
            format: format.to_string(),
            status: status.as_u16(),
            body: text,
        });
    }

    let signed = serde_json::from_str::<FileUrlResponse>(&text)
        .map(|r| r.data)
        .unwrap_or_default();
    if signed.is_empty() {
        return Err(DownloadError::MissingUrl {
            product_id: item.product_id,
            format: format.to_string(),
        });
    }
    Ok(signed)
}

/// Streams a signed URL to `dest`, returning bytes written.
///
/// The GET goes through the session so an expired token is refreshed once.
/// The body is copied through a 16 KiB buffered writer into `<dest>.part`,
/// which is renamed onto `dest` only after a full flush — no truncated
/// final files, ever. On any error the partial file is removed.
///
/// # Errors
///
/// Returns [`DownloadError::HttpStatus`] for a non-success streaming
/// response, and network/IO errors from the transfer itself.
#[instrument(skip(session, observer), fields(dest = %dest.display()))]
pub async fn stream_to_file<O: TransferObserver>(
    session: &mut Session,
    url: &str,
    dest: &Path,
    observer: &mut O,
) -> Result<u64, DownloadError> {
    let response = session.get_with_refresh(url).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::http_status(url, status.as_u16()));
    }

    observer.on_start(response.content_length());

    let part = part_path(dest);
    let file = File::create(&part)
        .await
        .map_err(|e| DownloadError::io(part.clone(), e))?;

    let result = stream_body(file, response, url, &part, observer).await;
    if result.is_err() {
        debug!(path = %part.display(), "cleaning up partial file after error");
        let _ = tokio::fs::remove_file(&part).await;
        return result;
    }

    tokio::fs::rename(&part, dest)
        .await
        .map_err(|e| DownloadError::io(dest.to_path_buf(), e))?;

    let bytes_written = result?;
    info!(path = %dest.display(), bytes = bytes_written, "download complete");
    Ok(bytes_written)
}

/// Resolves and streams in one call; the composition the CLI drives.
///
/// # Errors
///
/// Item-scoped: a resolution failure is logged with a warning and returned
/// without touching the filesystem; streaming errors propagate from
/// [`stream_to_file`].
pub async fn fetch<O: TransferObserver>(
    session: &mut Session,
    item: &CatalogItem,
    format: &str,
    dest: &Path,
    observer: &mut O,
) -> Result<u64, DownloadError> {
    let url = match resolve_url(session, item, format).await {
        Ok(url) => url,
        Err(err) => {
            warn!(title = %item.title, format, "unable to resolve download URL");
            return Err(err);
        }
    };
    info!(title = %item.title, format, "starting download");
    stream_to_file(session, &url, dest, observer).await
}

/// In-progress path for a destination: `<dest>.part`.
fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Copies the response body to the file, returning bytes written.
///
/// Extracted so the caller can clean up the partial file on error.
async fn stream_body<O: TransferObserver>(
    file: File,
    response: reqwest::Response,
    url: &str,
    path: &Path,
    observer: &mut O,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::with_capacity(STREAM_CHUNK_BYTES, file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path.to_path_buf(), e))?;
        bytes_written += chunk.len() as u64;
        observer.on_chunk(chunk.len() as u64);
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(path.to_path_buf(), e))?;

    Ok(bytes_written)
}
