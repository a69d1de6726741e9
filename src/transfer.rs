//! Streaming HTTP bodies to disk through a partial file.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

/// `dest` with `suffix` appended to its file name.
pub fn with_suffix(dest: &Path, suffix: &str) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    dest.with_file_name(name)
}

/// Write `response` to `partial`, then rename it to `dest`.
///
/// `dest` only ever appears once the body has been fully written, so anything
/// watching the directory can treat `partial` as "still downloading".
/// A failed transfer removes `partial`. Returns the number of bytes written.
pub async fn stream_to_file<E>(
    response: reqwest::Response,
    partial: &Path,
    dest: &Path,
) -> Result<u64, E>
where
    E: From<reqwest::Error> + From<std::io::Error>,
{
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    let result = write_body::<E>(response, partial).await;
    if result.is_err() {
        let _ = fs::remove_file(partial).await;
    }
    let written = result?;

    fs::rename(partial, dest).await?;
    debug!(path = %dest.display(), bytes = written, "download complete");
    Ok(written)
}

async fn write_body<E>(response: reqwest::Response, partial: &Path) -> Result<u64, E>
where
    E: From<reqwest::Error> + From<std::io::Error>,
{
    let mut file = BufWriter::new(File::create(partial).await?);
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
