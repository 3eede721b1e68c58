use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, Url};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::DownloadError;

/// Limits applied to a single source download.
#[derive(Debug, Clone, Copy)]
pub struct DownloadLimits {
    pub max_bytes: u64,
    pub timeout: Duration,
}

/// Fetches `url` into `file` (already created at `dest`), writing chunks as
/// they arrive. Returns the number of bytes written.
pub async fn fetch_to_file(
    client: &Client,
    url: &str,
    file: File,
    dest: &Path,
    limits: DownloadLimits,
) -> Result<u64, DownloadError> {
    let download = stream_to_file(client, url, file, dest, limits.max_bytes);
    match tokio::time::timeout(limits.timeout, download).await {
        Ok(result) => result,
        Err(_) => Err(DownloadError::TimedOut {
            url: url.to_string(),
            after: limits.timeout,
        }),
    }
}

async fn stream_to_file(
    client: &Client,
    url: &str,
    mut file: File,
    dest: &Path,
    max_bytes: u64,
) -> Result<u64, DownloadError> {
    let parsed = parse_source_url(url)?;

    let response = client
        .get(parsed)
        .send()
        .await
        .map_err(|source| DownloadError::Request {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    if let Some(length) = response.content_length() {
        if length > max_bytes {
            return Err(DownloadError::TooLarge {
                url: url.to_string(),
                limit: max_bytes,
            });
        }
    }

    let io_error = |source: std::io::Error| DownloadError::Io {
        path: dest.to_path_buf(),
        source,
    };

    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| DownloadError::Request {
            url: url.to_string(),
            source,
        })?;
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(DownloadError::TooLarge {
                url: url.to_string(),
                limit: max_bytes,
            });
        }
        file.write_all(&chunk).await.map_err(io_error)?;
    }
    file.flush().await.map_err(io_error)?;

    if written == 0 {
        return Err(DownloadError::EmptyBody {
            url: url.to_string(),
        });
    }

    tracing::debug!("Downloaded {} bytes from {} to {}", written, url, dest.display());
    Ok(written)
}

fn parse_source_url(url: &str) -> Result<Url, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::InvalidUrl {
        url: url.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(DownloadError::UnsupportedScheme {
            url: url.to_string(),
        }),
    }
}
