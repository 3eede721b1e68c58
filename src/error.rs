use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },
    #[error("Unsupported URL scheme: {url}")]
    UnsupportedScheme { url: String },
    #[error("Failed to download {url}: HTTP {status}")]
    Status { status: u16, url: String },
    #[error("Failed to download {url}: empty response body")]
    EmptyBody { url: String },
    #[error("Failed to download {url}: larger than {limit} bytes")]
    TooLarge { url: String, limit: u64 },
    #[error("Failed to download {url}: timed out after {after:?}")]
    TimedOut { url: String, after: Duration },
    #[error("Failed to download {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum MuxToolError {
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Muxer failed ({status})")]
    Failed { status: ExitStatus, stderr: String },
    #[error("Muxer timed out after {after:?}")]
    TimedOut { after: Duration },
    #[error("Muxer produced no output")]
    EmptyOutput,
    #[error("Muxer I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Mux(#[from] MuxToolError),
    #[error("Mux worker is busy, try again later")]
    Busy,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Download(_) | AppError::Mux(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            AppError::Mux(MuxToolError::Failed { status: exit, stderr }) => {
                tracing::error!("Muxer exited with {}: {}", exit, stderr);
            }
            err if status.is_server_error() => tracing::error!("Request failed: {}", err),
            err => tracing::debug!("Request rejected: {}", err),
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
