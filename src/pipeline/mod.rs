pub mod artifacts;
pub mod download;
pub mod mux;

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Bytes;
use futures_util::Stream;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::config::Config;
use crate::error::{AppError, DownloadError, MuxToolError};
use artifacts::{ArtifactKind, TempArtifacts};
use download::DownloadLimits;
use mux::MuxTool;

#[derive(Debug, Clone)]
pub struct MuxRequest {
    pub video_url: String,
    pub audio_url: String,
}

/// A finished mux job: the open output file plus the artifacts that must
/// outlive the response body.
#[derive(Debug)]
pub struct MuxOutput {
    file: File,
    len: u64,
    artifacts: TempArtifacts,
}

impl MuxOutput {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Streams the output file. Artifacts are removed when the stream is
    /// dropped, whether or not it ran to completion.
    pub fn into_stream(self) -> OutputStream {
        OutputStream {
            inner: ReaderStream::new(self.file),
            sent: 0,
            len: self.len,
            artifacts: self.artifacts,
        }
    }
}

/// Downloads both sources, runs the muxer and opens its output.
#[tracing::instrument(
    name = "mux_job",
    skip_all,
    fields(token = tracing::field::Empty, video_url = %request.video_url, audio_url = %request.audio_url)
)]
pub async fn combine(
    client: &reqwest::Client,
    config: &Config,
    request: &MuxRequest,
) -> Result<MuxOutput, AppError> {
    let artifacts = TempArtifacts::allocate(&config.temp_dir);
    tracing::Span::current().record("token", artifacts.token());
    tracing::info!("Starting mux job {}", artifacts.token());

    let limits = DownloadLimits {
        max_bytes: config.max_download_size,
        timeout: config.download_timeout,
    };
    let video_file = create_source(&artifacts, ArtifactKind::Video)?;
    let audio_file = create_source(&artifacts, ArtifactKind::Audio)?;

    // Both downloads run to the end (each bounded by its timeout); neither
    // future is dropped halfway through.
    let (video, audio) = tokio::join!(
        download::fetch_to_file(client, &request.video_url, video_file, artifacts.video(), limits),
        download::fetch_to_file(client, &request.audio_url, audio_file, artifacts.audio(), limits),
    );
    let video_bytes = video?;
    let audio_bytes = audio?;
    tracing::info!(
        "Downloaded sources for {} (video {} bytes, audio {} bytes)",
        artifacts.token(),
        video_bytes,
        audio_bytes
    );

    MuxTool::from_config(config)
        .run(artifacts.video(), artifacts.audio(), artifacts.output())
        .await?;

    let file = File::open(artifacts.output())
        .await
        .map_err(MuxToolError::from)?;
    let len = file.metadata().await.map_err(MuxToolError::from)?.len();
    if len == 0 {
        return Err(MuxToolError::EmptyOutput.into());
    }

    tracing::info!("Mux job {} produced {} bytes", artifacts.token(), len);
    Ok(MuxOutput {
        file,
        len,
        artifacts,
    })
}

fn create_source(artifacts: &TempArtifacts, kind: ArtifactKind) -> Result<File, DownloadError> {
    artifacts.create(kind).map_err(|source| DownloadError::Io {
        path: artifacts.path(kind).to_path_buf(),
        source,
    })
}

pub struct OutputStream {
    inner: ReaderStream<File>,
    sent: u64,
    len: u64,
    artifacts: TempArtifacts,
}

impl Stream for OutputStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                tracing::error!(
                    "Streaming output of {} failed after {} bytes: {}",
                    this.artifacts.token(),
                    this.sent,
                    err
                );
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                tracing::debug!(
                    "Streamed {}/{} bytes for {}",
                    this.sent,
                    this.len,
                    this.artifacts.token()
                );
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        if self.sent < self.len {
            tracing::warn!(
                "Response for {} dropped after {}/{} bytes",
                self.artifacts.token(),
                self.sent,
                self.len
            );
        }
    }
}
