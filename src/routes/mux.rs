use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tokio::sync::OwnedSemaphorePermit;

use crate::error::AppError;
use crate::pipeline::{self, MuxRequest};
use crate::state::AppState;

pub const MISSING_URLS: &str = "videoUrl and audioUrl required";

pub fn router() -> Router<AppState> {
    Router::new().route("/mux", post(mux))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MuxBody {
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    audio_url: Option<String>,
}

impl TryFrom<MuxBody> for MuxRequest {
    type Error = AppError;

    fn try_from(body: MuxBody) -> Result<Self, Self::Error> {
        let present = |value: Option<String>| {
            value
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        match (present(body.video_url), present(body.audio_url)) {
            (Some(video_url), Some(audio_url)) => Ok(MuxRequest {
                video_url,
                audio_url,
            }),
            _ => Err(AppError::Validation(MISSING_URLS.to_string())),
        }
    }
}

async fn mux(
    State(state): State<AppState>,
    payload: Result<Json<MuxBody>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload.map_err(|rejection| {
        tracing::debug!("Unreadable mux body: {}", rejection.body_text());
        AppError::Validation(MISSING_URLS.to_string())
    })?;
    let request = MuxRequest::try_from(body)?;

    // The slot covers downloads and the muxer, not the response transfer.
    let permit = acquire_slot(&state).await?;
    let output = pipeline::combine(state.http(), state.config(), &request).await;
    drop(permit);
    let output = output?;

    let len = output.len();
    let body = Body::from_stream(output.into_stream());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("video/mp4")),
            (header::CONTENT_LENGTH, HeaderValue::from(len)),
        ],
        body,
    )
        .into_response())
}

async fn acquire_slot(state: &AppState) -> Result<OwnedSemaphorePermit, AppError> {
    let wait = state.config().mux_queue_timeout;
    match tokio::time::timeout(wait, state.mux_permits().acquire_owned()).await {
        Ok(Ok(permit)) => Ok(permit),
        Ok(Err(_)) => Err(AppError::Internal("mux slots closed".to_string())),
        Err(_) => {
            tracing::warn!("No mux slot freed up within {:?}", wait);
            Err(AppError::Busy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(video: Option<&str>, audio: Option<&str>) -> MuxBody {
        MuxBody {
            video_url: video.map(str::to_string),
            audio_url: audio.map(str::to_string),
        }
    }

    #[test]
    fn both_urls_are_required() {
        for (video, audio) in [
            (None, Some("http://a")),
            (Some("http://v"), None),
            (None, None),
            (Some("   "), Some("http://a")),
        ] {
            let err = MuxRequest::try_from(body(video, audio)).expect_err("should reject");
            assert_eq!(err.to_string(), MISSING_URLS);
        }
    }

    #[test]
    fn urls_are_trimmed() {
        let request =
            MuxRequest::try_from(body(Some(" http://v/x.mp4 "), Some("http://a/y.mp3"))).expect("valid");
        assert_eq!(request.video_url, "http://v/x.mp4");
        assert_eq!(request.audio_url, "http://a/y.mp3");
    }
}
