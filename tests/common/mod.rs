#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::to_bytes,
    extract::{Path as UrlPath, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use mux_worker::{config::Config, routes, state::AppState};
use tempfile::TempDir;
use tower::ServiceExt;

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::mux::router())
        .with_state(state)
}

/// Config pointing at a private artifact dir and a stand-in muxer.
pub fn test_config(temp_dir: &Path, ffmpeg: &Path) -> Config {
    Config {
        ffmpeg_path: ffmpeg.to_path_buf(),
        temp_dir: temp_dir.to_path_buf(),
        download_timeout: Duration::from_secs(10),
        mux_timeout: Duration::from_secs(10),
        ..Config::default()
    }
}

pub fn dir_entries(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect()
}

/// Sends `POST /mux` and hands back the response with its body unread.
pub async fn send_mux(app: Router, payload: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .uri("/mux")
            .method("POST")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(payload.to_string()))
            .expect("request"),
    )
    .await
    .expect("response")
}

pub async fn post_mux(app: Router, payload: serde_json::Value) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = send_mux(app, payload).await;

    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    (status, content_type, body.to_vec())
}

pub fn error_message(body: &[u8]) -> String {
    let json: serde_json::Value = serde_json::from_slice(body).expect("json error body");
    json.get("error")
        .and_then(serde_json::Value::as_str)
        .expect("error field")
        .to_string()
}

/// In-process HTTP server standing in for the remote media hosts.
pub struct SourceServer {
    base: String,
}

impl SourceServer {
    pub async fn start(files: &[(&str, &[u8])]) -> Self {
        let files: HashMap<String, Vec<u8>> = files
            .iter()
            .map(|(name, bytes)| (name.to_string(), bytes.to_vec()))
            .collect();

        let app = Router::new()
            .route("/:name", get(serve_file))
            .with_state(Arc::new(files));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind source server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("source server");
        });

        Self {
            base: format!("http://{}", addr),
        }
    }

    pub fn url(&self, name: &str) -> String {
        format!("{}/{}", self.base, name)
    }
}

async fn serve_file(
    State(files): State<Arc<HashMap<String, Vec<u8>>>>,
    UrlPath(name): UrlPath<String>,
) -> Response {
    match files.get(&name) {
        Some(bytes) => (StatusCode::OK, bytes.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Behaviour of the stand-in muxer script.
pub enum FakeMuxer {
    /// Writes video bytes followed by audio bytes to the output.
    Concat,
    /// Writes a partial output, then exits 1.
    Fail,
    /// Never finishes on its own.
    Hang,
}

/// A shell script installed as the muxer. Every invocation appends its
/// arguments to `invocations.log` next to the script.
pub struct FakeMuxerInstall {
    _dir: TempDir,
    pub program: PathBuf,
    pub log: PathBuf,
}

impl FakeMuxerInstall {
    pub fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

#[cfg(unix)]
pub fn install_fake_muxer(kind: FakeMuxer) -> FakeMuxerInstall {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("tool dir");
    let program = dir.path().join("fake-ffmpeg");
    let log = dir.path().join("invocations.log");

    // Arguments are "-y -i VIDEO -i AUDIO ... OUTPUT".
    let action = match kind {
        FakeMuxer::Concat => "cat \"$3\" \"$5\" > \"$out\"",
        FakeMuxer::Fail => "printf partial > \"$out\"\necho 'Invalid data found when processing input' >&2\nexit 1",
        FakeMuxer::Hang => "exec sleep 30",
    };
    let script = format!(
        "#!/bin/sh\necho \"$@\" >> '{}'\nfor arg in \"$@\"; do out=\"$arg\"; done\n{}\n",
        log.display(),
        action
    );
    std::fs::write(&program, script).expect("write script");
    std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    FakeMuxerInstall {
        _dir: dir,
        program,
        log,
    }
}
