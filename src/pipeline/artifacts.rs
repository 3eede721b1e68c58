use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Video,
    Audio,
    Output,
}

impl ArtifactKind {
    fn slot(self) -> usize {
        match self {
            ArtifactKind::Video => 0,
            ArtifactKind::Audio => 1,
            ArtifactKind::Output => 2,
        }
    }

    fn file_suffix(self) -> &'static str {
        match self {
            ArtifactKind::Video => "video",
            ArtifactKind::Audio => "audio",
            // ffmpeg picks the container from the output extension.
            ArtifactKind::Output => "output.mp4",
        }
    }
}

#[derive(Debug)]
pub struct TemporaryArtifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

/// The three files one mux job may create. Dropping the set deletes whichever
/// of them exist, so every exit path of a job releases its files.
#[derive(Debug)]
pub struct TempArtifacts {
    token: String,
    artifacts: [TemporaryArtifact; 3],
}

impl TempArtifacts {
    pub fn allocate(dir: &Path) -> Self {
        let token = unique_token();
        let artifact = |kind: ArtifactKind| TemporaryArtifact {
            path: dir.join(format!("mux-{}-{}", token, kind.file_suffix())),
            kind,
        };
        let artifacts = [
            artifact(ArtifactKind::Video),
            artifact(ArtifactKind::Audio),
            artifact(ArtifactKind::Output),
        ];

        Self { token, artifacts }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn path(&self, kind: ArtifactKind) -> &Path {
        &self.artifacts[kind.slot()].path
    }

    pub fn video(&self) -> &Path {
        self.path(ArtifactKind::Video)
    }

    pub fn audio(&self) -> &Path {
        self.path(ArtifactKind::Audio)
    }

    pub fn output(&self) -> &Path {
        self.path(ArtifactKind::Output)
    }

    /// Creates the file for `kind` before returning, so no in-flight blocking
    /// task can recreate it after the guard has been dropped.
    pub fn create(&self, kind: ArtifactKind) -> std::io::Result<tokio::fs::File> {
        let file = std::fs::File::create(self.path(kind))?;
        Ok(tokio::fs::File::from_std(file))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TemporaryArtifact> {
        self.artifacts.iter()
    }

    // Blocking unlinks on the calling thread: Drop cannot await, and the
    // files must be gone once the guard is.
    fn remove_all(&self) {
        for artifact in &self.artifacts {
            match std::fs::remove_file(&artifact.path) {
                Ok(()) => tracing::debug!("Removed {:?} artifact {}", artifact.kind, artifact.path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => tracing::warn!(
                    "Failed to remove {:?} artifact {}: {}",
                    artifact.kind,
                    artifact.path.display(),
                    err
                ),
            }
        }
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        self.remove_all();
    }
}

/// Millisecond timestamp plus a random suffix, so concurrent jobs never share
/// a name without any shared counter.
fn unique_token() -> String {
    format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}
