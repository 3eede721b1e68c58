use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::config::Config;
use crate::error::MuxToolError;

const STDERR_TAIL_LINES: usize = 20;

/// How to run the external muxer.
#[derive(Debug, Clone)]
pub struct MuxTool {
    pub program: PathBuf,
    pub audio_bitrate: String,
    pub timeout: Duration,
}

impl MuxTool {
    pub fn from_config(config: &Config) -> Self {
        Self {
            program: config.ffmpeg_path.clone(),
            audio_bitrate: config.audio_bitrate.clone(),
            timeout: config.mux_timeout,
        }
    }

    /// Muxes the video stream of `video` with the audio stream of `audio`
    /// into `output`. The child is killed if the timeout elapses.
    pub async fn run(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), MuxToolError> {
        let mut command = Command::new(&self.program);
        command
            .args(mux_args(video, audio, output, &self.audio_bitrate))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|source| MuxToolError::Launch {
            program: self.program.display().to_string(),
            source,
        })?;

        let finished = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(MuxToolError::TimedOut {
                    after: self.timeout,
                })
            }
        };

        if !finished.status.success() {
            return Err(MuxToolError::Failed {
                status: finished.status,
                stderr: stderr_tail(&finished.stderr),
            });
        }

        Ok(())
    }

    /// Runs `<program> -version` and returns the first line of its output.
    pub async fn probe(&self) -> Result<String, MuxToolError> {
        let output = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| MuxToolError::Launch {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(MuxToolError::Failed {
                status: output.status,
                stderr: stderr_tail(&output.stderr),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string())
    }
}

/// Overwrite the output, take the first input's video and the second input's
/// audio, copy video, re-encode audio at `audio_bitrate`, stop at the shorter
/// input.
pub fn mux_args(video: &Path, audio: &Path, output: &Path, audio_bitrate: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(18);
    args.push("-y".into());
    args.push("-i".into());
    args.push(video.into());
    args.push("-i".into());
    args.push(audio.into());
    for flag in [
        "-map", "0:v:0",
        "-map", "1:a:0",
        "-c:v", "copy",
        "-c:a", "aac",
        "-b:a", audio_bitrate,
        "-shortest",
    ] {
        args.push(flag.into());
    }
    args.push(output.into());
    args
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
