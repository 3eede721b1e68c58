use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub ffmpeg_path: PathBuf,
    pub temp_dir: PathBuf,
    pub audio_bitrate: String,
    pub download_timeout: Duration,
    pub mux_timeout: Duration,
    pub max_download_size: u64,
    pub max_body_size: usize,
    pub mux_max_concurrency: usize,
    pub mux_queue_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            temp_dir: std::env::temp_dir(),
            audio_bitrate: "192k".to_string(),
            download_timeout: Duration::from_secs(120),
            mux_timeout: Duration::from_secs(300),
            max_download_size: 1024 * 1024 * 1024,
            max_body_size: 64 * 1024,
            mux_max_concurrency: 4,
            mux_queue_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse("PORT").unwrap_or(defaults.port);

        let ffmpeg_path = std::env::var("FFMPEG_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.ffmpeg_path);

        let temp_dir = std::env::var("MUX_TEMP_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.temp_dir);

        let audio_bitrate = std::env::var("MUX_AUDIO_BITRATE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.audio_bitrate);

        let download_timeout = env_parse("DOWNLOAD_TIMEOUT_SECONDS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.download_timeout);

        let mux_timeout = env_parse("MUX_TIMEOUT_SECONDS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.mux_timeout);

        let max_download_size = env_parse::<u64>("MAX_DOWNLOAD_SIZE_MB")
            .map(mib_to_bytes)
            .unwrap_or(defaults.max_download_size);

        let max_body_size = env_parse::<usize>("MAX_BODY_SIZE_KB")
            .map(kib_to_bytes)
            .unwrap_or(defaults.max_body_size);

        // A zero-permit semaphore would reject every job.
        let mux_max_concurrency = env_parse::<usize>("MUX_MAX_CONCURRENCY")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.mux_max_concurrency);

        let mux_queue_timeout = env_parse("MUX_QUEUE_TIMEOUT_SECONDS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.mux_queue_timeout);

        Self {
            port,
            ffmpeg_path,
            temp_dir,
            audio_bitrate,
            download_timeout,
            mux_timeout,
            max_download_size,
            max_body_size,
            mux_max_concurrency,
            mux_queue_timeout,
        }
    }
}

fn mib_to_bytes(mb: u64) -> u64 {
    mb.saturating_mul(1024 * 1024)
}

fn kib_to_bytes(kb: usize) -> usize {
    kb.saturating_mul(1024)
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_bounded() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.audio_bitrate, "192k");
        assert!(config.download_timeout > Duration::ZERO);
        assert!(config.mux_timeout > Duration::ZERO);
        assert!(config.mux_max_concurrency > 0);
        assert_eq!(config.max_download_size, 1 << 30);
    }

    #[test]
    fn size_conversions_saturate() {
        assert_eq!(mib_to_bytes(25), 25 * 1024 * 1024);
        assert_eq!(mib_to_bytes(u64::MAX), u64::MAX);
        assert_eq!(kib_to_bytes(64), 64 * 1024);
        assert_eq!(kib_to_bytes(usize::MAX), usize::MAX);
    }
}
