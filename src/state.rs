use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    http: reqwest::Client,
    mux_permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("mux-worker/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!("Falling back to default HTTP client: {}", err);
                reqwest::Client::new()
            });
        let mux_permits = Arc::new(Semaphore::new(config.mux_max_concurrency.max(1)));

        Self {
            config: Arc::new(config),
            http,
            mux_permits,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn mux_permits(&self) -> Arc<Semaphore> {
        self.mux_permits.clone()
    }
}
