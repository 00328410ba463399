use crate::{
    config::Config,
    fetcher::{Fetch, HttpFetcher},
    metrics,
    proxy::ProxyService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Proxy operations over the shared upstream client
    pub proxy: ProxyService,
    /// Prometheus handle rendered at `/metrics`, if the recorder is ours
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create state with the production `reqwest` fetcher.
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let fetcher = HttpFetcher::new(&config.http)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Create state around any [`Fetch`] implementation.
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            config: Arc::new(config),
            proxy: ProxyService::new(fetcher),
            metrics: metrics::init(),
        }
    }
}
