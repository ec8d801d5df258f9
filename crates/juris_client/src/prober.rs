//! Readiness probe and wake signal against `GET {api_url}/health/`.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Availability checks for a service that may be cold-started.
///
/// Neither operation may fail: transport errors become `false` (probe) or are dropped (wake).
pub trait Readiness {
    /// True only on an explicit 2xx from the health endpoint.
    fn probe(&self) -> impl Future<Output = bool> + Send;

    /// Best-effort request that makes a sleeping service start initializing.
    fn wake(&self) -> impl Future<Output = ()> + Send;
}

/// [`Readiness`] over HTTP with a short per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    health_url: String,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(client: reqwest::Client, api_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            health_url: format!("{}/health/", api_url.trim_end_matches('/')),
            timeout,
        }
    }

    pub fn health_url(&self) -> &str {
        &self.health_url
    }
}

impl Readiness for HttpProber {
    async fn probe(&self) -> bool {
        match self
            .client
            .get(&self.health_url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => {
                debug!(status = %response.status(), url = %self.health_url, "health probe");
                response.status().is_success()
            }
            Err(e) => {
                debug!(error = %e, url = %self.health_url, "health probe failed");
                false
            }
        }
    }

    async fn wake(&self) {
        let result = self
            .client
            .get(&self.health_url)
            .timeout(self.timeout)
            .send()
            .await;
        if let Err(e) = result {
            debug!(error = %e, "wake request failed");
        }
    }
}
