//! Dashboard export side channel
//!
//! Posts telemetry, patterns and predictions to an HTTP dashboard. This is
//! a downstream consumer only; export failures are logged and never
//! propagated to the monitoring loop.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use url::Url;

use crate::models::TelemetrySnapshot;
use crate::patterns::DetectedPattern;
use crate::predictor::SimplePrediction;

/// HTTP client for the dashboard endpoint
pub struct DashboardClient {
    client: Client,
    base_url: Url,
}

impl DashboardClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid dashboard URL")?;

        Ok(Self { client, base_url })
    }

    pub async fn post_snapshot(&self, snapshot: &TelemetrySnapshot) -> Result<()> {
        self.post_json("api/telemetry", snapshot).await
    }

    pub async fn post_patterns(&self, patterns: &[DetectedPattern]) -> Result<()> {
        self.post_json("api/patterns", &patterns).await
    }

    pub async fn post_prediction(&self, prediction: &SimplePrediction) -> Result<()> {
        self.post_json("api/predictions", prediction).await
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Dashboard error ({}): {}", status, body);
        }

        Ok(())
    }
}
