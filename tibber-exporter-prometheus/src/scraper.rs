//! One fetch-and-map cycle.

use std::sync::Arc;
use std::time::Instant;

use tibber_common::Result;
use tracing::info;

use crate::client::TibberClient;
use crate::mapping::update_metrics;
use crate::metrics::SharedMetrics;

/// Runs the homes query and applies the result to the instruments.
#[derive(Clone)]
pub struct Scraper {
    client: Arc<TibberClient>,
    metrics: SharedMetrics,
}

impl Scraper {
    pub fn new(client: TibberClient, metrics: SharedMetrics) -> Self {
        Self {
            client: Arc::new(client),
            metrics,
        }
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Fetch once and update the instruments.
    ///
    /// Only the upstream call is timed. Nothing is updated when it fails.
    pub async fn scrape(&self) -> Result<()> {
        let start = Instant::now();
        let data = self.client.fetch().await?;
        let elapsed = start.elapsed();

        update_metrics(&self.metrics, &data, elapsed);

        info!(
            homes = data.viewer.homes.len(),
            duration_ms = elapsed.as_millis() as u64,
            "Update OK"
        );
        Ok(())
    }
}
