//! Metric instruments exposed by the exporter.
//!
//! All instruments live in one [`ExporterMetrics`] value that owns its own
//! [`Registry`]. It is created once in `main` and shared with the HTTP layer.

use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue, LabelValueEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// Metric name prefix.
pub const NAMESPACE: &str = "tibber";

/// Gauge holding a floating point value.
pub type FloatGauge = Gauge<f64, AtomicU64>;

/// Shared handle to the exporter metrics.
pub type SharedMetrics = Arc<ExporterMetrics>;

/// Value of the `type` label on price gauges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceKind {
    Energy,
    Tax,
    Vat,
}

impl PriceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceKind::Energy => "energy",
            PriceKind::Tax => "tax",
            PriceKind::Vat => "vat",
        }
    }
}

impl EncodeLabelValue for PriceKind {
    fn encode(&self, encoder: &mut LabelValueEncoder) -> Result<(), std::fmt::Error> {
        encoder.write_str(self.as_str())
    }
}

/// Static identity of a home.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
pub struct HomeInfoLabels {
    pub home_id: String,
    pub time_zone: String,
    pub address1: String,
    pub address2: String,
    pub address3: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    pub latitude: String,
    pub longitude: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
pub struct PriceLabels {
    pub home_id: String,
    pub r#type: PriceKind,
    pub currency: String,
}

impl PriceLabels {
    pub fn new(home_id: &str, kind: PriceKind, currency: &str) -> Self {
        Self {
            home_id: home_id.to_string(),
            r#type: kind,
            currency: currency.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
pub struct HomeLabels {
    pub home_id: String,
}

impl HomeLabels {
    pub fn new(home_id: &str) -> Self {
        Self {
            home_id: home_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
pub struct CostLabels {
    pub home_id: String,
    pub currency: String,
}

impl CostLabels {
    pub fn new(home_id: &str, currency: &str) -> Self {
        Self {
            home_id: home_id.to_string(),
            currency: currency.to_string(),
        }
    }
}

/// Registry plus every instrument the mapper writes to.
#[derive(Debug)]
pub struct ExporterMetrics {
    registry: Registry,

    /// Scrapes served.
    pub requests: Counter,
    /// Duration of the last upstream fetch, in seconds.
    pub scrape_duration: FloatGauge,
    pub home_info: Family<HomeInfoLabels, Gauge>,
    pub current_price: Family<PriceLabels, FloatGauge>,
    pub last_period_consumption: Family<HomeLabels, FloatGauge>,
    pub last_period_price: Family<PriceLabels, FloatGauge>,
    pub last_period_total_cost: Family<CostLabels, FloatGauge>,
}

impl ExporterMetrics {
    /// Create and register all instruments.
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix(NAMESPACE);

        let requests = Counter::default();
        registry.register(
            "requests",
            "Number of requests done by exporter",
            requests.clone(),
        );

        let scrape_duration = FloatGauge::default();
        registry.register(
            "scrape_duration_seconds",
            "Scrape duration of last scrape",
            scrape_duration.clone(),
        );

        let home_info = Family::<HomeInfoLabels, Gauge>::default();
        registry.register(
            "home_info",
            "Static information about a home, always 1",
            home_info.clone(),
        );

        let current_price = Family::<PriceLabels, FloatGauge>::default();
        registry.register(
            "current_price",
            "Current energy and tax price per kWh",
            current_price.clone(),
        );

        let last_period_consumption = Family::<HomeLabels, FloatGauge>::default();
        registry.register(
            "last_period_consumption",
            "Consumption during the most recent metered hour",
            last_period_consumption.clone(),
        );

        let last_period_price = Family::<PriceLabels, FloatGauge>::default();
        registry.register(
            "last_period_price",
            "Unit price of the most recent metered hour, without (energy) and with (vat) tax",
            last_period_price.clone(),
        );

        let last_period_total_cost = Family::<CostLabels, FloatGauge>::default();
        registry.register(
            "last_period_total_cost",
            "Total cost of the most recent metered hour",
            last_period_total_cost.clone(),
        );

        Self {
            registry,
            requests,
            scrape_duration,
            home_info,
            current_price,
            last_period_consumption,
            last_period_price,
            last_period_total_cost,
        }
    }

    /// Encode the current value of every instrument in text exposition format.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new()
    }
}
