//! Prometheus metrics exporter for the Tibber electricity API.
//!
//! Every request to `/` runs one GraphQL query against Tibber, maps prices and
//! the latest hourly consumption of each home onto gauges and returns the
//! current state of all instruments.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │   HTTP GET /    │────>│     Scraper      │────>│  TibberClient   │
//! │  (exposition)   │<────│ (update_metrics) │<────│ (GraphQL POST)  │
//! └─────────────────┘     └──────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! TIBBER_TOKEN=... tibber-exporter-prometheus --listen :9501
//! ```
//!
//! See [`config::ExporterConfig`] for the optional JSON5 configuration file.

pub mod client;
pub mod config;
pub mod http;
pub mod mapping;
pub mod metrics;
pub mod query;
pub mod scraper;

pub use client::TibberClient;
pub use config::ExporterConfig;
pub use http::HttpServer;
pub use mapping::update_metrics;
pub use metrics::{ExporterMetrics, SharedMetrics};
pub use scraper::Scraper;
