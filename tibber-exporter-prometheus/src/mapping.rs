//! Mapping from a homes query response to the exporter's instruments.

use std::time::Duration;

use tibber_common::{ConsumptionNode, Home, QueryData};
use tracing::{debug, warn};

use crate::metrics::{
    CostLabels, ExporterMetrics, HomeInfoLabels, HomeLabels, PriceKind, PriceLabels,
};

/// Consumption unit the API is expected to report.
pub const EXPECTED_CONSUMPTION_UNIT: &str = "kWh";

/// Divisor applied to reported consumption.
pub const CONSUMPTION_SCALE: f64 = 1000.0;

/// Apply one scrape result to the instruments.
///
/// Gauges are overwritten, never cleared, so series of homes that vanish from
/// the response keep their last value.
pub fn update_metrics(metrics: &ExporterMetrics, data: &QueryData, scrape_duration: Duration) {
    metrics.requests.inc();
    metrics.scrape_duration.set(scrape_duration.as_secs_f64());

    for home in &data.viewer.homes {
        record_home(metrics, home);
    }
}

fn record_home(metrics: &ExporterMetrics, home: &Home) {
    metrics.home_info.get_or_create(&home_info_labels(home)).set(1);

    let current_currency = match home.current_price() {
        Some(price) => {
            metrics
                .current_price
                .get_or_create(&PriceLabels::new(&home.id, PriceKind::Energy, &price.currency))
                .set(price.energy);
            metrics
                .current_price
                .get_or_create(&PriceLabels::new(&home.id, PriceKind::Tax, &price.currency))
                .set(price.tax);
            Some(price.currency.as_str())
        }
        None => {
            warn!(home_id = %home.id, "Home has no current price, skipping price metrics");
            None
        }
    };

    // Only the most recent node is reported.
    if let Some(node) = home.consumption_nodes().first() {
        record_last_period(metrics, &home.id, node, current_currency);
    }
}

fn record_last_period(
    metrics: &ExporterMetrics,
    home_id: &str,
    node: &ConsumptionNode,
    fallback_currency: Option<&str>,
) {
    if node.consumption_unit != EXPECTED_CONSUMPTION_UNIT {
        warn!(
            home_id,
            unit = %node.consumption_unit,
            expected = EXPECTED_CONSUMPTION_UNIT,
            "Unexpected consumption unit"
        );
    }

    match node.consumption {
        Some(consumption) => {
            metrics
                .last_period_consumption
                .get_or_create(&HomeLabels::new(home_id))
                .set(scale_consumption(consumption));
        }
        None => debug!(home_id, from = %node.from, "Consumption not metered yet"),
    }

    let currency = node
        .currency
        .as_deref()
        .or(fallback_currency)
        .unwrap_or_default();

    if let Some(unit_price) = node.unit_price {
        metrics
            .last_period_price
            .get_or_create(&PriceLabels::new(home_id, PriceKind::Energy, currency))
            .set(unit_price);
    }

    if let Some(unit_price_vat) = node.unit_price_vat {
        metrics
            .last_period_price
            .get_or_create(&PriceLabels::new(home_id, PriceKind::Vat, currency))
            .set(unit_price_vat);
    }

    if let Some(total_cost) = node.total_cost {
        metrics
            .last_period_total_cost
            .get_or_create(&CostLabels::new(home_id, currency))
            .set(total_cost);
    }
}

/// Convert a reported consumption value to the exported scale.
pub fn scale_consumption(value: f64) -> f64 {
    value / CONSUMPTION_SCALE
}

fn home_info_labels(home: &Home) -> HomeInfoLabels {
    let address = &home.address;

    HomeInfoLabels {
        home_id: home.id.clone(),
        time_zone: home.time_zone.clone(),
        address1: address.address1.clone(),
        address2: address.address2.clone().unwrap_or_default(),
        address3: address.address3.clone().unwrap_or_default(),
        postal_code: address.postal_code.clone(),
        city: address.city.clone(),
        country: address.country.clone(),
        latitude: address.latitude.clone(),
        longitude: address.longitude.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use prometheus_client::metrics::family::Family;
    use tibber_common::{Address, Consumption, Price, PriceInfo, Subscription, Viewer};

    use crate::metrics::FloatGauge;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    /// In-memory log sink for asserting on emitted events.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    /// Run `f` with a subscriber capturing WARN and above.
    fn capture_warnings(f: impl FnOnce()) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, f);
        buffer.contents()
    }

    fn make_node(consumption: f64, unit: &str, unit_price: f64) -> ConsumptionNode {
        ConsumptionNode {
            from: DateTime::parse_from_rfc3339("2024-01-15T11:00:00+01:00").unwrap(),
            to: DateTime::parse_from_rfc3339("2024-01-15T12:00:00+01:00").unwrap(),
            total_cost: Some(unit_price),
            unit_cost: Some(unit_price),
            unit_price: Some(unit_price),
            unit_price_vat: Some(unit_price * 1.25),
            consumption: Some(consumption),
            consumption_unit: unit.to_string(),
            currency: Some("NOK".to_string()),
        }
    }

    fn make_home(id: &str, nodes: Vec<ConsumptionNode>) -> Home {
        Home {
            id: id.to_string(),
            time_zone: "Europe/Oslo".to_string(),
            address: Address {
                address1: "Storgata 1".to_string(),
                postal_code: "0155".to_string(),
                city: "Oslo".to_string(),
                country: "NO".to_string(),
                latitude: "59.91".to_string(),
                longitude: "10.75".to_string(),
                ..Address::default()
            },
            owner: None,
            current_subscription: Some(Subscription {
                price_info: Some(PriceInfo {
                    current: Some(Price {
                        total: 0.6,
                        energy: 0.5,
                        tax: 0.1,
                        currency: "NOK".to_string(),
                        starts_at: DateTime::parse_from_rfc3339("2024-01-15T13:00:00+01:00")
                            .unwrap(),
                        level: Some("NORMAL".to_string()),
                    }),
                }),
            }),
            consumption: Some(Consumption { nodes }),
        }
    }

    fn make_data(homes: Vec<Home>) -> QueryData {
        QueryData {
            viewer: Viewer {
                name: Some("Ola Nordmann".to_string()),
                homes,
            },
        }
    }

    fn price(family: &Family<PriceLabels, FloatGauge>, kind: PriceKind) -> f64 {
        family
            .get_or_create(&PriceLabels::new("h1", kind, "NOK"))
            .get()
    }

    fn consumption(metrics: &ExporterMetrics, home_id: &str) -> f64 {
        metrics
            .last_period_consumption
            .get_or_create(&HomeLabels::new(home_id))
            .get()
    }

    #[test]
    fn test_zero_homes_only_touches_scrape_metrics() {
        let metrics = ExporterMetrics::new();

        update_metrics(&metrics, &make_data(vec![]), Duration::from_millis(250));

        assert_eq!(metrics.requests.get(), 1);
        assert_eq!(metrics.scrape_duration.get(), 0.25);

        let output = metrics.render().unwrap();
        assert!(!output.contains("home_id="), "Output: {}", output);
    }

    #[test]
    fn test_empty_consumption_skips_last_period() {
        let metrics = ExporterMetrics::new();
        let data = make_data(vec![make_home("h1", vec![])]);

        update_metrics(&metrics, &data, Duration::from_secs(1));

        let output = metrics.render().unwrap();
        assert!(output.contains(r#"tibber_home_info{home_id="h1""#));
        assert!(output.contains(r#"tibber_current_price{home_id="h1",type="energy""#));
        assert!(!output.contains("tibber_last_period_consumption{"));
        assert!(!output.contains("tibber_last_period_price{"));
        assert!(!output.contains("tibber_last_period_total_cost{"));
    }

    #[test]
    fn test_empty_consumption_keeps_previous_values() {
        let metrics = ExporterMetrics::new();

        let first = make_data(vec![make_home("h1", vec![make_node(3000.0, "kWh", 0.4)])]);
        update_metrics(&metrics, &first, Duration::from_secs(1));

        let second = make_data(vec![make_home("h1", vec![])]);
        update_metrics(&metrics, &second, Duration::from_secs(1));

        assert_eq!(consumption(&metrics, "h1"), 3.0);
    }

    #[test]
    fn test_only_first_node_is_used() {
        let metrics = ExporterMetrics::new();
        let data = make_data(vec![make_home(
            "h1",
            vec![
                make_node(1000.0, "kWh", 0.4),
                make_node(9000.0, "kWh", 9.0),
                make_node(7000.0, "kWh", 7.0),
            ],
        )]);

        update_metrics(&metrics, &data, Duration::from_secs(1));

        assert_eq!(consumption(&metrics, "h1"), 1.0);
        assert_eq!(price(&metrics.last_period_price, PriceKind::Energy), 0.4);
    }

    #[test]
    fn test_consumption_conversion() {
        let metrics = ExporterMetrics::new();
        let data = make_data(vec![make_home("h1", vec![make_node(2500.0, "kWh", 0.4)])]);

        update_metrics(&metrics, &data, Duration::from_secs(1));

        assert_eq!(consumption(&metrics, "h1"), 2.5);
    }

    #[test]
    fn test_unit_mismatch_still_emits() {
        let metrics = ExporterMetrics::new();
        let data = make_data(vec![make_home("h1", vec![make_node(4000.0, "MWh", 0.4)])]);

        update_metrics(&metrics, &data, Duration::from_secs(1));

        assert_eq!(consumption(&metrics, "h1"), 4.0);
    }

    #[test]
    fn test_unit_mismatch_logs_warning() {
        let metrics = ExporterMetrics::new();
        let data = make_data(vec![make_home("h1", vec![make_node(4000.0, "MWh", 0.4)])]);

        let logs = capture_warnings(|| update_metrics(&metrics, &data, Duration::from_secs(1)));

        assert!(logs.contains("WARN"), "Logs: {}", logs);
        assert!(logs.contains("Unexpected consumption unit"), "Logs: {}", logs);
        assert!(logs.contains("MWh"), "Logs: {}", logs);
        assert!(!logs.contains("ERROR"), "Logs: {}", logs);
        assert_eq!(consumption(&metrics, "h1"), 4.0);
    }

    #[test]
    fn test_expected_unit_logs_nothing() {
        let metrics = ExporterMetrics::new();
        let data = make_data(vec![make_home("h1", vec![make_node(4000.0, "kWh", 0.4)])]);

        let logs = capture_warnings(|| update_metrics(&metrics, &data, Duration::from_secs(1)));

        assert!(!logs.contains("Unexpected consumption unit"), "Logs: {}", logs);
    }

    #[test]
    fn test_null_consumption_sets_prices_only() {
        let metrics = ExporterMetrics::new();
        let mut node = make_node(0.0, "kWh", 0.4);
        node.consumption = None;
        node.total_cost = None;

        update_metrics(
            &metrics,
            &make_data(vec![make_home("h1", vec![node])]),
            Duration::from_secs(1),
        );

        let output = metrics.render().unwrap();
        assert!(!output.contains("tibber_last_period_consumption{"));
        assert!(!output.contains("tibber_last_period_total_cost{"));
        assert!(
            output.contains(r#"tibber_last_period_price{home_id="h1",type="vat",currency="NOK"}"#)
        );
    }

    #[test]
    fn test_node_currency_falls_back_to_current_price() {
        let metrics = ExporterMetrics::new();
        let mut node = make_node(1000.0, "kWh", 0.4);
        node.currency = None;

        update_metrics(
            &metrics,
            &make_data(vec![make_home("h1", vec![node])]),
            Duration::from_secs(1),
        );

        assert_eq!(
            metrics
                .last_period_total_cost
                .get_or_create(&CostLabels::new("h1", "NOK"))
                .get(),
            0.4
        );
    }

    #[test]
    fn test_home_without_subscription() {
        let metrics = ExporterMetrics::new();
        let mut home = make_home("h1", vec![]);
        home.current_subscription = None;

        update_metrics(&metrics, &make_data(vec![home]), Duration::from_secs(1));

        let output = metrics.render().unwrap();
        assert!(output.contains(r#"tibber_home_info{home_id="h1""#));
        assert!(!output.contains("tibber_current_price{"));
    }

    #[test]
    fn test_idempotent_apart_from_counter() {
        let metrics = ExporterMetrics::new();
        let data = make_data(vec![
            make_home("h1", vec![make_node(1500.0, "kWh", 0.4)]),
            make_home("h2", vec![]),
        ]);

        update_metrics(&metrics, &data, Duration::from_millis(500));
        let first = metrics.render().unwrap();

        update_metrics(&metrics, &data, Duration::from_millis(500));
        let second = metrics.render().unwrap();

        assert_eq!(metrics.requests.get(), 2);
        assert_eq!(
            first.replace("tibber_requests_total 1", "tibber_requests_total 2"),
            second
        );
    }

    #[test]
    fn test_home_info_labels() {
        let home = make_home("h1", vec![]);
        let labels = home_info_labels(&home);

        assert_eq!(labels.home_id, "h1");
        assert_eq!(labels.time_zone, "Europe/Oslo");
        assert_eq!(labels.city, "Oslo");
        assert_eq!(labels.address2, "");
        assert_eq!(labels.latitude, "59.91");
    }

    #[test]
    fn test_sample_response() {
        let metrics = ExporterMetrics::new();
        let mut node = make_node(1000.0, "kWh", 0.4);
        node.unit_price_vat = Some(0.45);
        node.total_cost = Some(0.4);

        update_metrics(
            &metrics,
            &make_data(vec![make_home("h1", vec![node])]),
            Duration::from_secs(1),
        );

        assert_eq!(price(&metrics.current_price, PriceKind::Energy), 0.5);
        assert_eq!(price(&metrics.current_price, PriceKind::Tax), 0.1);
        assert_eq!(consumption(&metrics, "h1"), 1.0);
        assert_eq!(price(&metrics.last_period_price, PriceKind::Energy), 0.4);
        assert_eq!(price(&metrics.last_period_price, PriceKind::Vat), 0.45);
        assert_eq!(
            metrics
                .last_period_total_cost
                .get_or_create(&CostLabels::new("h1", "NOK"))
                .get(),
            0.4
        );
    }
}
