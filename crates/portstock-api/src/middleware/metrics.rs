//! # Prometheus Metrics
//!
//! HTTP-level metrics (request counts, latency, errors) are recorded in middleware.
//! Inventory gauges (items, low-stock items, units per terminal, movements,
//! active sessions) are updated on each `/metrics` scrape (pull model); see
//! the metrics handler in `lib.rs`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{
    core::Collector, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts,
    Registry, TextEncoder,
};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    // -- HTTP middleware metrics (push model) --
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    // -- Inventory gauges (pull model, updated on /metrics scrape) --
    items_total: Gauge,
    low_stock_items: Gauge,
    stock_units: GaugeVec,
    movements_total: GaugeVec,
    sessions_active: Gauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

impl ApiMetrics {
    /// Create a new metrics instance with a fresh Prometheus registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("portstock_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "portstock_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "path"],
        )?;
        let http_errors_total = IntCounterVec::new(
            Opts::new("portstock_http_errors_total", "Total HTTP errors (4xx and 5xx)"),
            &["method", "path", "status"],
        )?;

        let items_total = Gauge::new("portstock_items_total", "Active catalog items")?;
        let low_stock_items = Gauge::new(
            "portstock_low_stock_items",
            "Active items at or below their reorder level",
        )?;
        let stock_units = GaugeVec::new(
            Opts::new("portstock_stock_units", "Units on hand per terminal"),
            &["terminal"],
        )?;
        let movements_total = GaugeVec::new(
            Opts::new("portstock_movements_total", "Recorded movements by kind"),
            &["kind"],
        )?;
        let sessions_active = Gauge::new("portstock_sessions_active", "Signed-in sessions")?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_errors_total.clone()))?;
        registry.register(Box::new(items_total.clone()))?;
        registry.register(Box::new(low_stock_items.clone()))?;
        registry.register(Box::new(stock_units.clone()))?;
        registry.register(Box::new(movements_total.clone()))?;
        registry.register(Box::new(sessions_active.clone()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                items_total,
                low_stock_items,
                stock_units,
                movements_total,
                sessions_active,
            }),
        })
    }

    /// Return current total request count (sum across all labels).
    pub fn requests(&self) -> u64 {
        sum_counter(&self.inner.http_requests_total)
    }

    /// Return current total error count (sum across all labels).
    pub fn errors(&self) -> u64 {
        sum_counter(&self.inner.http_errors_total)
    }

    /// Record an HTTP request (called by the middleware).
    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();

        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);

        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
    }

    // -- Inventory gauge accessors (used by the /metrics handler) --

    pub fn items_total(&self) -> &Gauge {
        &self.inner.items_total
    }

    pub fn low_stock_items(&self) -> &Gauge {
        &self.inner.low_stock_items
    }

    pub fn stock_units(&self) -> &GaugeVec {
        &self.inner.stock_units
    }

    pub fn movements_total(&self) -> &GaugeVec {
        &self.inner.movements_total
    }

    pub fn sessions_active(&self) -> &Gauge {
        &self.inner.sessions_active
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer)
            .map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

fn sum_counter(counter: &IntCounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|mf| mf.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

/// Normalize a request path by replacing UUID segments with `{id}`.
///
/// Prevents cardinality explosion in Prometheus labels.
pub(crate) fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if uuid::Uuid::parse_str(segment).is_ok() {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware that records HTTP request metrics via Prometheus.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let duration = start.elapsed().as_secs_f64();
        let status = response.status().as_u16();
        m.record_request(&method, &path, status, duration);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let m = ApiMetrics::new().unwrap();
        assert_eq!(m.requests(), 0);
        assert_eq!(m.errors(), 0);
    }

    #[test]
    fn errors_counted_separately() {
        let m = ApiMetrics::new().unwrap();
        for _ in 0..4 {
            m.record_request("GET", "/items", 200, 0.01);
        }
        m.record_request("POST", "/issues", 409, 0.02);
        m.record_request("GET", "/items/{id}", 404, 0.01);
        assert_eq!(m.requests(), 6);
        assert_eq!(m.errors(), 2);
    }

    #[test]
    fn clone_shares_underlying_counters() {
        let m = ApiMetrics::new().unwrap();
        let clone = m.clone();
        m.record_request("GET", "/", 200, 0.01);
        assert_eq!(clone.requests(), 1);
    }

    #[test]
    fn normalize_path_replaces_uuids() {
        let path = "/items/550e8400-e29b-41d4-a716-446655440000/edit";
        assert_eq!(normalize_path(path), "/items/{id}/edit");
        assert_eq!(normalize_path("/reports/stock"), "/reports/stock");
    }

    #[test]
    fn gauges_appear_in_output() {
        let m = ApiMetrics::new().unwrap();
        m.items_total().set(12.0);
        m.stock_units().with_label_values(&["jct"]).set(340.0);
        m.movements_total().with_label_values(&["issue"]).set(5.0);
        let output = m.gather_and_encode().unwrap();
        assert!(output.contains("portstock_items_total 12"));
        assert!(output.contains("portstock_stock_units{terminal=\"jct\"} 340"));
        assert!(output.contains("portstock_movements_total"));
    }
}
