//! Metrics collection for flare-rs.
//!
//! Counters for the alert lifecycle, the dispatch pipeline and the HTTP
//! surface, exported as a JSON snapshot or in Prometheus text format.

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Global metrics instance.
static METRICS: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Get the global metrics instance.
pub fn get_metrics() -> &'static Arc<Metrics> {
    METRICS.get_or_init(|| Arc::new(Metrics::new()))
}

/// Application metrics collector.
#[derive(Debug)]
pub struct Metrics {
    // === Request Metrics ===
    /// Total HTTP requests received
    pub http_requests_total: AtomicU64,
    pub http_requests_2xx: AtomicU64,
    pub http_requests_4xx: AtomicU64,
    pub http_requests_5xx: AtomicU64,
    /// Total request latency in microseconds
    pub http_request_latency_us_total: AtomicU64,

    // === Lifecycle Metrics ===
    pub reports_submitted: AtomicU64,
    pub reports_verified: AtomicU64,
    pub reports_resolved: AtomicU64,
    /// Radius expansions that changed the radius
    pub radius_expansions: AtomicU64,
    /// Optimistic version checks that failed
    pub concurrency_conflicts: AtomicU64,
    /// Scheduler ticks that arrived after the report left `active`
    pub stale_ticks: AtomicU64,

    // === Tip Metrics ===
    pub tips_submitted: AtomicU64,
    pub tips_reviewed: AtomicU64,

    // === Dispatch Metrics ===
    pub notifications_enqueued: AtomicU64,
    pub notifications_delivered: AtomicU64,
    pub notifications_failed: AtomicU64,
    /// Notifications dropped because the dispatch queue was full
    pub notifications_dropped: AtomicU64,
}

impl Metrics {
    /// Create a new metrics instance with all counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            http_requests_total: AtomicU64::new(0),
            http_requests_2xx: AtomicU64::new(0),
            http_requests_4xx: AtomicU64::new(0),
            http_requests_5xx: AtomicU64::new(0),
            http_request_latency_us_total: AtomicU64::new(0),

            reports_submitted: AtomicU64::new(0),
            reports_verified: AtomicU64::new(0),
            reports_resolved: AtomicU64::new(0),
            radius_expansions: AtomicU64::new(0),
            concurrency_conflicts: AtomicU64::new(0),
            stale_ticks: AtomicU64::new(0),

            tips_submitted: AtomicU64::new(0),
            tips_reviewed: AtomicU64::new(0),

            notifications_enqueued: AtomicU64::new(0),
            notifications_delivered: AtomicU64::new(0),
            notifications_failed: AtomicU64::new(0),
            notifications_dropped: AtomicU64::new(0),
        }
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, status_code: u16, latency: Duration) {
        self.http_requests_total.fetch_add(1, Ordering::Relaxed);

        match status_code {
            200..=299 => self.http_requests_2xx.fetch_add(1, Ordering::Relaxed),
            400..=499 => self.http_requests_4xx.fetch_add(1, Ordering::Relaxed),
            500..=599 => self.http_requests_5xx.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };

        self.http_request_latency_us_total
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record the outcome of a notification delivery.
    pub fn record_delivery(&self, success: bool) {
        if success {
            self.notifications_delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.notifications_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Increment a counter by one.
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Average HTTP latency in microseconds.
    #[must_use]
    pub fn average_latency_us(&self) -> u64 {
        let total = self.http_requests_total.load(Ordering::Relaxed);
        if total > 0 {
            self.http_request_latency_us_total.load(Ordering::Relaxed) / total
        } else {
            0
        }
    }

    /// Get a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            http_requests_total: self.http_requests_total.load(Ordering::Relaxed),
            http_requests_2xx: self.http_requests_2xx.load(Ordering::Relaxed),
            http_requests_4xx: self.http_requests_4xx.load(Ordering::Relaxed),
            http_requests_5xx: self.http_requests_5xx.load(Ordering::Relaxed),
            http_request_latency_avg_us: self.average_latency_us(),

            reports_submitted: self.reports_submitted.load(Ordering::Relaxed),
            reports_verified: self.reports_verified.load(Ordering::Relaxed),
            reports_resolved: self.reports_resolved.load(Ordering::Relaxed),
            radius_expansions: self.radius_expansions.load(Ordering::Relaxed),
            concurrency_conflicts: self.concurrency_conflicts.load(Ordering::Relaxed),
            stale_ticks: self.stale_ticks.load(Ordering::Relaxed),

            tips_submitted: self.tips_submitted.load(Ordering::Relaxed),
            tips_reviewed: self.tips_reviewed.load(Ordering::Relaxed),

            notifications_enqueued: self.notifications_enqueued.load(Ordering::Relaxed),
            notifications_delivered: self.notifications_delivered.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
            notifications_dropped: self.notifications_dropped.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut output = String::new();

        let counters: [(&str, &str, u64); 14] = [
            ("flare_http_requests_total", "Total HTTP requests", s.http_requests_total),
            ("flare_reports_submitted_total", "Reports submitted", s.reports_submitted),
            ("flare_reports_verified_total", "Reports verified", s.reports_verified),
            ("flare_reports_resolved_total", "Reports that reached a terminal status", s.reports_resolved),
            ("flare_radius_expansions_total", "Radius expansions applied", s.radius_expansions),
            ("flare_concurrency_conflicts_total", "Failed optimistic version checks", s.concurrency_conflicts),
            ("flare_stale_ticks_total", "Scheduler ticks for reports no longer active", s.stale_ticks),
            ("flare_tips_submitted_total", "Community tips submitted", s.tips_submitted),
            ("flare_tips_reviewed_total", "Community tips reviewed", s.tips_reviewed),
            ("flare_notifications_enqueued_total", "Notifications enqueued", s.notifications_enqueued),
            ("flare_notifications_delivered_total", "Notifications delivered", s.notifications_delivered),
            ("flare_notifications_failed_total", "Notifications that exhausted retries", s.notifications_failed),
            ("flare_notifications_dropped_total", "Notifications dropped on a full queue", s.notifications_dropped),
            ("flare_http_request_latency_avg_us", "Average request latency", s.http_request_latency_avg_us),
        ];

        for (name, help, value) in counters {
            let kind = if name.ends_with("_total") { "counter" } else { "gauge" };
            let _ = writeln!(output, "# HELP {name} {help}");
            let _ = writeln!(output, "# TYPE {name} {kind}");
            let _ = writeln!(output, "{name} {value}");
        }

        output.push_str("# HELP flare_http_requests_by_status HTTP requests by status\n");
        output.push_str("# TYPE flare_http_requests_by_status counter\n");
        for (status, value) in [
            ("2xx", s.http_requests_2xx),
            ("4xx", s.http_requests_4xx),
            ("5xx", s.http_requests_5xx),
        ] {
            let _ = writeln!(
                output,
                "flare_http_requests_by_status{{status=\"{status}\"}} {value}"
            );
        }

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of all metrics at a point in time.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    // HTTP
    pub http_requests_total: u64,
    pub http_requests_2xx: u64,
    pub http_requests_4xx: u64,
    pub http_requests_5xx: u64,
    pub http_request_latency_avg_us: u64,

    // Lifecycle
    pub reports_submitted: u64,
    pub reports_verified: u64,
    pub reports_resolved: u64,
    pub radius_expansions: u64,
    pub concurrency_conflicts: u64,
    pub stale_ticks: u64,

    // Tips
    pub tips_submitted: u64,
    pub tips_reviewed: u64,

    // Dispatch
    pub notifications_enqueued: u64,
    pub notifications_delivered: u64,
    pub notifications_failed: u64,
    pub notifications_dropped: u64,
}

/// Timer guard for measuring operation duration.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_http_request() {
        let metrics = Metrics::new();

        metrics.record_http_request(200, Duration::from_millis(50));
        metrics.record_http_request(409, Duration::from_millis(10));
        metrics.record_http_request(500, Duration::from_millis(100));

        assert_eq!(metrics.http_requests_total.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.http_requests_2xx.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.http_requests_4xx.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.http_requests_5xx.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_record_delivery() {
        let metrics = Metrics::new();
        metrics.record_delivery(true);
        metrics.record_delivery(false);
        metrics.record_delivery(true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.notifications_delivered, 2);
        assert_eq!(snapshot.notifications_failed, 1);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();
        Metrics::incr(&metrics.reports_submitted);
        metrics.record_http_request(200, Duration::from_millis(5));

        let prometheus = metrics.to_prometheus();
        assert!(prometheus.contains("flare_reports_submitted_total 1"));
        assert!(prometheus.contains("# TYPE flare_http_request_latency_avg_us gauge"));
        assert!(prometheus.contains("flare_http_requests_by_status{status=\"2xx\"} 1"));
    }

    #[test]
    fn test_average_latency() {
        let metrics = Metrics::new();
        assert_eq!(metrics.average_latency_us(), 0);
        metrics.record_http_request(200, Duration::from_micros(100));
        metrics.record_http_request(200, Duration::from_micros(200));
        assert_eq!(metrics.average_latency_us(), 150);
    }
}
