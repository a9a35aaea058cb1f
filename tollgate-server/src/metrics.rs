//! Simple metrics collection for observability
//!
//! Lightweight metrics using atomic counters, with minimal overhead and
//! zero allocations in the hot path. Exported in Prometheus text format
//! at `GET /metrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Core metrics collected by the server
pub struct Metrics {
    /// Server start time
    start_time: Instant,

    /// Total checks received
    pub total_checks: AtomicU64,

    /// Admission decisions
    pub checks_allowed: AtomicU64,
    pub checks_denied: AtomicU64,
    /// Decisions produced by the fallback policy (store unavailable)
    pub checks_degraded: AtomicU64,
    pub checks_errors: AtomicU64,

    /// Check latency buckets (in microseconds)
    pub latency_under_1ms: AtomicU64,
    pub latency_under_10ms: AtomicU64,
    pub latency_under_100ms: AtomicU64,
    pub latency_under_1s: AtomicU64,
    pub latency_over_1s: AtomicU64,

    /// Histogram support
    pub latency_sum_micros: AtomicU64,
    pub latency_count: AtomicU64,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_checks: AtomicU64::new(0),
            checks_allowed: AtomicU64::new(0),
            checks_denied: AtomicU64::new(0),
            checks_degraded: AtomicU64::new(0),
            checks_errors: AtomicU64::new(0),
            latency_under_1ms: AtomicU64::new(0),
            latency_under_10ms: AtomicU64::new(0),
            latency_under_100ms: AtomicU64::new(0),
            latency_under_1s: AtomicU64::new(0),
            latency_over_1s: AtomicU64::new(0),
            latency_sum_micros: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
        }
    }

    /// Record one admission check and its latency
    pub fn record_check(&self, latency_us: u64, allowed: bool, degraded: bool) {
        self.total_checks.fetch_add(1, Ordering::Relaxed);

        if allowed {
            self.checks_allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.checks_denied.fetch_add(1, Ordering::Relaxed);
        }

        if degraded {
            self.checks_degraded.fetch_add(1, Ordering::Relaxed);
        }

        self.record_latency(latency_us);
    }

    /// Record an internal error
    pub fn record_error(&self, latency_us: u64) {
        self.total_checks.fetch_add(1, Ordering::Relaxed);
        self.checks_errors.fetch_add(1, Ordering::Relaxed);

        // Record latency even for errors
        self.record_latency(latency_us);
    }

    fn record_latency(&self, latency_us: u64) {
        match latency_us {
            0..=999 => self.latency_under_1ms.fetch_add(1, Ordering::Relaxed),
            1000..=9999 => self.latency_under_10ms.fetch_add(1, Ordering::Relaxed),
            10000..=99999 => self.latency_under_100ms.fetch_add(1, Ordering::Relaxed),
            100000..=999999 => self.latency_under_1s.fetch_add(1, Ordering::Relaxed),
            _ => self.latency_over_1s.fetch_add(1, Ordering::Relaxed),
        };

        self.latency_sum_micros
            .fetch_add(latency_us, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        // ~50 chars per metric line, ~25 lines
        let mut output = String::with_capacity(1300);

        output.push_str("# HELP tollgate_uptime_seconds Time since server start in seconds\n");
        output.push_str("# TYPE tollgate_uptime_seconds gauge\n");
        output.push_str(&format!(
            "tollgate_uptime_seconds {}\n\n",
            self.uptime_seconds()
        ));

        output.push_str("# HELP tollgate_checks_total Total number of admission checks\n");
        output.push_str("# TYPE tollgate_checks_total counter\n");
        output.push_str(&format!(
            "tollgate_checks_total {}\n\n",
            self.total_checks.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP tollgate_checks_allowed Total checks admitted\n");
        output.push_str("# TYPE tollgate_checks_allowed counter\n");
        output.push_str(&format!(
            "tollgate_checks_allowed {}\n\n",
            self.checks_allowed.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP tollgate_checks_denied Total checks rejected\n");
        output.push_str("# TYPE tollgate_checks_denied counter\n");
        output.push_str(&format!(
            "tollgate_checks_denied {}\n\n",
            self.checks_denied.load(Ordering::Relaxed)
        ));

        output.push_str(
            "# HELP tollgate_checks_degraded Decisions answered by the fallback policy\n",
        );
        output.push_str("# TYPE tollgate_checks_degraded counter\n");
        output.push_str(&format!(
            "tollgate_checks_degraded {}\n\n",
            self.checks_degraded.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP tollgate_checks_errors Total internal errors\n");
        output.push_str("# TYPE tollgate_checks_errors counter\n");
        output.push_str(&format!(
            "tollgate_checks_errors {}\n\n",
            self.checks_errors.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP tollgate_check_duration_bucket Check latency distribution\n");
        output.push_str("# TYPE tollgate_check_duration_bucket histogram\n");
        let under_1ms = self.latency_under_1ms.load(Ordering::Relaxed);
        let under_10ms = under_1ms + self.latency_under_10ms.load(Ordering::Relaxed);
        let under_100ms = under_10ms + self.latency_under_100ms.load(Ordering::Relaxed);
        let under_1s = under_100ms + self.latency_under_1s.load(Ordering::Relaxed);
        output.push_str(&format!(
            "tollgate_check_duration_bucket{{le=\"0.001\"}} {under_1ms}\n"
        ));
        output.push_str(&format!(
            "tollgate_check_duration_bucket{{le=\"0.01\"}} {under_10ms}\n"
        ));
        output.push_str(&format!(
            "tollgate_check_duration_bucket{{le=\"0.1\"}} {under_100ms}\n"
        ));
        output.push_str(&format!(
            "tollgate_check_duration_bucket{{le=\"1\"}} {under_1s}\n"
        ));
        output.push_str(&format!(
            "tollgate_check_duration_bucket{{le=\"+Inf\"}} {}\n",
            self.total_checks.load(Ordering::Relaxed)
        ));

        let latency_sum_seconds =
            self.latency_sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        output.push_str(&format!(
            "tollgate_check_duration_sum {latency_sum_seconds:.6}\n"
        ));
        output.push_str(&format!(
            "tollgate_check_duration_count {}\n",
            self.latency_count.load(Ordering::Relaxed)
        ));

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
