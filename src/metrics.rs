//! Lightweight generation metrics for the qrserve daemon

use crate::config::MetricsFormat;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

const MIN_INTERVAL_SECS: u64 = 5;

/// Aggregates generation outcomes over a rolling reporting window.
#[derive(Debug)]
pub struct GenerationMetrics {
    state: Mutex<MetricsState>,
    last_snapshot: Mutex<Option<Snapshot>>,
}

impl Default for GenerationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationMetrics {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MetricsState::new()),
            last_snapshot: Mutex::new(None),
        }
    }

    /// Record the outcome of one generate request.
    pub fn record(&self, duration: Duration, success: bool, qr_type: &str) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.total += 1;
        if success {
            state.successes += 1;
            state.success_duration += duration;
        } else {
            state.failures += 1;
        }

        let entry = state.per_type.entry(qr_type.to_string()).or_default();
        if success {
            entry.successes += 1;
            entry.success_duration += duration;
        } else {
            entry.failures += 1;
        }
    }

    /// Spawn the task that closes a window every `interval_secs` and logs it.
    pub fn spawn_reporter(self: &Arc<Self>, interval_secs: u64) -> JoinHandle<()> {
        let period = Duration::from_secs(interval_secs.max(MIN_INTERVAL_SECS));
        let metrics = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let snapshot = metrics.close_window();
                log_snapshot(&snapshot);
            }
        })
    }

    /// Finish the current window, keep it as the latest snapshot and start a new one.
    pub fn close_window(&self) -> Snapshot {
        let snapshot = match self.state.lock() {
            Ok(mut state) => state.snapshot_and_reset(),
            Err(_) => Snapshot::default(),
        };
        if let Ok(mut last) = self.last_snapshot.lock() {
            *last = Some(snapshot.clone());
        }
        snapshot
    }

    /// Latest closed window, or the live window when none has closed yet.
    pub fn current(&self) -> Snapshot {
        if let Ok(last) = self.last_snapshot.lock() {
            if let Some(snapshot) = last.as_ref() {
                return snapshot.clone();
            }
        }
        match self.state.lock() {
            Ok(state) => state.snapshot(),
            Err(_) => Snapshot::default(),
        }
    }

    /// Render the current snapshot in the requested format, returning `(content_type, body)`.
    pub fn render(&self, format: MetricsFormat) -> (&'static str, String) {
        let snapshot = self.current();
        match format {
            MetricsFormat::Json => (
                "application/json",
                serde_json::to_string(&snapshot).unwrap_or_else(|_| "{}".to_string()),
            ),
            MetricsFormat::Prometheus => ("text/plain; version=0.0.4", render_prometheus(&snapshot)),
        }
    }
}

#[derive(Debug)]
struct MetricsState {
    total: u64,
    successes: u64,
    failures: u64,
    success_duration: Duration,
    per_type: HashMap<String, TypeCounters>,
    window_start: Instant,
}

impl MetricsState {
    fn new() -> Self {
        Self {
            total: 0,
            successes: 0,
            failures: 0,
            success_duration: Duration::ZERO,
            per_type: HashMap::new(),
            window_start: Instant::now(),
        }
    }

    fn snapshot(&self) -> Snapshot {
        let mut per_type: Vec<TypeSnapshot> = self
            .per_type
            .iter()
            .map(|(qr_type, counters)| TypeSnapshot {
                qr_type: qr_type.clone(),
                successes: counters.successes,
                failures: counters.failures,
                avg_latency_ms: avg_ms(counters.success_duration, counters.successes),
            })
            .collect();
        per_type.sort_by(|a, b| a.qr_type.cmp(&b.qr_type));

        Snapshot {
            window_secs: self.window_start.elapsed().as_secs(),
            total: self.total,
            successes: self.successes,
            failures: self.failures,
            success_rate: if self.total == 0 {
                0.0
            } else {
                self.successes as f64 * 100.0 / self.total as f64
            },
            avg_latency_ms: avg_ms(self.success_duration, self.successes),
            per_type,
        }
    }

    fn snapshot_and_reset(&mut self) -> Snapshot {
        let snapshot = self.snapshot();
        *self = Self::new();
        snapshot
    }
}

fn avg_ms(total: Duration, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total.as_secs_f64() * 1_000.0 / count as f64
    }
}

#[derive(Debug, Default)]
struct TypeCounters {
    successes: u64,
    failures: u64,
    success_duration: Duration,
}

/// Aggregated counters for one reporting window
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    /// Length of the window in seconds
    pub window_secs: u64,
    /// Generate requests seen
    pub total: u64,
    /// Requests that produced an image
    pub successes: u64,
    /// Requests that failed for any reason
    pub failures: u64,
    /// Percentage of successful requests
    pub success_rate: f64,
    /// Mean latency of successful requests
    pub avg_latency_ms: f64,
    /// Breakdown by requested type tag, sorted by tag
    pub per_type: Vec<TypeSnapshot>,
}

/// Per-type counters within a window
#[derive(Debug, Clone, Serialize)]
pub struct TypeSnapshot {
    /// Type tag
    pub qr_type: String,
    /// Successful generations
    pub successes: u64,
    /// Failed generations
    pub failures: u64,
    /// Mean latency of successful generations
    pub avg_latency_ms: f64,
}

fn log_snapshot(snapshot: &Snapshot) {
    info!(
        target: "qrserve::metrics",
        interval_secs = snapshot.window_secs,
        total = snapshot.total,
        success_count = snapshot.successes,
        failure_count = snapshot.failures,
        avg_latency_ms = snapshot.avg_latency_ms,
        success_rate = format_args!("{:.1}%", snapshot.success_rate),
        "Generation metrics window"
    );

    if !snapshot.per_type.is_empty() {
        let breakdown = snapshot
            .per_type
            .iter()
            .map(|entry| {
                format!(
                    "{}: {} ok / {} err (avg {:.1} ms)",
                    entry.qr_type, entry.successes, entry.failures, entry.avg_latency_ms
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        info!(target: "qrserve::metrics", breakdown, "Per-type metrics");
    }
}

fn render_prometheus(snapshot: &Snapshot) -> String {
    let mut output = String::new();

    let mut gauge = |name: &str, help: &str, kind: &str, value: String| {
        let _ = writeln!(&mut output, "# HELP {name} {help}");
        let _ = writeln!(&mut output, "# TYPE {name} {kind}");
        let _ = writeln!(&mut output, "{name} {value}");
    };

    gauge(
        "qrserve_window_seconds",
        "Duration of the aggregation window in seconds",
        "gauge",
        snapshot.window_secs.to_string(),
    );
    gauge(
        "qrserve_generations_total",
        "Generate requests observed during the window",
        "counter",
        snapshot.total.to_string(),
    );
    gauge(
        "qrserve_generation_successes",
        "Successful generations in the window",
        "counter",
        snapshot.successes.to_string(),
    );
    gauge(
        "qrserve_generation_failures",
        "Failed generations in the window",
        "counter",
        snapshot.failures.to_string(),
    );
    gauge(
        "qrserve_generation_latency_avg_seconds",
        "Average latency of successful generations",
        "gauge",
        format!("{:.6}", snapshot.avg_latency_ms / 1_000.0),
    );

    if !snapshot.per_type.is_empty() {
        let _ = writeln!(
            &mut output,
            "# HELP qrserve_generations_by_type_total Generations by requested type"
        );
        let _ = writeln!(&mut output, "# TYPE qrserve_generations_by_type_total counter");
        for entry in &snapshot.per_type {
            let label = escape_label(&entry.qr_type);
            let _ = writeln!(
                &mut output,
                "qrserve_generations_by_type_total{{qr_type=\"{label}\",result=\"success\"}} {}",
                entry.successes
            );
            let _ = writeln!(
                &mut output,
                "qrserve_generations_by_type_total{{qr_type=\"{label}\",result=\"failure\"}} {}",
                entry.failures
            );
        }
    }

    output
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let metrics = GenerationMetrics::new();
        metrics.record(Duration::from_millis(20), true, "general");
        metrics.record(Duration::from_millis(40), true, "general");
        metrics.record(Duration::from_millis(5), false, "email");

        let snapshot = metrics.current();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.successes, 2);
        assert_eq!(snapshot.failures, 1);
        assert!((snapshot.avg_latency_ms - 30.0).abs() < 1e-6);
        assert_eq!(snapshot.per_type.len(), 2);
        assert_eq!(snapshot.per_type[0].qr_type, "email");
        assert_eq!(snapshot.per_type[0].failures, 1);
        assert_eq!(snapshot.per_type[1].successes, 2);
    }

    #[test]
    fn test_close_window_resets_live_counters() {
        let metrics = GenerationMetrics::new();
        metrics.record(Duration::from_millis(10), true, "location");

        let closed = metrics.close_window();
        assert_eq!(closed.total, 1);

        metrics.record(Duration::from_millis(10), true, "location");
        // Latest closed window is served until the next one closes
        assert_eq!(metrics.current().total, 1);
        assert_eq!(metrics.close_window().total, 1);
    }

    #[test]
    fn test_prometheus_output() {
        let metrics = GenerationMetrics::new();
        metrics.record(Duration::from_millis(10), true, "wh\"atsapp");

        let (content_type, body) = metrics.render(MetricsFormat::Prometheus);
        assert!(content_type.starts_with("text/plain"));
        assert!(body.contains("qrserve_generations_total 1"));
        assert!(body.contains("qr_type=\"wh\\\"atsapp\",result=\"success\"} 1"));
    }

    #[test]
    fn test_json_output() {
        let metrics = GenerationMetrics::new();
        metrics.record(Duration::from_millis(10), false, "general");

        let (content_type, body) = metrics.render(MetricsFormat::Json);
        assert_eq!(content_type, "application/json");
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["failures"], 1);
        assert_eq!(value["per_type"][0]["qr_type"], "general");
    }
}
