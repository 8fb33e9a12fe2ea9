use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Process-wide metrics collector.
///
/// Tracks request outcomes, fragment throughput, and pipeline latency.
/// Thread-safe and cheap to clone into handlers.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    requests_total: AtomicUsize,
    requests_failed: AtomicUsize,
    no_text_results: AtomicUsize,
    fragments_extracted: AtomicUsize,
    images_composed: AtomicUsize,
    pipeline_latency_ms: RwLock<Vec<u64>>,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                requests_total: AtomicUsize::new(0),
                requests_failed: AtomicUsize::new(0),
                no_text_results: AtomicUsize::new(0),
                fragments_extracted: AtomicUsize::new(0),
                images_composed: AtomicUsize::new(0),
                pipeline_latency_ms: RwLock::new(Vec::new()),
                start_time: Instant::now(),
            }),
        }
    }

    /// Record a completed pipeline run
    pub fn record_run(&self, fragments: usize, composed: bool, elapsed: Duration) {
        self.inner.requests_total.fetch_add(1, Ordering::Relaxed);
        self.inner
            .fragments_extracted
            .fetch_add(fragments, Ordering::Relaxed);
        if fragments == 0 {
            self.inner.no_text_results.fetch_add(1, Ordering::Relaxed);
        }
        if composed {
            self.inner.images_composed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .pipeline_latency_ms
            .write()
            .push(elapsed.as_millis() as u64);
    }

    /// Record a request rejected before the pipeline produced a result
    pub fn record_failure(&self) {
        self.inner.requests_total.fetch_add(1, Ordering::Relaxed);
        self.inner.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency = self.inner.pipeline_latency_ms.read();
        let latency_avg = avg(&latency);
        let latency_p50 = percentile(&latency, 0.5);
        let latency_p95 = percentile(&latency, 0.95);
        drop(latency);

        MetricsSnapshot {
            requests_total: self.inner.requests_total.load(Ordering::Relaxed),
            requests_failed: self.inner.requests_failed.load(Ordering::Relaxed),
            no_text_results: self.inner.no_text_results.load(Ordering::Relaxed),
            fragments_extracted: self.inner.fragments_extracted.load(Ordering::Relaxed),
            images_composed: self.inner.images_composed.load(Ordering::Relaxed),
            pipeline_latency_avg_ms: latency_avg,
            pipeline_latency_p50_ms: latency_p50,
            pipeline_latency_p95_ms: latency_p95,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP requests_total Total translation requests received
# TYPE requests_total counter
requests_total {{}} {}

# HELP requests_failed Requests rejected as invalid input
# TYPE requests_failed counter
requests_failed {{}} {}

# HELP no_text_results Successful runs that detected no text
# TYPE no_text_results counter
no_text_results {{}} {}

# HELP fragments_extracted_total Total admitted text fragments
# TYPE fragments_extracted_total counter
fragments_extracted_total {{}} {}

# HELP images_composed_total Runs that produced an annotated image
# TYPE images_composed_total counter
images_composed_total {{}} {}

# HELP pipeline_latency_avg_ms Average pipeline latency in milliseconds
# TYPE pipeline_latency_avg_ms gauge
pipeline_latency_avg_ms {{}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {{}} {}
"#,
            snapshot.requests_total,
            snapshot.requests_failed,
            snapshot.no_text_results,
            snapshot.fragments_extracted,
            snapshot.images_composed,
            snapshot.pipeline_latency_avg_ms,
            snapshot.uptime_seconds,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub requests_total: usize,
    pub requests_failed: usize,
    pub no_text_results: usize,
    pub fragments_extracted: usize,
    pub images_composed: usize,
    pub pipeline_latency_avg_ms: u64,
    pub pipeline_latency_p50_ms: u64,
    pub pipeline_latency_p95_ms: u64,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_run(3, true, Duration::from_millis(120));
        metrics.record_run(0, false, Duration::from_millis(40));
        metrics.record_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 3);
        assert_eq!(snapshot.requests_failed, 1);
        assert_eq!(snapshot.no_text_results, 1);
        assert_eq!(snapshot.fragments_extracted, 3);
        assert_eq!(snapshot.images_composed, 1);
        assert_eq!(snapshot.pipeline_latency_avg_ms, 80);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.record_run(2, true, Duration::from_millis(100));

        let prometheus = metrics.to_prometheus();
        assert!(prometheus.contains("requests_total {} 1"));
        assert!(prometheus.contains("fragments_extracted_total {} 2"));
    }
}
