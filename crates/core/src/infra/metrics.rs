use serde::Serialize;
use parking_lot::Mutex;

use crate::domain::error::MonitorErrorKind;

const MAX_LATENCY_RECORDS: usize = 1000;

/// ローカルメトリクス収集器
pub struct Metrics {
    counters: Mutex<MetricsCounters>,
    latencies: Mutex<Vec<LatencyRecord>>,
}

#[derive(Debug, Default)]
struct MetricsCounters {
    jobs_submitted: u64,
    polls_sent: u64,
    jobs_completed: u64,
    jobs_failed: u64,
    results_fetched: u64,
    errors_submission: u64,
    errors_poll: u64,
    errors_fetch: u64,
    errors_contract: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyRecord {
    pub phase: String,
    pub duration_ms: u64,
    pub timestamp: String,
}

/// メトリクスサマリー（プレゼンテーション層に返す用）
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub jobs_submitted: u64,
    pub polls_sent: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub results_fetched: u64,
    pub error_counts: ErrorCounts,
    pub avg_latency_ms: AvgLatency,
    pub recent_latencies: Vec<LatencyRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorCounts {
    pub submission: u64,
    pub poll: u64,
    pub fetch: u64,
    pub contract: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvgLatency {
    pub submit: Option<f64>,
    pub poll: Option<f64>,
    pub fetch: Option<f64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(MetricsCounters::default()),
            latencies: Mutex::new(Vec::new()),
        }
    }

    pub fn inc_jobs_submitted(&self) {
        self.counters.lock().jobs_submitted += 1;
    }

    pub fn inc_polls_sent(&self) {
        self.counters.lock().polls_sent += 1;
    }

    pub fn inc_jobs_completed(&self) {
        self.counters.lock().jobs_completed += 1;
    }

    pub fn inc_jobs_failed(&self) {
        self.counters.lock().jobs_failed += 1;
    }

    pub fn inc_results_fetched(&self) {
        self.counters.lock().results_fetched += 1;
    }

    pub fn inc_error(&self, kind: MonitorErrorKind) {
        let mut c = self.counters.lock();
        match kind {
            MonitorErrorKind::Submission => c.errors_submission += 1,
            MonitorErrorKind::Poll => c.errors_poll += 1,
            MonitorErrorKind::Fetch => c.errors_fetch += 1,
            MonitorErrorKind::ContractViolation => c.errors_contract += 1,
            // 破棄された応答はエラーとして数えない
            MonitorErrorKind::Superseded => {}
        }
    }

    pub fn record_latency(&self, phase: &str, duration_ms: u64) {
        let record = LatencyRecord {
            phase: phase.to_string(),
            duration_ms,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let mut latencies = self.latencies.lock();
        latencies.push(record);
        // 最新1000件のみ保持
        if latencies.len() > MAX_LATENCY_RECORDS {
            let excess = latencies.len() - MAX_LATENCY_RECORDS;
            latencies.drain(0..excess);
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let c = self.counters.lock();
        let latencies = self.latencies.lock();

        let avg = |phase: &str| -> Option<f64> {
            let vals: Vec<f64> = latencies
                .iter()
                .filter(|r| r.phase == phase)
                .map(|r| r.duration_ms as f64)
                .collect();
            if vals.is_empty() {
                None
            } else {
                Some(vals.iter().sum::<f64>() / vals.len() as f64)
            }
        };

        let recent: Vec<LatencyRecord> = latencies.iter().rev().take(20).cloned().collect();

        MetricsSummary {
            jobs_submitted: c.jobs_submitted,
            polls_sent: c.polls_sent,
            jobs_completed: c.jobs_completed,
            jobs_failed: c.jobs_failed,
            results_fetched: c.results_fetched,
            error_counts: ErrorCounts {
                submission: c.errors_submission,
                poll: c.errors_poll,
                fetch: c.errors_fetch,
                contract: c.errors_contract,
            },
            avg_latency_ms: AvgLatency {
                submit: avg("submit"),
                poll: avg("poll"),
                fetch: avg("fetch"),
            },
            recent_latencies: recent,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let m = Metrics::new();
        m.inc_jobs_submitted();
        m.inc_jobs_submitted();
        m.inc_polls_sent();
        m.inc_error(MonitorErrorKind::Poll);
        m.inc_error(MonitorErrorKind::ContractViolation);
        m.inc_error(MonitorErrorKind::Superseded);

        let s = m.summary();
        assert_eq!(s.jobs_submitted, 2);
        assert_eq!(s.polls_sent, 1);
        assert_eq!(s.error_counts.poll, 1);
        assert_eq!(s.error_counts.contract, 1);
        assert_eq!(s.error_counts.submission, 0);
    }

    #[test]
    fn test_latency_recording() {
        let m = Metrics::new();
        m.record_latency("poll", 120);
        m.record_latency("poll", 80);
        m.record_latency("fetch", 200);

        let s = m.summary();
        assert!((s.avg_latency_ms.poll.unwrap() - 100.0).abs() < f64::EPSILON);
        assert!((s.avg_latency_ms.fetch.unwrap() - 200.0).abs() < f64::EPSILON);
        assert!(s.avg_latency_ms.submit.is_none());
        assert_eq!(s.recent_latencies.len(), 3);
    }

    #[test]
    fn test_latency_cap() {
        let m = Metrics::new();
        for i in 0..1100 {
            m.record_latency("poll", i);
        }
        assert_eq!(m.latencies.lock().len(), MAX_LATENCY_RECORDS);
    }
}
