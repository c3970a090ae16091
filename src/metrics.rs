//! Request metrics aggregation
//!
//! Process-wide counters for the synthesis API: request and error totals, the
//! inflight gauge, per-speaker request counts and a running latency average.
//! Every mutation and every render happens under one lock, so a rendered
//! exposition is always internally consistent.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Counter name for the total number of synthesis requests
pub const REQUESTS_TOTAL: &str = "requests_total";
/// Gauge name for requests that started but have not finished
pub const REQUESTS_INFLIGHT: &str = "requests_inflight";
/// Counter name for requests that ended in an error response
pub const ERRORS_TOTAL: &str = "errors_total";

/// Point-in-time copy of the aggregated metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_inflight: u64,
    pub errors_total: u64,
    pub requests_by_speaker: BTreeMap<String, u64>,
    pub latency_ms_sum: f64,
    pub latency_ms_count: u64,
    pub warmed: bool,
}

impl MetricsSnapshot {
    /// Average latency in milliseconds, zero before the first observation
    pub fn average_latency_ms(&self) -> f64 {
        if self.latency_ms_count == 0 {
            return 0.0;
        }
        self.latency_ms_sum / self.latency_ms_count as f64
    }
}

#[derive(Debug, Default)]
struct MetricsState {
    counters: HashMap<String, u64>,
    requests_by_speaker: BTreeMap<String, u64>,
    latency_ms_sum: f64,
    latency_ms_count: u64,
    warmed: bool,
}

impl MetricsState {
    fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    fn decrement(&mut self, name: &str, amount: u64) {
        if let Some(counter) = self.counters.get_mut(name) {
            *counter = counter.saturating_sub(amount);
        }
    }

    fn observe_latency(&mut self, milliseconds: f64) {
        self.latency_ms_sum += milliseconds;
        self.latency_ms_count += 1;
    }

    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.counter(REQUESTS_TOTAL),
            requests_inflight: self.counter(REQUESTS_INFLIGHT),
            errors_total: self.counter(ERRORS_TOTAL),
            requests_by_speaker: self.requests_by_speaker.clone(),
            latency_ms_sum: self.latency_ms_sum,
            latency_ms_count: self.latency_ms_count,
            warmed: self.warmed,
        }
    }
}

/// Metrics aggregator shared by every request handler and the warm-up task
#[derive(Debug)]
pub struct Metrics {
    state: Mutex<MetricsState>,
    start_time: Instant,
}

impl Metrics {
    /// Create an empty aggregator; uptime is measured from this call
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MetricsState::default()),
            start_time: Instant::now(),
        }
    }

    /// Add `amount` to a named counter, creating it at zero if unseen
    pub fn increment(&self, counter_name: &str, amount: u64) {
        let mut state = self.state.lock();
        let counter = state.counters.entry(counter_name.to_string()).or_insert(0);
        *counter = counter.saturating_add(amount);
    }

    /// Subtract `amount` from a named counter, flooring at zero
    pub fn decrement(&self, counter_name: &str, amount: u64) {
        self.state.lock().decrement(counter_name, amount);
    }

    /// Record one request latency in milliseconds
    pub fn observe_latency(&self, milliseconds: f64) {
        self.state.lock().observe_latency(milliseconds);
    }

    pub fn set_warmed(&self, warmed: bool) {
        self.state.lock().warmed = warmed;
    }

    /// Count one successful request for `speaker`
    pub fn increment_by_speaker(&self, speaker: &str) {
        let mut state = self.state.lock();
        *state
            .requests_by_speaker
            .entry(speaker.to_string())
            .or_insert(0) += 1;
    }

    /// Mark a request as started and return a guard that finishes it on drop
    ///
    /// Finishing observes the elapsed wall-clock latency and releases the
    /// inflight slot, on every exit path of the request.
    pub fn begin_request(&self) -> RequestGuard<'_> {
        {
            let mut state = self.state.lock();
            for name in [REQUESTS_TOTAL, REQUESTS_INFLIGHT] {
                *state.counters.entry(name.to_string()).or_insert(0) += 1;
            }
        }
        RequestGuard {
            metrics: self,
            started: Instant::now(),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state.lock().snapshot()
    }

    /// Like [`Metrics::snapshot`] but gives up after `wait` if the lock is held
    pub fn try_snapshot(&self, wait: Duration) -> Option<MetricsSnapshot> {
        self.state.try_lock_for(wait).map(|state| state.snapshot())
    }

    /// Time since the aggregator was created
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Render the plain-text exposition served by `/metrics`
    ///
    /// Speakers are listed in sorted order; the average latency is printed
    /// with two decimals.
    pub fn render(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        let _ = writeln!(out, "tts_requests_total {}", snapshot.requests_total);
        let _ = writeln!(out, "tts_errors_total {}", snapshot.errors_total);
        let _ = writeln!(out, "tts_requests_inflight {}", snapshot.requests_inflight);
        for (speaker, count) in &snapshot.requests_by_speaker {
            let _ = writeln!(
                out,
                "tts_requests_by_speaker{{speaker=\"{}\"}} {}",
                speaker, count
            );
        }
        let _ = writeln!(
            out,
            "tts_latency_ms_avg {:.2}",
            snapshot.average_latency_ms()
        );
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard returned by [`Metrics::begin_request`]
#[must_use = "dropping the guard immediately ends the request"]
#[derive(Debug)]
pub struct RequestGuard<'a> {
    metrics: &'a Metrics,
    started: Instant,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut state = self.metrics.state.lock();
        state.observe_latency(elapsed_ms);
        state.decrement(REQUESTS_INFLIGHT, 1);
    }
}
