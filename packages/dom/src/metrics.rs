use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Instant;
use tracing::info;

pub const CREATE_ELEMENT: &str = "create_element";
pub const PATCH: &str = "patch";
pub const FLUSH: &str = "flush";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricSummary {
    pub count: u64,
    pub total_ms: f64,
    pub average_ms: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Sample {
    count: u64,
    total_ms: f64,
}

/// Millisecond clock. Browsers supply `performance.now()`.
pub type Clock = Rc<dyn Fn() -> f64>;

fn monotonic_clock() -> Clock {
    let epoch = Instant::now();
    Rc::new(move || epoch.elapsed().as_secs_f64() * 1000.0)
}

/// Timing samples per operation label
pub struct PerformanceMetrics {
    enabled: bool,
    clock: Clock,
    samples: RefCell<BTreeMap<&'static str, Sample>>,
}

impl PerformanceMetrics {
    pub fn new(enabled: bool) -> Self {
        Self::with_clock(enabled, monotonic_clock())
    }

    pub fn with_clock(enabled: bool, clock: Clock) -> Self {
        Self {
            enabled,
            clock,
            samples: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start timing `label`; the sample is recorded when the guard drops
    pub fn start(&self, label: &'static str) -> MetricGuard<'_> {
        MetricGuard {
            metrics: self,
            label,
            started: self.enabled.then(|| (self.clock)()),
        }
    }

    pub fn record(&self, label: &'static str, elapsed_ms: f64) {
        if !self.enabled {
            return;
        }
        let mut samples = self.samples.borrow_mut();
        let sample = samples.entry(label).or_default();
        sample.count += 1;
        sample.total_ms += elapsed_ms;
    }

    pub fn count(&self, label: &str) -> u64 {
        self.samples.borrow().get(label).map(|s| s.count).unwrap_or(0)
    }

    pub fn report(&self) -> BTreeMap<String, MetricSummary> {
        self.samples
            .borrow()
            .iter()
            .map(|(label, sample)| {
                let total_ms = sample.total_ms;
                let average_ms = if sample.count == 0 {
                    0.0
                } else {
                    total_ms / sample.count as f64
                };
                (
                    label.to_string(),
                    MetricSummary {
                        count: sample.count,
                        total_ms,
                        average_ms,
                    },
                )
            })
            .collect()
    }

    pub fn log_report(&self) {
        for (label, summary) in self.report() {
            info!(
                label = %label,
                count = summary.count,
                total_ms = summary.total_ms,
                average_ms = summary.average_ms,
                "Performance"
            );
        }
    }

    pub fn reset(&self) {
        self.samples.borrow_mut().clear();
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new(true)
    }
}

pub struct MetricGuard<'a> {
    metrics: &'a PerformanceMetrics,
    label: &'static str,
    started: Option<f64>,
}

impl Drop for MetricGuard<'_> {
    fn drop(&mut self) {
        if let Some(started) = self.started {
            let elapsed = ((self.metrics.clock)() - started).max(0.0);
            self.metrics.record(self.label, elapsed);
        }
    }
}
