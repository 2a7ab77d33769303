//! Node-owned metrics registry.
//!
//! All metric names are registered up front, so hot-path increments are
//! lock-free atomics. Counters keep two views: monotonic totals for
//! external scraping, and deltas since the last rotation for gossip
//! efficiency. Histograms are bounded sliding windows summarized on each
//! rotation.

use std::collections::HashMap;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use tracing::debug;

const HISTOGRAM_WINDOW_CAP: usize = 16_384;

#[derive(Default)]
struct Counter {
    total: AtomicI64,
    last: AtomicI64,
    delta: AtomicI64,
}

#[derive(Default)]
struct Gauge {
    value: AtomicI64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Summary {
    count: i64,
    min: i64,
    max: i64,
    mean: i64,
}

#[derive(Default)]
struct HistogramInner {
    window: Vec<i64>,
    exported: Summary,
}

#[derive(Default)]
struct Histogram {
    inner: Mutex<HistogramInner>,
}

/// Counters, gauges and histograms for one node.
pub struct MetricsRegistry {
    counters: HashMap<&'static str, Counter>,
    gauges: HashMap<&'static str, Gauge>,
    histograms: HashMap<&'static str, Histogram>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: HashMap::new(),
            gauges: HashMap::new(),
            histograms: HashMap::new(),
        }
    }

    pub fn register_counter(
        &mut self,
        name: &'static str,
    ) {
        self.counters.insert(name, Counter::default());
    }

    pub fn register_gauge(
        &mut self,
        name: &'static str,
    ) {
        self.gauges.insert(name, Gauge::default());
    }

    pub fn register_histogram(
        &mut self,
        name: &'static str,
    ) {
        self.histograms.insert(name, Histogram::default());
    }

    pub fn inc_counter(
        &self,
        name: &str,
    ) {
        self.add_counter(name, 1);
    }

    pub fn add_counter(
        &self,
        name: &str,
        value: i64,
    ) {
        match self.counters.get(name) {
            Some(counter) => {
                counter.total.fetch_add(value, Ordering::Relaxed);
            }
            None => debug!(name, "increment of unregistered counter"),
        }
    }

    pub fn set_gauge(
        &self,
        name: &str,
        value: i64,
    ) {
        match self.gauges.get(name) {
            Some(gauge) => gauge.value.store(value, Ordering::Relaxed),
            None => debug!(name, "set of unregistered gauge"),
        }
    }

    /// Records one sample into a histogram's current window. Samples past
    /// the window capacity are dropped until the next rotation.
    pub fn observe_histogram(
        &self,
        name: &str,
        value: i64,
    ) {
        match self.histograms.get(name) {
            Some(histogram) => {
                let mut inner = histogram.inner.lock();
                if inner.window.len() < HISTOGRAM_WINDOW_CAP {
                    inner.window.push(value);
                }
            }
            None => debug!(name, "observation on unregistered histogram"),
        }
    }

    /// Rotates counter deltas: the interval view becomes the growth of
    /// each total since the previous rotation.
    pub fn update_delta(&self) {
        for counter in self.counters.values() {
            let total = counter.total.load(Ordering::Relaxed);
            let last = counter.last.swap(total, Ordering::Relaxed);
            counter.delta.store(total - last, Ordering::Relaxed);
        }
    }

    /// Summarizes each histogram's current window into its exported view
    /// and starts a fresh window.
    pub fn rotate_histograms(&self) {
        for histogram in self.histograms.values() {
            let mut inner = histogram.inner.lock();
            inner.exported = summarize(&inner.window);
            inner.window.clear();
        }
    }

    /// Monotonic counter totals, current gauges and exported histogram
    /// summaries.
    pub fn load_raw_values(&self) -> HashMap<String, i64> {
        let mut values = HashMap::new();
        for (name, counter) in &self.counters {
            values.insert((*name).to_owned(), counter.total.load(Ordering::Relaxed));
        }
        self.load_common(&mut values);
        values
    }

    /// Counter deltas since the last rotation, current gauges and
    /// exported histogram summaries.
    pub fn load_interval_values(&self) -> HashMap<String, i64> {
        let mut values = HashMap::new();
        for (name, counter) in &self.counters {
            values.insert((*name).to_owned(), counter.delta.load(Ordering::Relaxed));
        }
        self.load_common(&mut values);
        values
    }

    fn load_common(
        &self,
        values: &mut HashMap<String, i64>,
    ) {
        for (name, gauge) in &self.gauges {
            values.insert((*name).to_owned(), gauge.value.load(Ordering::Relaxed));
        }
        for (name, histogram) in &self.histograms {
            let exported = histogram.inner.lock().exported;
            values.insert(format!("{name}_count"), exported.count);
            values.insert(format!("{name}_min"), exported.min);
            values.insert(format!("{name}_max"), exported.max);
            values.insert(format!("{name}_mean"), exported.mean);
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn summarize(window: &[i64]) -> Summary {
    if window.is_empty() {
        return Summary::default();
    }
    let count = window.len() as i64;
    let mut min = i64::MAX;
    let mut max = i64::MIN;
    let mut sum = 0i64;
    for &value in window {
        min = min.min(value);
        max = max.max(value);
        sum = sum.saturating_add(value);
    }
    Summary {
        count,
        min,
        max,
        mean: sum / count,
    }
}
