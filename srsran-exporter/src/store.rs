//! Thread-safe metric store and Prometheus text rendering.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::declarations::{self, MetricKind, SELF_MONITORING};

/// A unique identifier for a metric time series.
///
/// Ordering is by name, then by the sorted label pairs, which is also the
/// order series are rendered in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey {
    /// The full Prometheus metric name.
    pub name: String,
    /// Label key-value pairs, unique by key and sorted by key.
    pub labels: Vec<(String, String)>,
}

impl SeriesKey {
    /// Build the canonical key for `name` and `labels`.
    ///
    /// Labels are sorted by key; when a key repeats the last value wins.
    pub fn new(name: &str, labels: &[(&str, &str)]) -> Self {
        let labels: BTreeMap<String, String> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Self {
            name: name.to_string(),
            labels: labels.into_iter().collect(),
        }
    }

    /// Format labels for Prometheus exposition format.
    pub fn format_labels(&self) -> String {
        if self.labels.is_empty() {
            return String::new();
        }

        let parts: Vec<String> = self
            .labels
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
            .collect();

        format!("{{{}}}", parts.join(","))
    }
}

/// Concurrency-safe mapping from series to current value.
///
/// All reads and writes go through one lock. Series are created on first
/// write and never removed.
pub struct MetricStore {
    values: Mutex<BTreeMap<SeriesKey, f64>>,
}

/// Create a shareable store handle.
pub type SharedStore = Arc<MetricStore>;

impl MetricStore {
    /// Create a store with the self-monitoring samples seeded to zero.
    pub fn new() -> Self {
        let values = SELF_MONITORING
            .iter()
            .map(|name| (SeriesKey::new(name, &[]), 0.0))
            .collect();

        Self {
            values: Mutex::new(values),
        }
    }

    /// Overwrite the value of a series.
    pub fn set(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let key = SeriesKey::new(name, labels);
        self.values.lock().insert(key, value);
    }

    /// Overwrite several series at once, under a single lock acquisition.
    ///
    /// A concurrent render sees either none or all of them.
    pub fn set_all<I>(&self, samples: I) -> usize
    where
        I: IntoIterator<Item = (SeriesKey, f64)>,
    {
        let mut values = self.values.lock();
        let mut count = 0;
        for (key, value) in samples {
            values.insert(key, value);
            count += 1;
        }
        count
    }

    /// Add `delta` to a series, starting from zero if it does not exist.
    pub fn increment(&self, name: &str, delta: f64, labels: &[(&str, &str)]) {
        let key = SeriesKey::new(name, labels);
        *self.values.lock().entry(key).or_insert(0.0) += delta;
    }

    /// Add one to an unlabelled series.
    pub fn inc(&self, name: &str) {
        self.increment(name, 1.0, &[]);
    }

    /// Current value of a series.
    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let key = SeriesKey::new(name, labels);
        self.values.lock().get(&key).copied()
    }

    /// Get the current number of stored series.
    pub fn series_count(&self) -> usize {
        self.values.lock().len()
    }

    /// Render metrics in Prometheus exposition format.
    ///
    /// The lock is held for the whole pass so every line comes from the
    /// same snapshot.
    pub fn render(&self) -> String {
        let values = self.values.lock();
        let mut output = Vec::with_capacity(values.len() * 96);

        let mut current: Option<&str> = None;

        for (key, value) in values.iter() {
            let name = key.name.as_str();

            if current != Some(name) {
                let synthetic;
                let (help, kind) = match declarations::lookup(name) {
                    Some(decl) => (decl.help, decl.kind),
                    None => {
                        synthetic = format!("{} exported from srsRAN JSON metrics.", name);
                        (synthetic.as_str(), MetricKind::Gauge)
                    }
                };

                writeln!(output, "# HELP {} {}", name, escape_help(help)).ok();
                writeln!(output, "# TYPE {} {}", name, kind.as_str()).ok();
                current = Some(name);
            }

            writeln!(
                output,
                "{}{} {}",
                name,
                key.format_labels(),
                format_value(*value)
            )
            .ok();
        }

        String::from_utf8(output).unwrap_or_default()
    }
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape backslashes and newlines in HELP text.
fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
