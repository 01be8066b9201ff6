use serde::Serialize;
use std::sync::Mutex;

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MetricsSnapshot {
    pub events: usize,
    pub emissions: usize,
    pub solutions: usize,
    pub rejections: usize,
    pub errors: usize,
}

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_event(&self) {
        self.bump(|m| m.events += 1);
    }

    pub fn record_emission(&self) {
        self.bump(|m| m.emissions += 1);
    }

    pub fn record_solution(&self) {
        self.bump(|m| m.solutions += 1);
    }

    pub fn record_rejection(&self) {
        self.bump(|m| m.rejections += 1);
    }

    pub fn record_error(&self) {
        self.bump(|m| m.errors += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
            .lock()
            .map(|metrics| *metrics)
            .unwrap_or_default()
    }

    fn bump(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
