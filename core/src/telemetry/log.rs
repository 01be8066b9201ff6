use log::{debug, info, warn};

pub struct LogManager;

impl LogManager {
    pub fn new() -> Self {
        Self
    }

    pub fn record(&self, message: &str) {
        info!("{}", message);
    }

    pub fn record_warn(&self, message: &str) {
        warn!("{}", message);
    }

    pub fn record_debug(&self, message: &str) {
        debug!("{}", message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
