//! Diagnostic sink injected into the generator

use std::sync::Mutex;

use log::Level;

/// Receives the generator's progress and warning messages
pub trait Observer {
    fn log(&self, level: Level, message: &str);
}

/// Forwards every message to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: "tensor_to_block", level, "{}", message);
    }
}

/// Keeps messages in memory, mostly for tests
#[derive(Debug, Default)]
pub struct RecordingObserver {
    records: Mutex<Vec<(Level, String)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Level, String)> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Messages logged at exactly `level`
    pub fn at(&self, level: Level) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }
}

impl Observer for RecordingObserver {
    fn log(&self, level: Level, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push((level, message.to_string()));
        }
    }
}
