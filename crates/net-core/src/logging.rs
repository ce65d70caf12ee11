//! Per-network log context

use std::fmt::Display;

use log::Level;

/// Log target for records emitted on behalf of a network.
pub const LOG_TARGET: &str = "netd::network";

/// Tags every record with the driver kind and network name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogContext {
    driver: String,
    network: String,
}

impl LogContext {
    pub fn new(driver: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            network: network.into(),
        }
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn log(&self, level: Level, message: impl Display) {
        log::log!(
            target: LOG_TARGET,
            level,
            "driver={} network={}: {}",
            self.driver,
            self.network,
            message
        );
    }

    pub fn debug(&self, message: impl Display) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl Display) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: impl Display) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: impl Display) {
        self.log(Level::Error, message);
    }
}
