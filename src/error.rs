use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Invalid checksum: expected {expected:#04x}, got {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },

    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Timed out after {0:?} waiting for a frame")]
    Timeout(std::time::Duration),

    #[error("Serial I/O failed: {0}")]
    Io(#[from] rppal::uart::Error),

    #[error("Read interrupted by shutdown")]
    Interrupted,
}

impl SensorError {
    /// Whether another attempt on the next cycle may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SensorError::Interrupted)
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Working period must be between 0 and 30 minutes, got {0}")]
    WorkingPeriod(u8),

    #[error("Serial port {path} is unavailable: {source}")]
    PortUnavailable {
        path: String,
        #[source]
        source: rppal::uart::Error,
    },

    #[error("Cannot open output file {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
