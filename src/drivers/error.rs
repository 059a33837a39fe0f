use thiserror::Error;
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("sample rate must be greater than zero")]
    InvalidSampleRate,
    #[error("invalid pass band: {low_hz} Hz .. {high_hz} Hz")]
    InvalidBand { low_hz: f64, high_hz: f64 },
    #[error("channel length mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
    #[error("channel index {index} out of range ({available} channels available)")]
    ChannelOutOfRange { index: usize, available: usize },
}
/// Failures of the raw-sample transport. Always fatal to the acquisition loop.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("sample source unavailable: {0}")]
    Unavailable(String),
    #[error("sample stream failed: {0}")]
    Stream(String),
}
