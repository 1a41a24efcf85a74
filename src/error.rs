use std::io;
use thiserror::Error;

/// Custom error type for the dashboard engine
#[derive(Error, Debug)]
pub enum DashError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Metric collection failed: {0}")]
    MetricCollection(String),

    #[error("Source {source_id} timed out after {millis}ms")]
    SourceTimeout { source_id: String, millis: u64 },

    #[error("GPU not available: {0}")]
    GpuNotAvailable(String),
}

/// Result type alias for the dashboard engine
pub type Result<T> = std::result::Result<T, DashError>;

impl DashError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        DashError::Config(msg.into())
    }

    pub fn source_unavailable<S: Into<String>>(msg: S) -> Self {
        DashError::SourceUnavailable(msg.into())
    }

    pub fn metric_collection<S: Into<String>>(msg: S) -> Self {
        DashError::MetricCollection(msg.into())
    }

    pub fn gpu_not_available<S: Into<String>>(msg: S) -> Self {
        DashError::GpuNotAvailable(msg.into())
    }

    /// Whether the failure means the source is absent rather than momentarily broken.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DashError::SourceUnavailable(_) | DashError::GpuNotAvailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_kinds() {
        assert!(DashError::source_unavailable("no battery").is_unavailable());
        assert!(DashError::gpu_not_available("no nvml").is_unavailable());
        assert!(!DashError::metric_collection("docker stats failed").is_unavailable());
    }

    #[test]
    fn test_timeout_message() {
        let err = DashError::SourceTimeout {
            source_id: "containers".to_string(),
            millis: 2000,
        };
        assert_eq!(err.to_string(), "Source containers timed out after 2000ms");
    }
}
