use std::path::PathBuf;
use std::time::Duration;

/// Result type for sequencer operations
pub type SequencerResult<T> = Result<T, SequencerError>;

/// Errors raised by plan construction and execution
#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    /// Invalid configuration or unreadable manifest directory. Fatal.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Manifest could not be read before invoking the applier
    #[error("Cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Applying {} timed out after {}s", file.display(), timeout.as_secs())]
    ApplyTimeout { file: PathBuf, timeout: Duration },

    #[error("Phase '{phase}' did not become ready within {}s", timeout.as_secs())]
    StabilizationTimeout { phase: String, timeout: Duration },

    #[error("Deployment cancelled")]
    Cancelled,
}

impl SequencerError {
    pub fn config(message: impl Into<String>) -> Self {
        SequencerError::Config(message.into())
    }
}
