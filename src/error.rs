use thiserror::Error;

/// Crate-wide error type.
///
/// Every variant maps to a process exit code so the binary can report
/// failures the same way regardless of where they originate.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid run configuration, detected before any random draws happen.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The rejection loop hit its draw bound before reaching the target.
    #[error(
        "sampling starved: accepted {accepted} of {target} events after {draws} draws \
         (raise the draw bound or lower the envelope scale)"
    )]
    SamplingStarvation {
        accepted: u64,
        target: u64,
        draws: u64,
    },

    /// Invalid fit inputs (empty range, parameter count mismatch, ...).
    #[error("fit error: {0}")]
    Fit(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A persisted run archive could not be parsed or lacks a histogram.
    #[error("invalid spectrum file: {0}")]
    Format(String),
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn fit(message: impl Into<String>) -> Self {
        Self::Fit(message.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Configuration(_) => 2,
            AppError::SamplingStarvation { .. } => 3,
            AppError::Fit(_) => 4,
            AppError::Io { .. } | AppError::Format(_) => 5,
        }
    }
}
