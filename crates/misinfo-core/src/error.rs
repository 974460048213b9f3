//! Error types for the misinformation detector

/// Result type alias using the detector's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for every pipeline stage
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input corpus unreadable or structurally malformed
    #[error("data source error: {0}")]
    DataSource(String),

    /// Too few examples to split into train and eval subsets
    #[error("insufficient data: {available} example(s) available, at least {required} required")]
    InsufficientData { available: usize, required: usize },

    /// Training requested on an empty training set
    #[error("training set is empty")]
    EmptyTrainingSet,

    /// Loss became NaN or infinite during optimization
    #[error("training diverged at epoch {epoch}, step {step}: loss = {loss}")]
    NumericDivergence { epoch: usize, step: usize, loss: f64 },

    /// No artifact has been saved under the requested name
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    /// Persisted artifact does not match the expected schema
    #[error("artifact corrupt: {0}")]
    ArtifactCorrupt(String),

    /// Tokenizer loading or encoding errors
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Backbone, head or tensor errors
    #[error("model error: {0}")]
    Model(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new data source error
    pub fn data_source(msg: impl Into<String>) -> Self {
        Self::DataSource(msg.into())
    }

    /// Create a new artifact-corrupt error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::ArtifactCorrupt(msg.into())
    }

    /// Create a new tokenizer error
    pub fn tokenizer(msg: impl Into<String>) -> Self {
        Self::Tokenizer(msg.into())
    }

    /// Create a new model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error came from reading a persisted artifact
    pub fn is_artifact_error(&self) -> bool {
        matches!(self, Self::ArtifactNotFound(_) | Self::ArtifactCorrupt(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::InsufficientData {
            available: 1,
            required: 2,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data: 1 example(s) available, at least 2 required"
        );

        let err = Error::NumericDivergence {
            epoch: 1,
            step: 7,
            loss: f64::NAN,
        };
        assert!(err.to_string().contains("epoch 1, step 7"));

        assert_eq!(
            Error::ArtifactNotFound("misinfo-model".into()).to_string(),
            "artifact not found: misinfo-model"
        );
    }

    #[test]
    fn test_artifact_error_kind() {
        assert!(Error::ArtifactNotFound("x".into()).is_artifact_error());
        assert!(Error::corrupt("bad manifest").is_artifact_error());
        assert!(!Error::EmptyTrainingSet.is_artifact_error());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
