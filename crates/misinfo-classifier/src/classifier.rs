//! Classifier trait consumed by interactive front-ends

use async_trait::async_trait;
use misinfo_core::{PredictionResult, Result};

/// Single-text classifier behind the interactive boundary.
///
/// Implementations hold a read-only model; one instance is shared across
/// concurrent requests.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify the given text
    async fn classify(&self, text: &str) -> Result<PredictionResult>;

    /// Name of the loaded model
    fn name(&self) -> &str;
}
