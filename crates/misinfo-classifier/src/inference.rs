//! Single-text inference over a trained artifact

use crate::artifact::{ArtifactStore, ClassifierArtifact};
use crate::classifier::Classifier;
use crate::model::{candle_err, SequenceClassifier};
use async_trait::async_trait;
use candle_core::D;
use misinfo_core::{Error, PredictionResult, Result};
use std::sync::Arc;

/// Read-only classifier over a shared artifact.
///
/// The service never mutates the artifact; one instance can serve
/// concurrent callers.
pub struct InferenceService {
    artifact: Arc<ClassifierArtifact>,
    model: SequenceClassifier,
    name: String,
}

impl InferenceService {
    pub fn new(artifact: Arc<ClassifierArtifact>) -> Result<Self> {
        let model = artifact.build_model()?;
        let name = artifact.manifest().model_name.clone();
        Ok(Self {
            artifact,
            model,
            name,
        })
    }

    /// Load the named artifact from `store` and wrap it
    pub fn from_store(store: &ArtifactStore, name: &str) -> Result<Self> {
        let artifact = store.load(name)?;
        let mut service = Self::new(Arc::new(artifact))?;
        service.name = name.to_string();
        Ok(service)
    }

    pub fn artifact(&self) -> &ClassifierArtifact {
        &self.artifact
    }

    /// Classify one text. Empty text is valid input.
    pub fn predict(&self, text: &str) -> Result<PredictionResult> {
        let encoder = self.artifact.encoder();
        let record = encoder.encode_text(text)?;
        let batch = encoder.collate(&[&record], self.artifact.device())?;

        let logits = self.model.forward(&batch, false)?;
        let probs: Vec<f32> = candle_nn::ops::softmax(&logits, D::Minus1)
            .and_then(|p| p.squeeze(0))
            .and_then(|p| p.to_vec1())
            .map_err(candle_err("Softmax failed"))?;

        if probs.is_empty() || probs.iter().any(|p| !p.is_finite()) {
            return Err(Error::model(format!(
                "classifier produced non-finite probabilities: {:?}",
                probs
            )));
        }

        let (predicted, confidence) = probs
            .iter()
            .copied()
            .enumerate()
            .fold((0usize, f32::MIN), |best, (i, p)| if p > best.1 { (i, p) } else { best });
        let predicted_class = predicted as u32;

        let result = PredictionResult {
            predicted_class,
            confidence,
            verdict: self.artifact.label_convention().verdict(predicted_class),
        };
        tracing::debug!(
            "Predicted class {} ({:.4}) for {} chars",
            result.predicted_class,
            result.confidence,
            text.len()
        );
        Ok(result)
    }
}

#[async_trait]
impl Classifier for InferenceService {
    async fn classify(&self, text: &str) -> Result<PredictionResult> {
        self.predict(text)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
