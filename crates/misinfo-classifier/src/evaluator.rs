//! Held-out evaluation
//!
//! Metrics are computed with the flagged (misinformation) class as the
//! positive class.

use crate::artifact::ClassifierArtifact;
use crate::features::FeatureEncoder;
use crate::model::{candle_err, SequenceClassifier};
use candle_core::{Device, D};
use misinfo_core::{Error, FeatureRecord, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Aggregate metrics over an evaluation set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    /// Mean cross-entropy per example
    pub loss: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub samples: usize,
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_count: usize,
}

impl EvalMetrics {
    /// Derive metrics from predictions against targets
    pub fn from_predictions(loss: f64, predictions: &[u32], labels: &[u32], positive: u32) -> Self {
        let mut metrics = Self {
            loss,
            samples: predictions.len().min(labels.len()),
            ..Default::default()
        };

        for (&pred, &label) in predictions.iter().zip(labels) {
            match (pred == positive, label == positive) {
                (true, true) => metrics.tp += 1,
                (true, false) => metrics.fp += 1,
                (false, false) => metrics.tn += 1,
                (false, true) => metrics.fn_count += 1,
            }
        }

        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };
        metrics.accuracy = ratio(metrics.tp + metrics.tn, metrics.samples);
        metrics.precision = ratio(metrics.tp, metrics.tp + metrics.fp);
        metrics.recall = ratio(metrics.tp, metrics.tp + metrics.fn_count);
        metrics.f1 = if metrics.precision + metrics.recall > 0.0 {
            2.0 * metrics.precision * metrics.recall / (metrics.precision + metrics.recall)
        } else {
            0.0
        };
        metrics
    }

    /// Metric name → value, keys prefixed with `eval_`
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        [
            ("eval_loss", self.loss),
            ("eval_accuracy", self.accuracy),
            ("eval_precision", self.precision),
            ("eval_recall", self.recall),
            ("eval_f1", self.f1),
            ("eval_samples", self.samples as f64),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

impl fmt::Display for EvalMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loss={:.4} acc={:.4} prec={:.4} rec={:.4} f1={:.4} (tp={} fp={} tn={} fn={})",
            self.loss,
            self.accuracy,
            self.precision,
            self.recall,
            self.f1,
            self.tp,
            self.fp,
            self.tn,
            self.fn_count
        )
    }
}

/// Runs a trained artifact over featurized examples without updating it
#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    batch_size: usize,
}

impl Evaluator {
    pub fn new(batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::config("eval batch size must be at least 1"));
        }
        Ok(Self { batch_size })
    }

    pub fn evaluate(
        &self,
        artifact: &ClassifierArtifact,
        features: &[FeatureRecord],
    ) -> Result<EvalMetrics> {
        let model = artifact.build_model()?;
        evaluate_model(
            &model,
            artifact.encoder(),
            features,
            self.batch_size,
            artifact.label_convention().flagged_class,
            artifact.device(),
        )
    }
}

pub(crate) fn evaluate_model(
    model: &SequenceClassifier,
    encoder: &FeatureEncoder,
    features: &[FeatureRecord],
    batch_size: usize,
    positive: u32,
    device: &Device,
) -> Result<EvalMetrics> {
    if features.is_empty() {
        return Ok(EvalMetrics::default());
    }

    let mut loss_sum = 0.0f64;
    let mut predictions = Vec::with_capacity(features.len());
    let mut labels = Vec::with_capacity(features.len());

    for chunk in features.chunks(batch_size.max(1)) {
        let refs: Vec<&FeatureRecord> = chunk.iter().collect();
        let batch = encoder.collate(&refs, device)?;

        let logits = model.forward(&batch, false)?;
        let loss = candle_nn::loss::cross_entropy(&logits, &batch.labels)
            .and_then(|l| l.to_scalar::<f32>())
            .map_err(candle_err("Eval loss failed"))?;
        loss_sum += loss as f64 * batch.size as f64;

        let preds: Vec<u32> = logits
            .argmax(D::Minus1)
            .and_then(|p| p.to_vec1())
            .map_err(candle_err("argmax failed"))?;
        predictions.extend(preds);
        labels.extend(chunk.iter().map(|r| r.label));
    }

    let loss = loss_sum / features.len() as f64;
    Ok(EvalMetrics::from_predictions(loss, &predictions, &labels, positive))
}
