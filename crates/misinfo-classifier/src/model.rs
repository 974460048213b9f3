//! DistilBERT sequence classifier
//!
//! The backbone's first ([CLS]) hidden state feeds a two-layer head:
//! `pre_classifier` → ReLU → dropout → `classifier`. Parameter names follow
//! the Hugging Face `DistilBertForSequenceClassification` layout so
//! pretrained checkpoints and saved artifacts share one naming scheme.

use crate::features::Batch;
use candle_core::{IndexOp, Tensor};
use candle_nn::{Dropout, Linear, Module, VarBuilder};
use candle_transformers::models::distilbert::{Config as DistilBertConfig, DistilBertModel};
use misinfo_core::{Error, Result};
use serde_json::Value;

/// Architecture tag stored in artifact manifests
pub const ARCHITECTURE: &str = "distilbert-sequence-classification";

/// Dropout used by `DistilBertForSequenceClassification` (`seq_classif_dropout`)
pub const DEFAULT_CLASSIFIER_DROPOUT: f32 = 0.2;

/// Prefix of backbone parameters inside the classifier
pub const BACKBONE_PREFIX: &str = "distilbert";

/// Map a candle failure into a model error with context
pub(crate) fn candle_err(context: &'static str) -> impl Fn(candle_core::Error) -> Error {
    move |e| Error::model(format!("{}: {}", context, e))
}

/// Hidden width declared by an architecture config
pub fn hidden_size(architecture: &Value) -> Result<usize> {
    architecture
        .get("dim")
        .or_else(|| architecture.get("hidden_size"))
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .ok_or_else(|| Error::model("architecture config declares no hidden size (dim)"))
}

/// Largest sequence the position embeddings can address
pub fn max_positions(architecture: &Value) -> Option<usize> {
    architecture
        .get("max_position_embeddings")
        .and_then(Value::as_u64)
        .map(|v| v as usize)
}

pub struct SequenceClassifier {
    backbone: DistilBertModel,
    pre_classifier: Linear,
    classifier: Linear,
    dropout: Dropout,
}

impl SequenceClassifier {
    /// Build the classifier over `vb`, creating any missing variables when
    /// `vb` is backed by a `VarMap`
    pub fn load(
        vb: VarBuilder,
        architecture: &Value,
        num_labels: usize,
        dropout: f32,
    ) -> Result<Self> {
        let config: DistilBertConfig = serde_json::from_value(architecture.clone())
            .map_err(|e| Error::model(format!("Failed to parse DistilBERT config: {}", e)))?;
        let dim = hidden_size(architecture)?;

        let backbone = DistilBertModel::load(vb.pp(BACKBONE_PREFIX), &config)
            .map_err(candle_err("Failed to load DistilBERT backbone"))?;
        let pre_classifier = candle_nn::linear(dim, dim, vb.pp("pre_classifier"))
            .map_err(candle_err("Failed to load pre_classifier"))?;
        let classifier = candle_nn::linear(dim, num_labels, vb.pp("classifier"))
            .map_err(candle_err("Failed to load classifier"))?;

        Ok(Self {
            backbone,
            pre_classifier,
            classifier,
            dropout: Dropout::new(dropout),
        })
    }

    /// Logits of shape `(batch, num_labels)`; dropout is active only when
    /// `train` is set
    pub fn forward(&self, batch: &Batch, train: bool) -> Result<Tensor> {
        let hidden = self
            .backbone
            .forward(&batch.input_ids, &batch.padding_mask)
            .map_err(candle_err("Model forward pass failed"))?;

        let cls = hidden
            .i((.., 0))
            .map_err(candle_err("Failed to get CLS token"))?;

        let pooled = self
            .pre_classifier
            .forward(&cls)
            .and_then(|t| t.relu())
            .map_err(candle_err("Pre-classifier failed"))?;
        let pooled = self
            .dropout
            .forward(&pooled, train)
            .map_err(candle_err("Dropout failed"))?;

        self.classifier
            .forward(&pooled)
            .map_err(candle_err("Classification head failed"))
    }
}
