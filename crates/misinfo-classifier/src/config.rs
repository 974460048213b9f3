//! Pipeline configuration
//!
//! Loaded from YAML; every field has a default so an empty document is a
//! complete configuration reproducing the stock training run.

use candle_core::Device;
use misinfo_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for one training run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default)]
    pub split: SplitConfig,

    #[serde(default)]
    pub backbone: BackboneConfig,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub artifact: ArtifactConfig,
}

/// Where the labeled corpus lives and which fields to read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_path")]
    pub path: PathBuf,

    #[serde(default = "default_text_field")]
    pub text_field: String,

    #[serde(default = "default_label_field")]
    pub label_field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of examples kept for training
    #[serde(default = "default_train_fraction")]
    pub train_fraction: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// Backbone selection and feature encoding limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackboneConfig {
    #[serde(default)]
    pub source: BackboneSource,

    #[serde(default)]
    pub device: DeviceSpec,

    /// Maximum sequence length in tokens, special tokens included
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Dropout applied inside the classification head during training
    #[serde(default = "default_classifier_dropout")]
    pub classifier_dropout: f32,

    /// Hugging Face cache override (defaults to the hub's own cache)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

/// Where the initial backbone parameters come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackboneSource {
    /// Directory holding `config.json`, `model.safetensors` and a tokenizer
    Local { path: PathBuf },

    /// Model repository on the Hugging Face Hub
    HuggingFace {
        #[serde(default = "default_repo")]
        repo: String,

        #[serde(default = "default_revision")]
        revision: String,
    },

    /// Randomly initialized backbone with a corpus-built vocabulary
    Scratch(ScratchConfig),
}

/// Architecture of a from-scratch DistilBERT backbone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScratchConfig {
    #[serde(default = "default_scratch_dim")]
    pub dim: usize,

    #[serde(default = "default_scratch_layers")]
    pub n_layers: usize,

    #[serde(default = "default_scratch_heads")]
    pub n_heads: usize,

    #[serde(default = "default_scratch_hidden_dim")]
    pub hidden_dim: usize,

    #[serde(default = "default_scratch_positions")]
    pub max_position_embeddings: usize,

    /// Upper bound on the word-level vocabulary, special tokens included
    #[serde(default = "default_max_vocab")]
    pub max_vocab: usize,
}

/// Device specification (for config files)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda {
        index: Option<usize>,
    },
    Metal {
        index: Option<usize>,
    },
}

/// Optimization knobs for the training loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    #[serde(default = "default_batch_size")]
    pub train_batch_size: usize,

    #[serde(default = "default_batch_size")]
    pub eval_batch_size: usize,

    /// Peak learning rate, decayed linearly to zero over all steps
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default)]
    pub weight_decay: f64,

    /// Seed for per-epoch mini-batch shuffling
    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_true")]
    pub shuffle: bool,

    /// Directory for per-epoch checkpoints. `null` turns checkpointing off.
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: Option<PathBuf>,
}

/// Where the trained artifact is written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    #[serde(default = "default_artifact_root")]
    pub root: PathBuf,

    #[serde(default = "default_artifact_name")]
    pub name: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
            text_field: default_text_field(),
            label_field: default_label_field(),
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: default_train_fraction(),
            seed: default_seed(),
        }
    }
}

impl Default for BackboneConfig {
    fn default() -> Self {
        Self {
            source: BackboneSource::default(),
            device: DeviceSpec::default(),
            max_length: default_max_length(),
            classifier_dropout: default_classifier_dropout(),
            cache_dir: None,
        }
    }
}

impl Default for BackboneSource {
    fn default() -> Self {
        Self::HuggingFace {
            repo: default_repo(),
            revision: default_revision(),
        }
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            dim: default_scratch_dim(),
            n_layers: default_scratch_layers(),
            n_heads: default_scratch_heads(),
            hidden_dim: default_scratch_hidden_dim(),
            max_position_embeddings: default_scratch_positions(),
            max_vocab: default_max_vocab(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            train_batch_size: default_batch_size(),
            eval_batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            weight_decay: 0.0,
            seed: default_seed(),
            shuffle: true,
            checkpoint_dir: default_checkpoint_dir(),
        }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            root: default_artifact_root(),
            name: default_artifact_name(),
        }
    }
}

impl PipelineConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("invalid pipeline config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Check every section for values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let fraction = self.split.train_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(Error::config(format!(
                "split.train_fraction must be in (0, 1), got {}",
                fraction
            )));
        }

        self.backbone.validate()?;
        self.training.validate()?;
        crate::artifact::validate_name(&self.artifact.name)?;
        Ok(())
    }
}

impl BackboneConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_length < 2 {
            return Err(Error::config(format!(
                "backbone.max_length must leave room for [CLS] and [SEP], got {}",
                self.max_length
            )));
        }
        if !(0.0..1.0).contains(&self.classifier_dropout) {
            return Err(Error::config(format!(
                "backbone.classifier_dropout must be in [0, 1), got {}",
                self.classifier_dropout
            )));
        }
        if let BackboneSource::Scratch(scratch) = &self.source {
            if scratch.n_heads == 0 || scratch.dim % scratch.n_heads != 0 {
                return Err(Error::config(format!(
                    "scratch dim {} is not divisible by n_heads {}",
                    scratch.dim, scratch.n_heads
                )));
            }
            if scratch.max_vocab <= crate::vocab::SPECIAL_TOKENS.len() {
                return Err(Error::config("scratch max_vocab leaves no room for words"));
            }
        }
        Ok(())
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::config("training.epochs must be at least 1"));
        }
        if self.train_batch_size == 0 || self.eval_batch_size == 0 {
            return Err(Error::config("batch sizes must be at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::config(format!(
                "training.learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.weight_decay.is_finite() && self.weight_decay >= 0.0) {
            return Err(Error::config("training.weight_decay must be non-negative"));
        }
        Ok(())
    }
}

impl DeviceSpec {
    /// Create the Candle device this spec names
    pub fn to_device(&self) -> Result<Device> {
        match self {
            DeviceSpec::Cpu => Ok(Device::Cpu),
            DeviceSpec::Cuda { index } => Device::new_cuda(index.unwrap_or(0))
                .map_err(|e| Error::model(format!("Failed to create CUDA device: {}", e))),
            DeviceSpec::Metal { index } => Device::new_metal(index.unwrap_or(0))
                .map_err(|e| Error::model(format!("Failed to create Metal device: {}", e))),
        }
    }
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("csvjson.json")
}

fn default_text_field() -> String {
    crate::record_store::DEFAULT_TEXT_FIELD.to_string()
}

fn default_label_field() -> String {
    crate::record_store::DEFAULT_LABEL_FIELD.to_string()
}

fn default_train_fraction() -> f64 {
    crate::split::DEFAULT_TRAIN_FRACTION
}

fn default_seed() -> u64 {
    crate::split::DEFAULT_SEED
}

fn default_max_length() -> usize {
    512
}

fn default_classifier_dropout() -> f32 {
    crate::model::DEFAULT_CLASSIFIER_DROPOUT
}

fn default_repo() -> String {
    "distilbert-base-uncased".to_string()
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_scratch_dim() -> usize {
    64
}

fn default_scratch_layers() -> usize {
    2
}

fn default_scratch_heads() -> usize {
    4
}

fn default_scratch_hidden_dim() -> usize {
    128
}

fn default_scratch_positions() -> usize {
    128
}

fn default_max_vocab() -> usize {
    8000
}

fn default_epochs() -> usize {
    2
}

fn default_batch_size() -> usize {
    4
}

fn default_learning_rate() -> f64 {
    5e-5
}

fn default_true() -> bool {
    true
}

fn default_checkpoint_dir() -> Option<PathBuf> {
    Some(PathBuf::from(crate::trainer::DEFAULT_CHECKPOINT_DIR))
}

fn default_artifact_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_artifact_name() -> String {
    "misinfo-model".to_string()
}
