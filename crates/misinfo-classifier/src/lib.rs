//! Misinformation Classifier
//!
//! Training pipeline and inference service for a binary DistilBERT text
//! classifier that flags short social-media posts as likely misinformation.
//!
//! Stages, in data-flow order:
//! - [`RecordStore`] loads raw labeled records
//! - [`LabelEncoder`] maps `"True"`/`"False"` labels to class indices
//! - [`Splitter`] partitions examples into train and eval subsets
//! - [`FeatureEncoder`] tokenizes text into padded id/mask records
//! - [`TrainingOrchestrator`] fine-tunes the classifier
//! - [`Evaluator`] scores it on the held-out subset
//! - [`ArtifactStore`] persists and reloads the trained artifact
//! - [`InferenceService`] classifies single texts
//!
//! [`Pipeline`] wires the training stages together from a [`PipelineConfig`].
//! [`CorpusStats`] summarizes the corpus outside of training.

pub mod artifact;
pub mod backbone;
pub mod classifier;
pub mod config;
pub mod evaluator;
pub mod features;
pub mod inference;
pub mod labels;
pub mod model;
pub mod pipeline;
pub mod record_store;
pub mod split;
pub mod stats;
pub mod trainer;
pub mod vocab;

pub use artifact::{ArtifactManifest, ArtifactStore, ClassifierArtifact};
pub use backbone::BaseModel;
pub use classifier::Classifier;
pub use config::{
    ArtifactConfig, BackboneConfig, BackboneSource, DatasetConfig, DeviceSpec, PipelineConfig,
    ScratchConfig, SplitConfig, TrainingConfig,
};
pub use evaluator::{EvalMetrics, Evaluator};
pub use features::{FeatureEncoder, FeatureEncoderConfig};
pub use inference::InferenceService;
pub use labels::{LabelEncoder, LabelSummary};
pub use pipeline::{Pipeline, PipelineReport};
pub use record_store::RecordStore;
pub use split::Splitter;
pub use stats::CorpusStats;
pub use trainer::{EpochMetrics, TrainingOrchestrator};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::artifact::{ArtifactStore, ClassifierArtifact};
    pub use crate::classifier::Classifier;
    pub use crate::config::PipelineConfig;
    pub use crate::inference::InferenceService;
    pub use crate::pipeline::Pipeline;
    pub use misinfo_core::prelude::*;
}
