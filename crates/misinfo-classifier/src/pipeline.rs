//! End-to-end training run
//!
//! Load → encode labels → split → resolve backbone → featurize → train →
//! evaluate → save. Each stage runs to completion before the next starts.

use crate::artifact::{ArtifactStore, ClassifierArtifact};
use crate::backbone::BaseModel;
use crate::config::PipelineConfig;
use crate::evaluator::{EvalMetrics, Evaluator};
use crate::features::DEFAULT_ENCODE_CHUNK;
use crate::labels::{LabelEncoder, LabelSummary};
use crate::record_store::RecordStore;
use crate::split::Splitter;
use crate::trainer::{EpochMetrics, TrainingOrchestrator};
use misinfo_core::{LabelConvention, RawRecord, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub labels: LabelSummary,
    pub train_size: usize,
    pub eval_size: usize,

    /// Final evaluation of the trained artifact
    pub metrics: EvalMetrics,
    pub history: Vec<EpochMetrics>,
    pub artifact_path: PathBuf,
}

pub struct Pipeline {
    config: PipelineConfig,
    convention: LabelConvention,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            convention: LabelConvention::default(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the configured dataset and run every stage
    pub fn run(&self) -> Result<(ClassifierArtifact, PipelineReport)> {
        let dataset = &self.config.dataset;
        tracing::info!("Loading dataset from {}", dataset.path.display());
        let records = RecordStore::from_config(dataset).load(&dataset.path)?;
        self.run_on(&records)
    }

    /// Run every stage after loading, over records already in memory
    pub fn run_on(&self, records: &[RawRecord]) -> Result<(ClassifierArtifact, PipelineReport)> {
        let started = Instant::now();

        let (examples, labels) =
            LabelEncoder::new(self.convention.clone()).encode_with_summary(records);

        let split = Splitter::new(self.config.split.train_fraction, self.config.split.seed)?
            .split(&examples)?;

        let corpus: Vec<&str> = split.train.iter().map(|e| e.text.as_str()).collect();
        let base = BaseModel::load(&self.config.backbone, &corpus)?
            .with_label_convention(self.convention.clone())?;

        tracing::info!("Encoding features (max_length={})", base.encoder.max_length());
        let train_features = base
            .encoder
            .encode_dataset(&split.train, DEFAULT_ENCODE_CHUNK)?;
        let eval_features = base.encoder.encode_dataset(&split.eval, DEFAULT_ENCODE_CHUNK)?;

        let artifact = TrainingOrchestrator::new(self.config.training.clone())?.train(
            base,
            &train_features,
            &eval_features,
        )?;

        let metrics = Evaluator::new(self.config.training.eval_batch_size)?
            .evaluate(&artifact, &eval_features)?;
        tracing::info!("Final evaluation: {}", metrics);

        let store = ArtifactStore::new(&self.config.artifact.root);
        let artifact_path = store.save(&artifact, &self.config.artifact.name)?;

        tracing::info!(
            "Pipeline finished in {:.1}s",
            started.elapsed().as_secs_f64()
        );

        let report = PipelineReport {
            labels,
            train_size: split.train.len(),
            eval_size: split.eval.len(),
            metrics,
            history: artifact.manifest().history.clone(),
            artifact_path,
        };
        Ok((artifact, report))
    }
}
