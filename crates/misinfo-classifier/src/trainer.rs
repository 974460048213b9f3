//! Fine-tuning loop
//!
//! AdamW with a linear learning-rate decay to zero over all optimizer
//! steps. Mini-batch order is reshuffled every epoch from `seed + epoch`,
//! and the held-out set is evaluated after every epoch.

use crate::artifact::{ArtifactManifest, ClassifierArtifact};
use crate::backbone::BaseModel;
use crate::config::TrainingConfig;
use crate::evaluator::{evaluate_model, EvalMetrics};
use crate::model::{candle_err, SequenceClassifier};
use candle_core::DType;
use candle_nn::{Optimizer, VarBuilder, VarMap};
use misinfo_core::{Error, FeatureRecord, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

const CHECKPOINT_PREFIX: &str = "checkpoint-";

/// Checkpoint directory used unless the config overrides or disables it
pub const DEFAULT_CHECKPOINT_DIR: &str = "results";

/// Metrics recorded at the end of one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch number
    pub epoch: usize,

    /// Mean training loss per example
    pub train_loss: f64,

    /// Learning rate used for the last step of the epoch
    pub learning_rate: f64,

    pub eval: EvalMetrics,
}

#[derive(Debug, Serialize)]
struct TrainerState<'a> {
    epoch: usize,
    global_step: usize,
    max_steps: usize,
    history: &'a [EpochMetrics],
}

/// Drives optimization of a base model over featurized examples
#[derive(Debug, Clone)]
pub struct TrainingOrchestrator {
    config: TrainingConfig,
}

impl TrainingOrchestrator {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Linear decay from the peak rate; `step` is 0-based
    pub fn learning_rate_at(&self, step: usize, total_steps: usize) -> f64 {
        if total_steps == 0 {
            return self.config.learning_rate;
        }
        let remaining = total_steps.saturating_sub(step) as f64;
        self.config.learning_rate * remaining / total_steps as f64
    }

    /// Train `base` and return the resulting artifact with its history
    pub fn train(
        &self,
        base: BaseModel,
        train: &[FeatureRecord],
        eval: &[FeatureRecord],
    ) -> Result<ClassifierArtifact> {
        if train.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }

        let config = &self.config;
        let convention = base.convention.clone();
        let vb = VarBuilder::from_varmap(&base.varmap, DType::F32, &base.device);
        let model = SequenceClassifier::load(
            vb,
            &base.architecture,
            convention.num_labels(),
            base.classifier_dropout,
        )?;

        let mut optimizer = candle_nn::AdamW::new(
            base.varmap.all_vars(),
            candle_nn::ParamsAdamW {
                lr: config.learning_rate,
                weight_decay: config.weight_decay,
                ..Default::default()
            },
        )
        .map_err(candle_err("Failed to create optimizer"))?;

        let steps_per_epoch = train.len().div_ceil(config.train_batch_size);
        let total_steps = steps_per_epoch * config.epochs;

        tracing::info!(
            "Training on {} examples ({} eval): epochs={}, batch={}, lr={}, wd={}, steps={}",
            train.len(),
            eval.len(),
            config.epochs,
            config.train_batch_size,
            config.learning_rate,
            config.weight_decay,
            total_steps
        );

        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut history: Vec<EpochMetrics> = Vec::with_capacity(config.epochs);
        let mut global_step = 0usize;

        for epoch_index in 0..config.epochs {
            let epoch = epoch_index + 1;
            if config.shuffle {
                order.sort_unstable();
                let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(epoch_index as u64));
                order.shuffle(&mut rng);
            }

            let mut loss_sum = 0.0f64;
            let mut learning_rate = config.learning_rate;

            for chunk in order.chunks(config.train_batch_size) {
                let records: Vec<&FeatureRecord> = chunk.iter().map(|&i| &train[i]).collect();
                let batch = base.encoder.collate(&records, &base.device)?;

                learning_rate = self.learning_rate_at(global_step, total_steps);
                optimizer.set_learning_rate(learning_rate);

                let logits = model.forward(&batch, true)?;
                let loss = candle_nn::loss::cross_entropy(&logits, &batch.labels)
                    .map_err(candle_err("Loss computation failed"))?;
                let loss_value = loss
                    .to_scalar::<f32>()
                    .map_err(candle_err("Loss scalar failed"))? as f64;

                global_step += 1;
                if !loss_value.is_finite() {
                    return Err(Error::NumericDivergence {
                        epoch,
                        step: global_step,
                        loss: loss_value,
                    });
                }

                optimizer
                    .backward_step(&loss)
                    .map_err(candle_err("Backward step failed"))?;

                loss_sum += loss_value * batch.size as f64;
                tracing::debug!(
                    "epoch {} step {}/{} loss={:.4} lr={:.3e}",
                    epoch,
                    global_step,
                    total_steps,
                    loss_value,
                    learning_rate
                );
            }

            let train_loss = loss_sum / train.len() as f64;
            let eval_metrics = evaluate_model(
                &model,
                &base.encoder,
                eval,
                config.eval_batch_size,
                convention.flagged_class,
                &base.device,
            )?;

            tracing::info!(
                "epoch {}/{} | train_loss={:.4} eval_loss={:.4} eval_accuracy={:.4}",
                epoch,
                config.epochs,
                train_loss,
                eval_metrics.loss,
                eval_metrics.accuracy
            );

            history.push(EpochMetrics {
                epoch,
                train_loss,
                learning_rate,
                eval: eval_metrics,
            });

            if let Some(dir) = &config.checkpoint_dir {
                let state = TrainerState {
                    epoch,
                    global_step,
                    max_steps: total_steps,
                    history: &history,
                };
                write_checkpoint(dir, &base.varmap, &state)?;
            }
        }

        let manifest = ArtifactManifest::new(
            base.name.clone(),
            convention,
            base.encoder.config().clone(),
            base.classifier_dropout,
            history,
        );

        Ok(ClassifierArtifact::new(
            base.varmap,
            base.architecture,
            base.encoder,
            manifest,
            base.device,
        ))
    }
}

/// Write `checkpoint-<epoch>/` and remove every older checkpoint
fn write_checkpoint(dir: &Path, varmap: &VarMap, state: &TrainerState<'_>) -> Result<()> {
    let name = format!("{}{}", CHECKPOINT_PREFIX, state.epoch);
    let path = dir.join(&name);
    std::fs::create_dir_all(&path)?;

    varmap
        .save(path.join("model.safetensors"))
        .map_err(candle_err("Failed to save checkpoint weights"))?;
    std::fs::write(
        path.join("trainer_state.json"),
        serde_json::to_string_pretty(state)?,
    )?;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if file_name.starts_with(CHECKPOINT_PREFIX) && file_name != name && entry.path().is_dir() {
            std::fs::remove_dir_all(entry.path())?;
            tracing::debug!("Removed stale checkpoint {}", file_name);
        }
    }

    tracing::info!("Saved checkpoint {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backbone::BaseModel;
    use crate::config::{BackboneConfig, BackboneSource, ScratchConfig};
    use misinfo_core::LabeledExample;

    fn base(corpus: &[&str]) -> BaseModel {
        let config = BackboneConfig {
            source: BackboneSource::Scratch(ScratchConfig {
                dim: 16,
                n_layers: 1,
                n_heads: 2,
                hidden_dim: 32,
                max_position_embeddings: 32,
                max_vocab: 200,
            }),
            ..Default::default()
        };
        BaseModel::load(&config, corpus).unwrap()
    }

    fn features(base: &BaseModel, texts: &[(&str, u32)]) -> Vec<FeatureRecord> {
        let examples: Vec<LabeledExample> = texts
            .iter()
            .map(|(text, label)| LabeledExample {
                text: text.to_string(),
                label: *label,
            })
            .collect();
        base.encoder.encode_batch(&examples).unwrap()
    }

    const DATA: [(&str, u32); 6] = [
        ("miracle cure hidden by doctors", 1),
        ("council meets on tuesday", 0),
        ("moon landing was faked", 1),
        ("library extends opening hours", 0),
        ("secret plot behind the weather", 1),
        ("bus routes change next week", 0),
    ];

    #[test]
    fn test_empty_training_set() {
        let texts: Vec<&str> = DATA.iter().map(|(t, _)| *t).collect();
        let base = base(&texts);
        let eval = features(&base, &DATA[..2]);

        let trainer = TrainingOrchestrator::new(TrainingConfig::default()).unwrap();
        let result = trainer.train(base, &[], &eval);
        assert!(matches!(result, Err(Error::EmptyTrainingSet)));
    }

    #[test]
    fn test_linear_decay() {
        let trainer = TrainingOrchestrator::new(TrainingConfig {
            learning_rate: 1e-3,
            ..Default::default()
        })
        .unwrap();

        assert_eq!(trainer.learning_rate_at(0, 4), 1e-3);
        assert!((trainer.learning_rate_at(2, 4) - 5e-4).abs() < 1e-12);
        assert!((trainer.learning_rate_at(3, 4) - 2.5e-4).abs() < 1e-12);
    }

    #[test]
    fn test_training_records_history_and_checkpoint() {
        let texts: Vec<&str> = DATA.iter().map(|(t, _)| *t).collect();
        let base = base(&texts);
        let train = features(&base, &DATA[..5]);
        let eval = features(&base, &DATA[5..]);
        let dir = tempfile::tempdir().unwrap();

        let trainer = TrainingOrchestrator::new(TrainingConfig {
            epochs: 2,
            train_batch_size: 2,
            learning_rate: 1e-3,
            checkpoint_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap();

        let artifact = trainer.train(base, &train, &eval).unwrap();
        let history = &artifact.manifest().history;

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].epoch, 1);
        assert_eq!(history[1].eval.samples, 1);
        assert!(history.iter().all(|m| m.train_loss.is_finite()));
        assert!(history[1].learning_rate < history[0].learning_rate);

        assert!(!dir.path().join("checkpoint-1").exists());
        assert!(dir.path().join("checkpoint-2/model.safetensors").exists());
        assert!(dir.path().join("checkpoint-2/trainer_state.json").exists());
    }

    #[test]
    fn test_empty_eval_set_yields_zeroed_metrics() {
        let texts: Vec<&str> = DATA.iter().map(|(t, _)| *t).collect();
        let base = base(&texts);
        let train = features(&base, &DATA);

        let trainer = TrainingOrchestrator::new(TrainingConfig {
            epochs: 1,
            checkpoint_dir: None,
            ..Default::default()
        })
        .unwrap();

        let artifact = trainer.train(base, &train, &[]).unwrap();
        assert_eq!(artifact.manifest().history[0].eval, EvalMetrics::default());
    }

    #[test]
    fn test_non_finite_loss_stops_training() {
        let texts: Vec<&str> = DATA.iter().map(|(t, _)| *t).collect();
        let mut base = base(&texts);
        let train = features(&base, &DATA[..4]);
        let eval = features(&base, &DATA[4..]);
        let dir = tempfile::tempdir().unwrap();

        let nan = candle_core::Tensor::full(f32::NAN, 2usize, &candle_core::Device::Cpu).unwrap();
        base.varmap.set_one("classifier.bias", nan).unwrap();

        let trainer = TrainingOrchestrator::new(TrainingConfig {
            epochs: 2,
            checkpoint_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap();

        let result = trainer.train(base, &train, &eval);
        match result {
            Err(Error::NumericDivergence { epoch, step, loss }) => {
                assert_eq!(epoch, 1);
                assert_eq!(step, 1);
                assert!(loss.is_nan());
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("training with NaN parameters produced an artifact"),
        }
        assert!(!dir.path().join("checkpoint-1").exists());
    }
}
