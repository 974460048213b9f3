//! Persisted classifier artifacts
//!
//! An artifact is a directory `<root>/<name>/` holding:
//!
//! - `model.safetensors`: every classifier parameter
//! - `config.json`: backbone architecture
//! - `tokenizer.json`: tokenizer definition
//! - `artifact.json`: manifest with the feature encoder settings, the label
//!   convention and the training history
//!
//! Saves are staged in a sibling directory and swapped into place, so a
//! reader sees either the previous artifact or the new one in full.

use crate::evaluator::EvalMetrics;
use crate::features::{FeatureEncoder, FeatureEncoderConfig};
use crate::model::{SequenceClassifier, ARCHITECTURE};
use crate::trainer::EpochMetrics;
use candle_core::{DType, Device, Var};
use candle_nn::{VarBuilder, VarMap};
use chrono::{DateTime, Utc};
use misinfo_core::{Error, LabelConvention, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

/// Version of the on-disk layout
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

pub const MANIFEST_FILE: &str = "artifact.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";
pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Metadata stored next to the weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub format_version: u32,

    /// Backbone the classifier was fine-tuned from
    pub model_name: String,

    pub architecture: String,
    pub label_convention: LabelConvention,
    pub feature_encoder: FeatureEncoderConfig,
    pub classifier_dropout: f32,

    #[serde(default)]
    pub history: Vec<EpochMetrics>,

    pub created_at: DateTime<Utc>,
}

impl ArtifactManifest {
    pub fn new(
        model_name: String,
        label_convention: LabelConvention,
        feature_encoder: FeatureEncoderConfig,
        classifier_dropout: f32,
        history: Vec<EpochMetrics>,
    ) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            model_name,
            architecture: ARCHITECTURE.to_string(),
            label_convention,
            feature_encoder,
            classifier_dropout,
            history,
            created_at: Utc::now(),
        }
    }

    /// Metrics from the last recorded epoch
    pub fn final_metrics(&self) -> Option<&EvalMetrics> {
        self.history.last().map(|m| &m.eval)
    }

    fn validate(&self) -> Result<()> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(Error::corrupt(format!(
                "unsupported artifact format version {} (expected {})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if self.architecture != ARCHITECTURE {
            return Err(Error::corrupt(format!(
                "unknown architecture '{}'",
                self.architecture
            )));
        }
        self.label_convention.validate()
    }
}

/// Trained parameters plus everything needed to rebuild the classifier
pub struct ClassifierArtifact {
    parameters: VarMap,
    architecture: Value,
    encoder: FeatureEncoder,
    manifest: ArtifactManifest,
    device: Device,
}

impl std::fmt::Debug for ClassifierArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierArtifact")
            .field("model_name", &self.manifest.model_name)
            .field("parameters", &self.parameter_count())
            .field("encoder", &self.encoder)
            .field("device", &self.device)
            .finish()
    }
}

impl ClassifierArtifact {
    pub fn new(
        parameters: VarMap,
        architecture: Value,
        encoder: FeatureEncoder,
        manifest: ArtifactManifest,
        device: Device,
    ) -> Self {
        Self {
            parameters,
            architecture,
            encoder,
            manifest,
            device,
        }
    }

    pub fn architecture(&self) -> &Value {
        &self.architecture
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn manifest(&self) -> &ArtifactManifest {
        &self.manifest
    }

    pub fn label_convention(&self) -> &LabelConvention {
        &self.manifest.label_convention
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters
            .all_vars()
            .iter()
            .map(|v| v.elem_count())
            .sum()
    }

    /// Rebuild the classifier over the stored parameters
    pub fn build_model(&self) -> Result<SequenceClassifier> {
        let vb = VarBuilder::from_varmap(&self.parameters, DType::F32, &self.device);
        SequenceClassifier::load(
            vb,
            &self.architecture,
            self.manifest.label_convention.num_labels(),
            self.manifest.classifier_dropout,
        )
    }
}

/// Reject names that are not a single plain path component
pub fn validate_name(name: &str) -> Result<()> {
    let plain = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && Path::new(name).components().count() == 1;
    if plain {
        Ok(())
    } else {
        Err(Error::config(format!("invalid artifact name '{}'", name)))
    }
}

/// Saves and loads artifacts under a root directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    device: Device,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            device: Device::Cpu,
        }
    }

    /// Device loaded parameters are placed on
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name)
            .map(|p| p.join(MANIFEST_FILE).is_file())
            .unwrap_or(false)
    }

    /// Write `artifact` under `name`, replacing any previous artifact in full
    pub fn save(&self, artifact: &ClassifierArtifact, name: &str) -> Result<PathBuf> {
        let target = self.path_for(name)?;
        std::fs::create_dir_all(&self.root)?;

        let staging = self.root.join(format!(".{}.staging", name));
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        std::fs::create_dir_all(&staging)?;

        artifact
            .parameters
            .save(staging.join(WEIGHTS_FILE))
            .map_err(|e| Error::model(format!("Failed to save weights: {}", e)))?;
        std::fs::write(
            staging.join(CONFIG_FILE),
            serde_json::to_string_pretty(&artifact.architecture)?,
        )?;
        artifact
            .encoder
            .tokenizer()
            .save(staging.join(TOKENIZER_FILE), false)
            .map_err(|e| Error::tokenizer(format!("Failed to save tokenizer: {}", e)))?;
        std::fs::write(
            staging.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&artifact.manifest)?,
        )?;

        let previous = self.root.join(format!(".{}.old", name));
        swap_into_place(&staging, &target, &previous)?;

        tracing::info!(
            "Saved artifact '{}' ({} parameters) to {}",
            name,
            artifact.parameter_count(),
            target.display()
        );
        Ok(target)
    }

    /// Load the artifact saved under `name`
    pub fn load(&self, name: &str) -> Result<ClassifierArtifact> {
        let dir = self.path_for(name)?;
        if !dir.is_dir() {
            return Err(Error::ArtifactNotFound(dir.display().to_string()));
        }

        let manifest: ArtifactManifest = read_json(&dir.join(MANIFEST_FILE))?;
        manifest.validate()?;

        let architecture: Value = read_json(&dir.join(CONFIG_FILE))?;

        let tokenizer = Tokenizer::from_file(dir.join(TOKENIZER_FILE))
            .map_err(|e| Error::corrupt(format!("unreadable {}: {}", TOKENIZER_FILE, e)))?;
        let encoder = FeatureEncoder::from_config(tokenizer, manifest.feature_encoder.clone())
            .map_err(|e| Error::corrupt(format!("feature encoder: {}", e)))?;

        let parameters = self.load_parameters(&dir.join(WEIGHTS_FILE))?;
        self.check_parameters(&parameters, &architecture, &manifest)?;

        tracing::info!(
            "Loaded artifact '{}' (base model {}, created {})",
            name,
            manifest.model_name,
            manifest.created_at
        );

        Ok(ClassifierArtifact {
            parameters,
            architecture,
            encoder,
            manifest,
            device: self.device.clone(),
        })
    }

    fn load_parameters(&self, path: &Path) -> Result<VarMap> {
        let tensors = candle_core::safetensors::load(path, &self.device)
            .map_err(|e| Error::corrupt(format!("unreadable {}: {}", WEIGHTS_FILE, e)))?;

        let varmap = VarMap::new();
        {
            let mut data = varmap
                .data()
                .lock()
                .map_err(|_| Error::internal("parameter map lock poisoned"))?;
            for (name, tensor) in tensors {
                let var = Var::from_tensor(&tensor)
                    .map_err(|e| Error::corrupt(format!("parameter {}: {}", name, e)))?;
                data.insert(name, var);
            }
        }
        Ok(varmap)
    }

    /// The stored parameters must be exactly the ones the architecture
    /// declares, with matching shapes
    fn check_parameters(
        &self,
        parameters: &VarMap,
        architecture: &Value,
        manifest: &ArtifactManifest,
    ) -> Result<()> {
        let reference = VarMap::new();
        SequenceClassifier::load(
            VarBuilder::from_varmap(&reference, DType::F32, &self.device),
            architecture,
            manifest.label_convention.num_labels(),
            manifest.classifier_dropout,
        )
        .map_err(|e| Error::corrupt(format!("architecture: {}", e)))?;

        let shapes = |map: &VarMap| -> Result<BTreeMap<String, Vec<usize>>> {
            let data = map
                .data()
                .lock()
                .map_err(|_| Error::internal("parameter map lock poisoned"))?;
            Ok(data
                .iter()
                .map(|(name, var)| (name.clone(), var.dims().to_vec()))
                .collect())
        };
        let expected = shapes(&reference)?;
        let stored = shapes(parameters)?;

        if let Some((name, dims)) = expected
            .iter()
            .find(|(name, dims)| stored.get(*name) != Some(*dims))
        {
            return Err(Error::corrupt(match stored.get(name) {
                Some(found) => format!("parameter {} has shape {:?}, expected {:?}", name, found, dims),
                None => format!("missing parameter {}", name),
            }));
        }
        if let Some(extra) = stored.keys().find(|name| !expected.contains_key(*name)) {
            return Err(Error::corrupt(format!("unexpected parameter {}", extra)));
        }
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::corrupt(format!("unreadable {}: {}", file_name, e)))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::corrupt(format!("malformed {}: {}", file_name, e)))
}

/// Move `staging` to `target`, parking any existing `target` at `previous`
/// until the move succeeds. On failure the parked artifact is put back.
fn swap_into_place(staging: &Path, target: &Path, previous: &Path) -> Result<()> {
    if !target.exists() {
        std::fs::rename(staging, target)?;
        return Ok(());
    }

    if previous.exists() {
        std::fs::remove_dir_all(previous)?;
    }
    std::fs::rename(target, previous)?;

    if let Err(e) = std::fs::rename(staging, target) {
        tracing::warn!(
            "Failed to move new artifact into {}, restoring the previous one: {}",
            target.display(),
            e
        );
        std::fs::rename(previous, target)?;
        return Err(e.into());
    }

    std::fs::remove_dir_all(previous)?;
    Ok(())
}
