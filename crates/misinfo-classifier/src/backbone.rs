//! Resolving the initial backbone
//!
//! A backbone is resolved into a trainable parameter set, an architecture
//! config and a feature encoder. Pretrained weights are copied into fresh
//! variables of a full sequence classifier, so the classification head
//! starts from random initialization while the encoder starts pretrained.

use crate::config::{BackboneConfig, BackboneSource, ScratchConfig};
use crate::features::FeatureEncoder;
use crate::model::{self, candle_err, SequenceClassifier, BACKBONE_PREFIX};
use crate::vocab::{build_vocab, word_level_tokenizer, wordpiece_tokenizer, PAD_TOKEN};
use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use misinfo_core::{Error, LabelConvention, Result};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

const CONFIG_FILE: &str = "config.json";
const WEIGHTS_FILE: &str = "model.safetensors";
const TOKENIZER_FILE: &str = "tokenizer.json";
const VOCAB_FILE: &str = "vocab.txt";
const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";

/// Files making up a pretrained backbone
#[derive(Debug, Clone)]
struct BackboneFiles {
    config: PathBuf,
    weights: PathBuf,
    tokenizer: TokenizerFile,
    tokenizer_config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
enum TokenizerFile {
    Json(PathBuf),
    Vocab(PathBuf),
}

/// Untrained classifier ready for the training loop
pub struct BaseModel {
    pub varmap: VarMap,
    pub architecture: Value,
    pub encoder: FeatureEncoder,
    pub device: Device,

    /// Human-readable origin, recorded in the artifact manifest
    pub name: String,
    pub classifier_dropout: f32,
    pub convention: LabelConvention,
}

impl BaseModel {
    /// Resolve the configured backbone. `corpus` supplies the vocabulary
    /// for from-scratch backbones and is ignored otherwise.
    pub fn load<S: AsRef<str>>(config: &BackboneConfig, corpus: &[S]) -> Result<Self> {
        config.validate()?;
        let device = config.device.to_device()?;

        match &config.source {
            BackboneSource::Local { path } => {
                let files = local_files(path)?;
                Self::pretrained(&files, config, device, path.display().to_string())
            }
            BackboneSource::HuggingFace { repo, revision } => {
                let files = download_files(repo, revision, config.cache_dir.as_deref())?;
                Self::pretrained(&files, config, device, format!("{}@{}", repo, revision))
            }
            BackboneSource::Scratch(scratch) => Self::scratch(scratch, config, device, corpus),
        }
    }

    /// Build a randomly initialized backbone with a corpus vocabulary
    pub fn scratch<S: AsRef<str>>(
        scratch: &ScratchConfig,
        config: &BackboneConfig,
        device: Device,
        corpus: &[S],
    ) -> Result<Self> {
        let vocab = build_vocab(corpus, scratch.max_vocab)?;
        let tokenizer = word_level_tokenizer(&vocab)?;
        let max_length = config.max_length.min(scratch.max_position_embeddings);
        let encoder = FeatureEncoder::new(tokenizer, max_length)?;
        let architecture =
            scratch_architecture(scratch, vocab.len(), encoder.config().pad_token_id);

        let convention = LabelConvention::default();
        let varmap = VarMap::new();
        init_parameters(&varmap, &architecture, &convention, config, &device)?;

        tracing::info!(
            "Initialized scratch backbone: vocab={}, dim={}, layers={}, heads={}",
            vocab.len(),
            scratch.dim,
            scratch.n_layers,
            scratch.n_heads
        );

        Ok(Self {
            varmap,
            architecture,
            encoder,
            device,
            name: "scratch".to_string(),
            classifier_dropout: config.classifier_dropout,
            convention,
        })
    }

    fn pretrained(
        files: &BackboneFiles,
        config: &BackboneConfig,
        device: Device,
        name: String,
    ) -> Result<Self> {
        let content = std::fs::read_to_string(&files.config).map_err(|e| {
            Error::model(format!("Failed to read {}: {}", files.config.display(), e))
        })?;
        let architecture: Value = serde_json::from_str(&content)
            .map_err(|e| Error::model(format!("Failed to parse config JSON: {}", e)))?;

        let tokenizer = load_tokenizer(files)?;
        let max_length = match model::max_positions(&architecture) {
            Some(limit) => config.max_length.min(limit),
            None => config.max_length,
        };
        let encoder = FeatureEncoder::new(tokenizer, max_length)?;

        let convention = LabelConvention::default();
        let varmap = VarMap::new();
        init_parameters(&varmap, &architecture, &convention, config, &device)?;
        copy_pretrained(&varmap, &files.weights, &device)?;

        tracing::info!("Loaded pretrained backbone {} (max_length={})", name, max_length);

        Ok(Self {
            varmap,
            architecture,
            encoder,
            device,
            name,
            classifier_dropout: config.classifier_dropout,
            convention,
        })
    }

    /// Use a non-default label convention for this run
    pub fn with_label_convention(mut self, convention: LabelConvention) -> Result<Self> {
        convention.validate()?;
        if convention.num_labels() != self.convention.num_labels() {
            return Err(Error::config("label convention must keep two classes"));
        }
        self.convention = convention;
        Ok(self)
    }
}

/// Architecture config for a from-scratch DistilBERT
pub fn scratch_architecture(scratch: &ScratchConfig, vocab_size: usize, pad_token_id: u32) -> Value {
    json!({
        "model_type": "distilbert",
        "vocab_size": vocab_size,
        "dim": scratch.dim,
        "n_layers": scratch.n_layers,
        "n_heads": scratch.n_heads,
        "hidden_dim": scratch.hidden_dim,
        "activation": "gelu",
        "max_position_embeddings": scratch.max_position_embeddings,
        "initializer_range": 0.02,
        "pad_token_id": pad_token_id
    })
}

/// Create every classifier variable inside `varmap`
fn init_parameters(
    varmap: &VarMap,
    architecture: &Value,
    convention: &LabelConvention,
    config: &BackboneConfig,
    device: &Device,
) -> Result<()> {
    let vb = VarBuilder::from_varmap(varmap, DType::F32, device);
    SequenceClassifier::load(
        vb,
        architecture,
        convention.num_labels(),
        config.classifier_dropout,
    )?;
    Ok(())
}

/// Overwrite variables with checkpoint tensors of the same name. Names with
/// or without the backbone prefix are accepted.
fn copy_pretrained(varmap: &VarMap, weights: &Path, device: &Device) -> Result<()> {
    let tensors = candle_core::safetensors::load(weights, device)
        .map_err(candle_err("Failed to read pretrained weights"))?;

    let data = varmap
        .data()
        .lock()
        .map_err(|_| Error::internal("parameter map lock poisoned"))?;

    let prefix = format!("{}.", BACKBONE_PREFIX);
    let mut copied = 0usize;
    let mut fresh: Vec<&str> = Vec::new();

    for (name, var) in data.iter() {
        let source = tensors.get(name).or_else(|| {
            name.strip_prefix(prefix.as_str())
                .and_then(|bare| tensors.get(bare))
        });

        match source {
            Some(tensor) => {
                if tensor.dims() != var.dims() {
                    return Err(Error::model(format!(
                        "shape mismatch for {}: checkpoint {:?}, model {:?}",
                        name,
                        tensor.dims(),
                        var.dims()
                    )));
                }
                let tensor = tensor
                    .to_dtype(DType::F32)
                    .map_err(candle_err("Failed to convert pretrained tensor"))?;
                var.set(&tensor)
                    .map_err(candle_err("Failed to copy pretrained tensor"))?;
                copied += 1;
            }
            None => fresh.push(name.as_str()),
        }
    }

    if copied == 0 {
        return Err(Error::model(format!(
            "{} holds no tensors matching the DistilBERT layout",
            weights.display()
        )));
    }

    fresh.sort_unstable();
    if !fresh.is_empty() {
        tracing::warn!(
            "Parameters not found in checkpoint, newly initialized: {:?}",
            fresh
        );
    }
    tracing::debug!("Copied {} pretrained tensors", copied);
    Ok(())
}

fn local_files(dir: &Path) -> Result<BackboneFiles> {
    let config = dir.join(CONFIG_FILE);
    let weights = dir.join(WEIGHTS_FILE);
    for required in [&config, &weights] {
        if !required.exists() {
            return Err(Error::config(format!(
                "backbone file not found: {}",
                required.display()
            )));
        }
    }

    let tokenizer = if dir.join(TOKENIZER_FILE).exists() {
        TokenizerFile::Json(dir.join(TOKENIZER_FILE))
    } else if dir.join(VOCAB_FILE).exists() {
        TokenizerFile::Vocab(dir.join(VOCAB_FILE))
    } else {
        return Err(Error::config(format!(
            "no {} or {} in {}",
            TOKENIZER_FILE,
            VOCAB_FILE,
            dir.display()
        )));
    };

    let tokenizer_config = Some(dir.join(TOKENIZER_CONFIG_FILE)).filter(|p| p.exists());

    Ok(BackboneFiles {
        config,
        weights,
        tokenizer,
        tokenizer_config,
    })
}

fn download_files(repo_id: &str, revision: &str, cache_dir: Option<&Path>) -> Result<BackboneFiles> {
    let mut builder = ApiBuilder::new();
    if let Some(dir) = cache_dir {
        builder = builder.with_cache_dir(dir.to_path_buf());
    }
    let api = builder
        .build()
        .map_err(|e| Error::config(format!("Failed to initialize HF API: {}", e)))?;

    let repo = api.repo(Repo::with_revision(
        repo_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    tracing::info!("Fetching backbone {}@{} from the Hugging Face Hub", repo_id, revision);

    let fetch = |filename: &str| {
        repo.get(filename).map_err(|e| {
            Error::model(format!(
                "Failed to download {} from {}: {}",
                filename, repo_id, e
            ))
        })
    };

    let config = fetch(CONFIG_FILE)?;
    let weights = fetch(WEIGHTS_FILE)?;
    let tokenizer = match repo.get(TOKENIZER_FILE) {
        Ok(path) => TokenizerFile::Json(path),
        Err(e) => {
            tracing::debug!("No {} in {}: {}", TOKENIZER_FILE, repo_id, e);
            TokenizerFile::Vocab(fetch(VOCAB_FILE)?)
        }
    };
    let tokenizer_config = repo.get(TOKENIZER_CONFIG_FILE).ok();

    Ok(BackboneFiles {
        config,
        weights,
        tokenizer,
        tokenizer_config,
    })
}

fn load_tokenizer(files: &BackboneFiles) -> Result<Tokenizer> {
    match &files.tokenizer {
        TokenizerFile::Json(path) => Tokenizer::from_file(path)
            .map_err(|e| Error::tokenizer(format!("Failed to load tokenizer: {}", e))),
        TokenizerFile::Vocab(path) => {
            let content = std::fs::read_to_string(path)?;
            let vocab: Vec<String> = content.lines().map(|l| l.trim_end().to_string()).collect();
            if !vocab.iter().any(|t| t == PAD_TOKEN) {
                tracing::warn!("{} has no {} token", path.display(), PAD_TOKEN);
            }
            wordpiece_tokenizer(&vocab, lowercase_flag(files.tokenizer_config.as_deref()))
        }
    }
}

/// `do_lower_case` from `tokenizer_config.json`, defaulting to true
fn lowercase_flag(tokenizer_config: Option<&Path>) -> bool {
    tokenizer_config
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|content| serde_json::from_str::<Value>(&content).ok())
        .and_then(|value| value.get("do_lower_case").and_then(Value::as_bool))
        .unwrap_or(true)
}
