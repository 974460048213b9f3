//! Text to model-ready features
//!
//! Token ids and attention masks come from the tokenizer with truncation at
//! the backbone's maximum length. Each `encode_batch` call pads its output
//! to the longest sequence in that call; `collate` later re-pads a
//! mini-batch to its own longest sequence before building tensors.

use crate::vocab::{PAD_TOKEN, UNK_TOKEN};
use candle_core::{Device, Tensor};
use misinfo_core::{Error, FeatureRecord, LabeledExample, Result};
use serde::{Deserialize, Serialize};
use tokenizers::{Tokenizer, TruncationParams};

/// Examples tokenized per `encode_batch` call when encoding a whole dataset
pub const DEFAULT_ENCODE_CHUNK: usize = 1000;

/// Settings persisted with the tokenizer so inference encodes like training
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureEncoderConfig {
    /// Maximum sequence length, special tokens included
    pub max_length: usize,
    pub pad_token_id: u32,
    pub pad_token: String,
}

/// Tensors for one mini-batch
#[derive(Debug, Clone)]
pub struct Batch {
    /// Token ids, shape `(batch, seq)`, dtype u32
    pub input_ids: Tensor,

    /// 1 at padding positions, shape `(batch, 1, 1, seq)`, dtype u8
    pub padding_mask: Tensor,

    /// Targets, shape `(batch,)`, dtype u32
    pub labels: Tensor,

    pub size: usize,
}

#[derive(Clone)]
pub struct FeatureEncoder {
    tokenizer: Tokenizer,
    config: FeatureEncoderConfig,
}

impl std::fmt::Debug for FeatureEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureEncoder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FeatureEncoder {
    /// Wrap a tokenizer, resolving the pad token from its own settings
    pub fn new(tokenizer: Tokenizer, max_length: usize) -> Result<Self> {
        let (pad_token_id, pad_token) = resolve_pad(&tokenizer);
        Self::from_config(
            tokenizer,
            FeatureEncoderConfig {
                max_length,
                pad_token_id,
                pad_token,
            },
        )
    }

    /// Wrap a tokenizer with a stored configuration
    pub fn from_config(mut tokenizer: Tokenizer, config: FeatureEncoderConfig) -> Result<Self> {
        if config.max_length < 2 {
            return Err(Error::config(format!(
                "max_length must be at least 2, got {}",
                config.max_length
            )));
        }

        // Padding is applied here per batch, not by the tokenizer
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..Default::default()
            }))
            .map_err(|e| Error::tokenizer(format!("Failed to set truncation: {}", e)))?;

        Ok(Self { tokenizer, config })
    }

    pub fn config(&self) -> &FeatureEncoderConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn max_length(&self) -> usize {
        self.config.max_length
    }

    /// Encode examples 1:1, padding every record to the longest in the call
    pub fn encode_batch(&self, examples: &[LabeledExample]) -> Result<Vec<FeatureRecord>> {
        if examples.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = examples.iter().map(|e| e.text.as_str()).collect();
        let encodings = self
            .tokenizer
            .encode_batch(texts, true)
            .map_err(|e| Error::tokenizer(format!("Batch encoding failed: {}", e)))?;

        let sequences: Vec<Vec<u32>> = encodings
            .iter()
            .map(|encoding| self.non_empty(encoding.get_ids().to_vec()))
            .collect();
        let width = sequences.iter().map(Vec::len).max().unwrap_or(1);

        Ok(sequences
            .into_iter()
            .zip(examples)
            .map(|(ids, example)| self.pad_to(ids, width, example.label))
            .collect())
    }

    /// Encode a large example set in chunks of `chunk_size`
    pub fn encode_dataset(
        &self,
        examples: &[LabeledExample],
        chunk_size: usize,
    ) -> Result<Vec<FeatureRecord>> {
        let mut features = Vec::with_capacity(examples.len());
        for chunk in examples.chunks(chunk_size.max(1)) {
            features.extend(self.encode_batch(chunk)?);
        }
        tracing::debug!("Encoded {} examples", features.len());
        Ok(features)
    }

    /// Encode one text for inference; the label is a placeholder 0
    pub fn encode_text(&self, text: &str) -> Result<FeatureRecord> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::tokenizer(format!("Encoding failed: {}", e)))?;
        let ids = self.non_empty(encoding.get_ids().to_vec());
        let width = ids.len();
        Ok(self.pad_to(ids, width, 0))
    }

    /// Build tensors for a mini-batch, trimming padding to the longest
    /// active sequence among `records`
    pub fn collate(&self, records: &[&FeatureRecord], device: &Device) -> Result<Batch> {
        if records.is_empty() {
            return Err(Error::internal("cannot collate an empty mini-batch"));
        }

        let width = records
            .iter()
            .map(|r| r.active_len())
            .max()
            .unwrap_or(1)
            .max(1);
        let size = records.len();

        let mut ids = Vec::with_capacity(size * width);
        let mut mask = Vec::with_capacity(size * width);
        let mut labels = Vec::with_capacity(size);

        for record in records {
            for pos in 0..width {
                let active = record.attention_mask.get(pos).copied() == Some(1);
                if active {
                    ids.push(record.token_ids[pos]);
                    mask.push(0u8);
                } else {
                    ids.push(self.config.pad_token_id);
                    mask.push(1u8);
                }
            }
            labels.push(record.label);
        }

        let tensor_err = |e: candle_core::Error| Error::model(format!("collate: {}", e));
        Ok(Batch {
            input_ids: Tensor::from_vec(ids, (size, width), device).map_err(tensor_err)?,
            padding_mask: Tensor::from_vec(mask, (size, 1, 1, width), device)
                .map_err(tensor_err)?,
            labels: Tensor::from_vec(labels, size, device).map_err(tensor_err)?,
            size,
        })
    }

    /// Substitute a single unknown token for text that produced none
    fn non_empty(&self, ids: Vec<u32>) -> Vec<u32> {
        if ids.is_empty() {
            let unk = self
                .tokenizer
                .token_to_id(UNK_TOKEN)
                .unwrap_or(self.config.pad_token_id);
            vec![unk]
        } else {
            ids
        }
    }

    fn pad_to(&self, mut ids: Vec<u32>, width: usize, label: u32) -> FeatureRecord {
        let active = ids.len();
        let mut attention_mask = vec![1u8; active];
        ids.resize(width, self.config.pad_token_id);
        attention_mask.resize(width, 0);
        FeatureRecord {
            token_ids: ids,
            attention_mask,
            label,
        }
    }
}

fn resolve_pad(tokenizer: &Tokenizer) -> (u32, String) {
    if let Some(padding) = tokenizer.get_padding() {
        return (padding.pad_id, padding.pad_token.clone());
    }
    for token in [PAD_TOKEN, "<pad>"] {
        if let Some(id) = tokenizer.token_to_id(token) {
            return (id, token.to_string());
        }
    }
    (0, PAD_TOKEN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::{build_vocab, word_level_tokenizer};

    fn encoder(max_length: usize) -> FeatureEncoder {
        let vocab = build_vocab(
            &["the earth is flat", "water is wet", "birds are not real at all"],
            100,
        )
        .unwrap();
        FeatureEncoder::new(word_level_tokenizer(&vocab).unwrap(), max_length).unwrap()
    }

    fn example(text: &str, label: u32) -> LabeledExample {
        LabeledExample {
            text: text.into(),
            label,
        }
    }

    #[test]
    fn test_pad_token_resolved() {
        let enc = encoder(16);
        assert_eq!(enc.config().pad_token_id, 0);
        assert_eq!(enc.config().pad_token, "[PAD]");
    }

    #[test]
    fn test_batch_padding_to_longest() {
        let enc = encoder(16);
        let features = enc
            .encode_batch(&[
                example("water is wet", 0),
                example("birds are not real at all", 1),
            ])
            .unwrap();

        assert_eq!(features.len(), 2);
        assert_eq!(features[0].len(), 8);
        assert_eq!(features[1].len(), 8);
        assert_eq!(features[0].active_len(), 5);
        assert_eq!(features[0].attention_mask, vec![1, 1, 1, 1, 1, 0, 0, 0]);
        assert_eq!(&features[0].token_ids[5..], &[0, 0, 0]);
        assert_eq!(features[1].label, 1);
    }

    #[test]
    fn test_truncation_keeps_special_tokens() {
        let enc = encoder(4);
        let features = enc
            .encode_batch(&[example("birds are not real at all", 1)])
            .unwrap();

        assert_eq!(features[0].len(), 4);
        assert_eq!(features[0].token_ids[0], 2);
        assert_eq!(features[0].token_ids[3], 3);
    }

    #[test]
    fn test_empty_text_still_encodes() {
        let enc = encoder(16);
        let record = enc.encode_text("").unwrap();
        assert!(record.active_len() >= 1);
        assert_eq!(record.active_len(), record.len());
    }

    #[test]
    fn test_encode_dataset_preserves_order() {
        let enc = encoder(16);
        let examples: Vec<_> = (0..7).map(|i| example("the earth", i % 2)).collect();
        let features = enc.encode_dataset(&examples, 3).unwrap();
        let labels: Vec<u32> = features.iter().map(|f| f.label).collect();
        assert_eq!(labels, vec![0, 1, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_collate_trims_to_minibatch() {
        let enc = encoder(16);
        let features = enc
            .encode_batch(&[
                example("water is wet", 0),
                example("the earth", 1),
                example("birds are not real at all", 1),
            ])
            .unwrap();

        let batch = enc
            .collate(&[&features[0], &features[1]], &Device::Cpu)
            .unwrap();

        assert_eq!(batch.size, 2);
        assert_eq!(batch.input_ids.dims(), &[2, 5]);
        assert_eq!(batch.padding_mask.dims(), &[2, 1, 1, 5]);
        let mask: Vec<u8> = batch.padding_mask.flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(mask, vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        let labels: Vec<u32> = batch.labels.to_vec1().unwrap();
        assert_eq!(labels, vec![0, 1]);
    }

    #[test]
    fn test_collate_empty_is_error() {
        assert!(encoder(16).collate(&[], &Device::Cpu).is_err());
    }
}
