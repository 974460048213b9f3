//! Data model shared by the training pipeline and the inference service

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current version of the stored label convention
pub const LABEL_CONVENTION_VERSION: u32 = 1;

/// Raw categorical label exactly as found in the corpus
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RawLabel {
    True,
    False,
    Uncertain,
    Other(String),
}

impl RawLabel {
    /// Parse a raw label. Matching is exact and case-sensitive.
    pub fn parse(value: &str) -> Self {
        match value {
            "True" => Self::True,
            "False" => Self::False,
            "Uncertain" => Self::Uncertain,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::True => "True",
            Self::False => "False",
            Self::Uncertain => "Uncertain",
            Self::Other(value) => value,
        }
    }
}

impl From<String> for RawLabel {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<RawLabel> for String {
    fn from(label: RawLabel) -> Self {
        label.as_str().to_string()
    }
}

impl fmt::Display for RawLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record of the labeled corpus, immutable once loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub text: String,
    pub raw_label: RawLabel,
}

impl RawRecord {
    pub fn new(text: impl Into<String>, raw_label: RawLabel) -> Self {
        Self {
            text: text.into(),
            raw_label,
        }
    }
}

/// A record with a trainable binary target.
///
/// `label` is always 0 or 1; 1 means misinformation-flagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledExample {
    pub text: String,
    pub label: u32,
}

/// Disjoint train/eval partition of the labeled examples
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetSplit {
    pub train: Vec<LabeledExample>,
    pub eval: Vec<LabeledExample>,
}

impl DatasetSplit {
    /// Total number of examples across both subsets
    pub fn len(&self) -> usize {
        self.train.len() + self.eval.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Model-ready features for one example
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub token_ids: Vec<u32>,
    pub attention_mask: Vec<u8>,
    pub label: u32,
}

impl FeatureRecord {
    /// Number of non-padding positions
    pub fn active_len(&self) -> usize {
        self.attention_mask.iter().filter(|&&m| m == 1).count()
    }

    /// Padded sequence length
    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }
}

/// Human-readable verdict derived from the predicted class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    LikelyMisinformation,
    SeemsGenuine,
}

impl Verdict {
    /// Fixed literal shown on the first output line
    pub fn message(&self) -> &'static str {
        match self {
            Self::LikelyMisinformation => "⚠️ Likely Misinformation",
            Self::SeemsGenuine => "✅ Seems Genuine",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of a single inference call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Class with the highest probability (0 or 1)
    pub predicted_class: u32,

    /// Probability of the predicted class (0.0-1.0)
    pub confidence: f32,

    /// Verdict looked up through the artifact's label convention
    pub verdict: Verdict,
}

impl PredictionResult {
    /// Two-line output: verdict, then `Confidence: <score>` to two decimals
    pub fn render(&self) -> String {
        format!("{}\nConfidence: {:.2}", self.verdict, self.confidence)
    }
}

/// Mapping between class indices and meanings.
///
/// Stored with every artifact so the index the encoder assigned to flagged
/// records during training is the same index the inference service reports
/// as misinformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelConvention {
    pub version: u32,

    /// Class index assigned to `"True"` (misinformation-flagged) records
    pub flagged_class: u32,

    /// Label name per class index
    pub id2label: Vec<String>,
}

impl Default for LabelConvention {
    fn default() -> Self {
        Self {
            version: LABEL_CONVENTION_VERSION,
            flagged_class: 1,
            id2label: vec!["genuine".to_string(), "misinformation".to_string()],
        }
    }
}

impl LabelConvention {
    /// Number of classes (always 2)
    pub fn num_labels(&self) -> usize {
        self.id2label.len()
    }

    /// Class index assigned to `"False"` records
    pub fn genuine_class(&self) -> u32 {
        1 - self.flagged_class
    }

    /// Target for a raw label, or `None` when the label carries no signal
    pub fn class_for(&self, raw: &RawLabel) -> Option<u32> {
        match raw {
            RawLabel::True => Some(self.flagged_class),
            RawLabel::False => Some(self.genuine_class()),
            RawLabel::Uncertain | RawLabel::Other(_) => None,
        }
    }

    pub fn verdict(&self, class: u32) -> Verdict {
        if class == self.flagged_class {
            Verdict::LikelyMisinformation
        } else {
            Verdict::SeemsGenuine
        }
    }

    /// Reject conventions this build cannot interpret
    pub fn validate(&self) -> Result<()> {
        if self.version != LABEL_CONVENTION_VERSION {
            return Err(Error::corrupt(format!(
                "unsupported label convention version {} (expected {})",
                self.version, LABEL_CONVENTION_VERSION
            )));
        }
        if self.id2label.len() != 2 {
            return Err(Error::corrupt(format!(
                "label convention must name exactly 2 classes, found {}",
                self.id2label.len()
            )));
        }
        if self.flagged_class > 1 {
            return Err(Error::corrupt(format!(
                "flagged class index {} out of range",
                self.flagged_class
            )));
        }
        Ok(())
    }
}
