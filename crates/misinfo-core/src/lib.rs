//! Misinformation Detector Core
//!
//! Types and error handling shared by the training pipeline, the inference
//! service and the interactive shell.
//!
//! This crate provides:
//! - The record types flowing through the pipeline (raw, labeled, featurized)
//! - The label convention tying class indices to verdicts
//! - The error taxonomy every stage reports through

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    DatasetSplit, FeatureRecord, LabelConvention, LabeledExample, PredictionResult, RawLabel,
    RawRecord, Verdict,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{
        DatasetSplit, FeatureRecord, LabelConvention, LabeledExample, PredictionResult, RawLabel,
        RawRecord, Verdict,
    };
}
