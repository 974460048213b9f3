//! Pretrained backbone tests
//!
//! These download `distilbert-base-uncased` from the Hugging Face Hub, so
//! they only run with `cargo test --features hub-tests`.

#![cfg(feature = "hub-tests")]

use misinfo_classifier::prelude::*;
use misinfo_classifier::{BackboneConfig, BaseModel};

#[test]
fn test_load_pretrained_distilbert() {
    let backbone = BackboneConfig::default();
    let base = BaseModel::load::<&str>(&backbone, &[]).unwrap();

    assert_eq!(base.encoder.max_length(), 512);
    assert_eq!(base.convention, LabelConvention::default());

    let record = base.encoder.encode_text("Hello, World!").unwrap();
    // [CLS] hello , world ! [SEP]
    assert_eq!(record.active_len(), 6);
    assert_eq!(record.token_ids[0], 101);
    assert_eq!(record.token_ids[5], 102);
}
