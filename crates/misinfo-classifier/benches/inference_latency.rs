//! Latency benchmarks for feature encoding and single-text inference
//!
//! Uses a small from-scratch backbone so the numbers track pipeline
//! overhead rather than the cost of a full-size DistilBERT.
//!
//! Run with: cargo bench -p misinfo-classifier

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use tokio::runtime::Runtime;

use misinfo_classifier::prelude::*;
use misinfo_classifier::{
    BackboneConfig, BackboneSource, BaseModel, ScratchConfig, TrainingConfig,
    TrainingOrchestrator,
};

const CORPUS: [(&str, u32); 8] = [
    ("5g towers spread the virus secretly", 1),
    ("the city council approved the new budget", 0),
    ("miracle cure hidden by big pharma", 1),
    ("local library extends weekend opening hours", 0),
    ("vaccines contain tracking microchips", 1),
    ("bus routes change starting next monday", 0),
    ("chemtrails control the weather", 1),
    ("museum opens a new dinosaur exhibit", 0),
];

const INPUTS: [(&str, &str); 3] = [
    ("empty", ""),
    ("short", "vaccines contain microchips"),
    (
        "long",
        "Breaking: officials confirm the city council approved the new budget \
         while rumors claim 5g towers spread the virus and chemtrails control \
         the weather across the whole region this weekend",
    ),
];

fn trained_service() -> InferenceService {
    let texts: Vec<&str> = CORPUS.iter().map(|(t, _)| *t).collect();
    let backbone = BackboneConfig {
        source: BackboneSource::Scratch(ScratchConfig {
            dim: 64,
            n_layers: 2,
            n_heads: 4,
            hidden_dim: 128,
            max_position_embeddings: 128,
            max_vocab: 1000,
        }),
        ..Default::default()
    };
    let base = BaseModel::load(&backbone, &texts).expect("backbone");

    let examples: Vec<LabeledExample> = CORPUS
        .iter()
        .map(|(text, label)| LabeledExample {
            text: text.to_string(),
            label: *label,
        })
        .collect();
    let features = base.encoder.encode_batch(&examples).expect("features");

    let artifact = TrainingOrchestrator::new(TrainingConfig {
        epochs: 1,
        checkpoint_dir: None,
        ..Default::default()
    })
    .expect("config")
    .train(base, &features[..6], &features[6..])
    .expect("training");

    InferenceService::new(Arc::new(artifact)).expect("service")
}

fn benchmark_encoding(c: &mut Criterion) {
    let service = trained_service();
    let encoder = service.artifact().encoder();

    let mut group = c.benchmark_group("Feature_Encoding");
    group.sample_size(100);

    for (name, text) in INPUTS {
        group.bench_with_input(BenchmarkId::new("encode_text", name), &text, |b, text| {
            b.iter(|| encoder.encode_text(black_box(text)).unwrap());
        });
    }

    group.finish();
}

fn benchmark_predict(c: &mut Criterion) {
    let service = trained_service();

    let mut group = c.benchmark_group("Single_Text_Inference");
    group.sample_size(50);

    for (name, text) in INPUTS {
        group.bench_with_input(BenchmarkId::new("predict", name), &text, |b, text| {
            b.iter(|| service.predict(black_box(text)).unwrap());
        });
    }

    group.finish();
}

fn benchmark_classifier_trait(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let classifier: Arc<dyn Classifier> = Arc::new(trained_service());

    c.bench_function("classify_async", |b| {
        b.iter(|| {
            rt.block_on(async {
                classifier
                    .classify(black_box("chemtrails control the weather"))
                    .await
                    .unwrap()
            })
        });
    });
}

criterion_group!(
    benches,
    benchmark_encoding,
    benchmark_predict,
    benchmark_classifier_trait
);
criterion_main!(benches);
