//! Misinformation Detector shell
//!
//! Command-line entry points and the local web page that wrap the
//! training pipeline and inference service from `misinfo-classifier`.

pub mod cli;
pub mod server;

use cli::TrainArgs;
use misinfo_classifier::{CorpusStats, PipelineConfig, RecordStore};
use std::path::{Path, PathBuf};
use misinfo_core::Result;

pub use cli::*;
pub use server::*;

/// Resolve the pipeline config: file (or defaults), then CLI overrides
pub fn pipeline_config(args: &TrainArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(data) = &args.data {
        config.dataset.path = data.clone();
    }
    if let Some(dir) = &args.artifact_dir {
        config.artifact.root = dir.clone();
    }
    if let Some(name) = &args.name {
        config.artifact.name = name.clone();
    }
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }

    config.validate()?;
    Ok(config)
}

/// Summarize the corpus named by the config file (or defaults) and `data`
pub fn corpus_stats(config: Option<&Path>, data: Option<PathBuf>) -> Result<CorpusStats> {
    let mut dataset = match config {
        Some(path) => PipelineConfig::from_file(path)?.dataset,
        None => PipelineConfig::default().dataset,
    };
    if let Some(data) = data {
        dataset.path = data;
    }

    CorpusStats::from_path(&RecordStore::from_config(&dataset), &dataset.path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use misinfo_core::Error;

    fn args() -> TrainArgs {
        TrainArgs {
            config: None,
            data: None,
            artifact_dir: None,
            name: None,
            epochs: None,
        }
    }

    #[test]
    fn test_defaults_without_file() {
        let config = pipeline_config(&args()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");
        std::fs::write(&path, "training:\n  epochs: 5\nartifact:\n  name: from-file\n").unwrap();

        let config = pipeline_config(&TrainArgs {
            config: Some(path),
            epochs: Some(1),
            data: Some(PathBuf::from("other.json")),
            ..args()
        })
        .unwrap();

        assert_eq!(config.training.epochs, 1);
        assert_eq!(config.artifact.name, "from-file");
        assert_eq!(config.dataset.path, PathBuf::from("other.json"));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let result = pipeline_config(&TrainArgs {
            epochs: Some(0),
            ..args()
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_corpus_stats_uses_config_fields() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("posts.json");
        std::fs::write(
            &data,
            r#"[{"body": "a", "flag": "True", "Platform": "Reddit"},
                {"body": "b", "flag": "False", "Platform": "Reddit"}]"#,
        )
        .unwrap();
        let config = dir.path().join("pipeline.yaml");
        std::fs::write(&config, "dataset:\n  text_field: body\n  label_field: flag\n").unwrap();

        let stats = corpus_stats(Some(&config), Some(data)).unwrap();
        assert_eq!(stats.total_posts, 2);
        assert_eq!(stats.misinformation_posts, 1);
        assert_eq!(stats.by_platform["Reddit"], 2);
    }

    #[test]
    fn test_corpus_stats_missing_data() {
        let result = corpus_stats(None, Some(PathBuf::from("/nonexistent/posts.json")));
        assert!(matches!(result, Err(Error::DataSource(_))));
    }
}
