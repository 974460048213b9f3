use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "misinfo-detector")]
#[command(
    author,
    version,
    about = "Train and serve a DistilBERT misinformation classifier"
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune the classifier and save the artifact
    Train(TrainArgs),

    /// Classify a single text with a saved artifact
    Predict {
        /// Text to classify
        text: String,

        #[command(flatten)]
        artifact: ArtifactArgs,
    },

    /// Serve a saved artifact behind the local web page
    Serve {
        #[command(flatten)]
        artifact: ArtifactArgs,

        #[command(flatten)]
        listen: ListenArgs,
    },

    /// Summarize the corpus: misinformation rate and per-column counts
    Stats {
        /// Pipeline config file (YAML); supplies the dataset path and field names
        #[arg(short, long, env = "MISINFO_CONFIG")]
        config: Option<PathBuf>,

        /// Dataset path, overrides the config file
        #[arg(long)]
        data: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Train, then serve the fresh artifact
    Launch {
        #[command(flatten)]
        train: TrainArgs,

        #[command(flatten)]
        listen: ListenArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Pipeline config file (YAML); defaults apply when omitted
    #[arg(short, long, env = "MISINFO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Dataset path, overrides the config file
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Directory holding saved artifacts, overrides the config file
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,

    /// Artifact name, overrides the config file
    #[arg(long)]
    pub name: Option<String>,

    /// Number of training epochs, overrides the config file
    #[arg(long)]
    pub epochs: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct ArtifactArgs {
    /// Directory holding saved artifacts
    #[arg(long, default_value = ".")]
    pub artifact_dir: PathBuf,

    /// Artifact name
    #[arg(short, long, default_value = "misinfo-model")]
    pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct ListenArgs {
    /// Listen port
    #[arg(short, long, default_value = "7860")]
    pub port: u16,

    /// Listen address
    #[arg(short, long, default_value = "127.0.0.1")]
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_train_overrides() {
        let cli = Cli::parse_from([
            "misinfo-detector",
            "train",
            "--data",
            "posts.json",
            "--epochs",
            "3",
            "--name",
            "demo",
        ]);
        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.data, Some(PathBuf::from("posts.json")));
                assert_eq!(args.epochs, Some(3));
                assert_eq!(args.name.as_deref(), Some("demo"));
                assert!(args.artifact_dir.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_stats_args() {
        let cli = Cli::parse_from(["misinfo-detector", "stats", "--data", "posts.json", "--json"]);
        match cli.command {
            Commands::Stats { config, data, json } => {
                assert!(config.is_none());
                assert_eq!(data, Some(PathBuf::from("posts.json")));
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_predict_defaults() {
        let cli = Cli::parse_from(["misinfo-detector", "-v", "predict", "some text"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Predict { text, artifact } => {
                assert_eq!(text, "some text");
                assert_eq!(artifact.name, "misinfo-model");
                assert_eq!(artifact.artifact_dir, PathBuf::from("."));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
