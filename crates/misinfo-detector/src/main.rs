use anyhow::Context;
use clap::Parser;
use misinfo_classifier::{ArtifactStore, ClassifierArtifact, InferenceService, Pipeline};
use misinfo_detector::cli::{ArtifactArgs, Cli, Commands, ListenArgs, TrainArgs};
use misinfo_detector::{corpus_stats, pipeline_config};
use misinfo_detector::server::run_server;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Train(args) => {
            train(args).await?;
        }

        Commands::Predict { text, artifact } => {
            let service = load_service(artifact).await?;
            let result = tokio::task::spawn_blocking(move || service.predict(&text))
                .await
                .context("prediction task panicked")??;
            println!("{}", result.render());
        }

        Commands::Serve { artifact, listen } => {
            let service = load_service(artifact).await?;
            serve(service, listen).await?;
        }

        Commands::Stats { config, data, json } => {
            let stats =
                tokio::task::spawn_blocking(move || corpus_stats(config.as_deref(), data))
                    .await
                    .context("stats task panicked")??;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!();
                print!("{}", stats);
                println!();
            }
        }

        Commands::Launch { train: args, listen } => {
            let artifact = train(args).await?;
            let service = InferenceService::new(Arc::new(artifact))?;
            serve(service, listen).await?;
        }
    }

    Ok(())
}

/// Run the training pipeline off the async runtime and print the final metrics
async fn train(args: TrainArgs) -> anyhow::Result<ClassifierArtifact> {
    let config = pipeline_config(&args)?;
    let pipeline = Pipeline::new(config)?;

    let (artifact, report) = tokio::task::spawn_blocking(move || pipeline.run())
        .await
        .context("training task panicked")??;

    println!();
    println!(
        "  Labels:   {} flagged, {} genuine, {} dropped",
        report.labels.flagged, report.labels.genuine, report.labels.dropped
    );
    println!("  Split:    {} train / {} eval", report.train_size, report.eval_size);
    println!("  Artifact: {}", report.artifact_path.display());
    println!();
    for (key, value) in report.metrics.to_map() {
        println!("  {:<16} {:.4}", key, value);
    }
    println!();

    Ok(artifact)
}

async fn load_service(args: ArtifactArgs) -> anyhow::Result<InferenceService> {
    let store = ArtifactStore::new(&args.artifact_dir);
    let name = args.name;
    let service = tokio::task::spawn_blocking(move || InferenceService::from_store(&store, &name))
        .await
        .context("artifact load task panicked")??;
    Ok(service)
}

async fn serve(service: InferenceService, listen: ListenArgs) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", listen.address, listen.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", listen.address, listen.port))?;

    println!();
    println!("  Misinformation Detector");
    println!("  Open http://{} in your browser", addr);
    println!();

    run_server(Arc::new(service), addr).await
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        "misinfo_detector=debug,misinfo_classifier=debug,tower_http=debug"
    } else {
        "misinfo_detector=info,misinfo_classifier=info,tower_http=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
