//! lucent CLI: list models and run explanation jobs end to end.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lucent_core::backend::Inspect;
use lucent_core::Settings;
use lucent_jobs::{ExplainParams, JobService, JobStatus};
use lucent_models::default_registry;

#[derive(Parser)]
#[command(name = "lucent")]
#[command(author, version)]
#[command(about = "Image-model explainability - feature maps and Grad-CAM from the command line")]
#[command(long_about = "lucent: submit an image to a built-in model and get back top-k \
predictions, per-layer feature maps, and Grad-CAM overlays as PNG files.

EXAMPLES:
  # List available models
  lucent models

  # Explain a prediction with defaults
  lucent explain --model resnet_mini --image cat.png

  # Pick the layers and output directory
  lucent explain --model vgg_mini --image cat.png --layers features.7,features.10 --out ./storage")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered models and their hookable layers
    Models,
    /// Run one explanation job and print the result as JSON
    Explain {
        /// Model id (see `lucent models`)
        #[arg(long, value_name = "ID")]
        model: String,

        /// Path to the input image (PNG or JPEG)
        #[arg(long, value_name = "FILE")]
        image: PathBuf,

        /// How many top classes to explain (1-5)
        #[arg(long, default_value = "3", value_name = "N")]
        top_k: usize,

        /// Comma-separated Grad-CAM layers; defaults to the model's choice
        #[arg(long, value_name = "LAYERS", value_delimiter = ',')]
        layers: Option<Vec<String>>,

        /// Skip Grad-CAM and only extract feature maps
        #[arg(long)]
        no_gradcam: bool,

        /// Storage directory for rendered assets
        #[arg(long, default_value = "./storage", value_name = "DIR")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Models => handle_models(),
        Commands::Explain {
            model,
            image,
            top_k,
            layers,
            no_gradcam,
            out,
        } => handle_explain(model, image, top_k, layers, no_gradcam, out),
    }
}

fn handle_models() -> Result<()> {
    let registry = default_registry::<Inspect>();
    for config in registry.list() {
        println!(
            "{:<14} {:<14} input {}x{}  layers: {}",
            config.id,
            config.display_name,
            config.input_size[0],
            config.input_size[1],
            config.layers_to_hook.join(", ")
        );
    }
    Ok(())
}

fn handle_explain(
    model: String,
    image: PathBuf,
    top_k: usize,
    layers: Option<Vec<String>>,
    no_gradcam: bool,
    out: PathBuf,
) -> Result<()> {
    let bytes = std::fs::read(&image)
        .with_context(|| format!("failed to read image {}", image.display()))?;

    let settings = Settings {
        storage_dir: out,
        ..Settings::from_env()
    };
    let registry = Arc::new(default_registry::<Inspect>());
    let service = JobService::new(&settings, registry, Default::default())
        .context("failed to start the job service")?;

    let params = ExplainParams {
        top_k,
        cam_layers: layers,
        include_gradcam: !no_gradcam,
        ..Default::default()
    };
    let job_id = service.submit(&model, bytes, params)?;
    tracing::info!(job = %job_id, "job submitted");

    let record = service
        .wait(&job_id, Duration::from_secs(600))
        .context("job vanished from the table")?;

    match record.status {
        JobStatus::Succeeded => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        JobStatus::Failed => {
            bail!(
                "job failed: {}",
                record.message.unwrap_or_else(|| "unknown error".to_string())
            )
        }
        _ => bail!("job did not finish within the timeout"),
    }
}
