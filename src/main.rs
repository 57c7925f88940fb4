mod app;
mod commands;
mod compositor;
mod output;
mod segmentation;
mod session;
mod source;
mod worker;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use segmentation::{ModelCatalog, OnnxModelFactory, DEFAULT_MODEL_ID};
use session::SessionController;
use source::Gallery;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use worker::InferenceGateway;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding `<model>.encoder.onnx` / `<model>.decoder.onnx` files
    #[arg(long, default_value = "models")]
    model_dir: PathBuf,

    /// Segmentation model id (sam_mobile_tiny or sam_base)
    #[arg(short, long, default_value = DEFAULT_MODEL_ID)]
    model: String,

    /// Directory the cutout is downloaded to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Directory of example images offered by the `example` command
    #[arg(long)]
    examples_dir: Option<PathBuf>,

    /// Image file or URI to load at startup
    #[arg(short, long)]
    image: Option<String>,

    /// Read commands from this file instead of stdin
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Canvas widget width in pixels (defaults to the image width)
    #[arg(long, value_parser = commands::parse_width)]
    viewport_width: Option<f32>,

    /// Intra-op threads for ONNX Runtime
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Return after each command instead of waiting for the model
    #[arg(long)]
    no_wait: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    tracing::info!("cutout starting");
    tracing::info!("Model: {} (from {})", args.model, args.model_dir.display());
    tracing::info!("Output directory: {}", args.output_dir.display());

    let catalog = ModelCatalog::new(&args.model_dir);
    let gateway = InferenceGateway::spawn(Box::new(OnnxModelFactory::new(args.threads)))
        .context("Failed to start inference worker")?;

    let mut controller = SessionController::new(gateway, catalog);
    if let Some(width) = args.viewport_width {
        controller = controller.with_viewport_width(width);
    }
    controller
        .select_model(&args.model)
        .context("Failed to select model")?;

    let gallery = match &args.examples_dir {
        Some(dir) => Gallery::scan(dir).context("Failed to read examples directory")?,
        None => Gallery::default(),
    };

    let mut app = App::new(controller, gallery, args.output_dir.clone());
    if args.no_wait {
        app = app.without_waiting();
    }

    if let Some(image) = &args.image {
        // Same path as dropping the image onto the canvas
        app.run(format!("drop {image}\n").as_bytes())
            .context("Failed to load startup image")?;
    }

    match &args.script {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open script {}", path.display()))?;
            tracing::info!("Running commands from {}", path.display());
            app.run(BufReader::new(file))?;
        }
        None => {
            tracing::info!("Reading commands from stdin (`help` lists them)");
            app.run(io::stdin().lock())?;
        }
    }

    tracing::info!("cutout stopped");
    Ok(())
}
