use clap::{Parser, Subcommand};
use std::path::PathBuf;

use shapeclass::analysis::build_shape_pipeline;
use shapeclass::training::{self, load_image};
use shapeclass::{
    DatasetManifest, ObjectRecognizer, RecognizerConfig, SharedDatabase, TrainingDatabase,
};

#[derive(Parser)]
#[command(name = "shapeclass")]
#[command(about = "Recognize objects in top-down images by their shape")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a training database from the manifest's training images
    Train {
        /// Dataset manifest (`split,label,path` per line)
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Training database file to write
        #[arg(long, value_name = "FILE")]
        db: PathBuf,
    },

    /// Classify a single image
    Classify {
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        #[arg(long, value_name = "FILE")]
        db: PathBuf,

        /// Report "unknown" when the nearest match is farther than this
        #[arg(long)]
        threshold: Option<f64>,

        /// Save intermediate images to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,
    },

    /// Classify the manifest's evaluation images and print a confusion matrix
    Evaluate {
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        #[arg(long, value_name = "FILE")]
        db: PathBuf,

        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Evaluate with nearest-neighbour matching of network embeddings
    #[cfg(feature = "onnx")]
    EmbedEvaluate {
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Embedding network model file
        #[arg(long, value_name = "FILE")]
        model: PathBuf,

        /// Output node to read embeddings from
        #[arg(long)]
        layer: Option<String>,
    },
}

fn config_with_threshold(threshold: Option<f64>) -> RecognizerConfig {
    let config = RecognizerConfig::default();
    match threshold {
        Some(t) => config.with_reject_threshold(t),
        None => config,
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    setup_logging(args.verbose);

    match args.command {
        Command::Train { manifest, db } => {
            let manifest = DatasetManifest::load(&manifest)?;
            let recognizer = ObjectRecognizer::default();
            let database = training::train(&recognizer, &manifest.train);
            database.save(&db)?;
            println!("Saved {} training entries to {}", database.len(), db.display());
        }

        Command::Classify { image_path, db, threshold, debug_out } => {
            log::info!("Loading image: {:?}", image_path);
            let img = load_image(&image_path)?;
            log::info!("Image loaded: {}x{}", img.width(), img.height());

            let database = SharedDatabase::new(TrainingDatabase::load(&db));
            let mut pipeline = build_shape_pipeline(config_with_threshold(threshold), database);
            if let Some(debug_dir) = debug_out {
                pipeline = pipeline.with_debug(debug_dir)?;
            }

            let results = pipeline.run(img)?;
            match results.first() {
                Some(item) => {
                    let label = item.label.as_deref().unwrap_or(shapeclass::UNKNOWN_LABEL);
                    println!("{}", label);
                    if let Some(features) = &item.features {
                        log::info!("Features: {}", features);
                    }
                }
                None => println!("No object found"),
            }
        }

        Command::Evaluate { manifest, db, threshold } => {
            let manifest = DatasetManifest::load(&manifest)?;
            let database = TrainingDatabase::load(&db);
            let recognizer = ObjectRecognizer::new(config_with_threshold(threshold));
            let evaluation =
                training::evaluate(&recognizer, &manifest.eval, &database, &manifest.labels);
            println!("{}", evaluation.matrix);
        }

        #[cfg(feature = "onnx")]
        Command::EmbedEvaluate { manifest, model, layer } => {
            use shapeclass::classify::onnx::RtenEmbedder;

            let manifest = DatasetManifest::load(&manifest)?;
            let config = RecognizerConfig::default();
            let layer = layer.or_else(|| config.embedding_layer.clone());
            let embedder = RtenEmbedder::load(&model, layer.as_deref())?;
            let recognizer = ObjectRecognizer::new(config);

            let references = training::build_reference_set(&recognizer, &manifest.train, &embedder);
            let evaluation = training::evaluate_embeddings(
                &recognizer,
                &manifest.eval,
                &embedder,
                &references,
                &manifest.labels,
            );
            println!("{}", evaluation.matrix);
        }
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    simple_log::quick!();
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Warn };
    log::set_max_level(level);
}
