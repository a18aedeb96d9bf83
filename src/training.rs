use std::path::Path;

use image::{DynamicImage, ImageReader};

use crate::analysis::ObjectRecognizer;
use crate::classify::embedding::{self, Embedder, EmbeddingClassifier};
use crate::classify::{TrainingDatabase, shape};
use crate::config::DatasetItem;
use crate::evaluation::ConfusionMatrix;
use crate::models::{Embedding, TrainingEntry, UNKNOWN_LABEL};

/// Load and decode an image file
pub fn load_image<P: AsRef<Path>>(path: P) -> anyhow::Result<DynamicImage> {
    let path = path.as_ref();
    let img = ImageReader::open(path)?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image {}: {}", path.display(), e))?;
    Ok(img)
}

/// Images of a dataset split, skipping (and logging) the ones that fail to load
fn loaded_items(items: &[DatasetItem]) -> impl Iterator<Item = (&DatasetItem, DynamicImage)> {
    items.iter().filter_map(|item| match load_image(&item.path) {
        Ok(img) => Some((item, img)),
        Err(e) => {
            log::warn!("Skipping {}: {}", item.path.display(), e);
            None
        }
    })
}

/// Outcome of classifying one evaluation item
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub item: DatasetItem,
    pub predicted: String,
}

impl Prediction {
    pub fn is_correct(&self) -> bool {
        self.item.label == self.predicted
    }
}

/// Predictions of an evaluation run with their confusion matrix
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub predictions: Vec<Prediction>,
    pub matrix: ConfusionMatrix,
}

impl Evaluation {
    fn new(labels: &[String]) -> Self {
        Self {
            predictions: Vec::new(),
            matrix: ConfusionMatrix::new(labels),
        }
    }

    fn record(&mut self, item: &DatasetItem, predicted: String) {
        log::info!("{}: {} -> {}", item.path.display(), item.label, predicted);
        self.matrix.record(&item.label, &predicted);
        self.predictions.push(Prediction {
            item: item.clone(),
            predicted,
        });
    }
}

/// Build a fresh training database from the labelled images.
///
/// Images that cannot be loaded or contain no usable region are skipped.
pub fn train(recognizer: &ObjectRecognizer, items: &[DatasetItem]) -> TrainingDatabase {
    let mut db = TrainingDatabase::new();

    for (item, img) in loaded_items(items) {
        match recognizer.features(&img) {
            Some((features, _)) => {
                log::debug!("Trained {:?} from {}: {}", item.label, item.path.display(), features);
                db.push(TrainingEntry::new(item.label.clone(), features));
            }
            None => log::warn!("No object found in {}, skipping", item.path.display()),
        }
    }

    log::info!("Built training database with {} entries", db.len());
    db
}

/// Classify every item against `db`; images without a region count as unknown
pub fn evaluate(
    recognizer: &ObjectRecognizer,
    items: &[DatasetItem],
    db: &TrainingDatabase,
    labels: &[String],
) -> Evaluation {
    let mut evaluation = Evaluation::new(labels);

    for (item, img) in loaded_items(items) {
        let predicted = match recognizer.features(&img) {
            Some((features, _)) => {
                shape::classify(&features, db, recognizer.config.reject_threshold)
            }
            None => UNKNOWN_LABEL.to_string(),
        };
        evaluation.record(item, predicted);
    }

    evaluation
}

/// Embed the largest region of an image; the full frame is used when no
/// region is found
pub fn embed_image(
    recognizer: &ObjectRecognizer,
    img: &DynamicImage,
    embedder: &dyn Embedder,
) -> anyhow::Result<Embedding> {
    let crop = match recognizer.features(img) {
        Some((_, region)) => embedding::align_crop(img, &region),
        None => img.clone(),
    };
    let input = embedding::prepare_input(&crop, recognizer.config.embedding_input_size);
    embedder.embed(&input)
}

/// Reference embeddings for every loadable training item
pub fn build_reference_set(
    recognizer: &ObjectRecognizer,
    items: &[DatasetItem],
    embedder: &dyn Embedder,
) -> EmbeddingClassifier {
    let mut classifier = EmbeddingClassifier::new();

    for (item, img) in loaded_items(items) {
        match embed_image(recognizer, &img, embedder) {
            Ok(vector) => classifier.add_reference(item.label.clone(), vector),
            Err(e) => log::warn!("Embedding failed for {}: {}", item.path.display(), e),
        }
    }

    log::info!("Built {} reference embeddings", classifier.len());
    classifier
}

/// Classify every item by nearest reference embedding
pub fn evaluate_embeddings(
    recognizer: &ObjectRecognizer,
    items: &[DatasetItem],
    embedder: &dyn Embedder,
    classifier: &EmbeddingClassifier,
    labels: &[String],
) -> Evaluation {
    let mut evaluation = Evaluation::new(labels);

    for (item, img) in loaded_items(items) {
        match embed_image(recognizer, &img, embedder) {
            Ok(vector) => evaluation.record(item, classifier.classify(&vector)),
            Err(e) => log::warn!("Embedding failed for {}: {}", item.path.display(), e),
        }
    }

    evaluation
}
