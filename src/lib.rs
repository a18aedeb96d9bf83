pub mod analysis;
pub mod classify;
pub mod config;
pub mod evaluation;
pub mod models;
pub mod pipeline;
pub mod training;

pub use models::{
    BoundingBox, Embedding, Orientation, Region, ShapeFeatureVector, TrainingEntry, UNKNOWN_LABEL,
};
pub use analysis::{Analysis, ObjectRecognizer};
pub use analysis::threshold::BinaryMask;
pub use classify::{
    Embedder, EmbeddingClassifier, ShapeClassifier, SharedDatabase, TrainingDatabase,
};
pub use config::{DatasetManifest, RecognizerConfig};
pub use pipeline::{MetadataValue, Pipeline, PipelineContext, PipelineData, PipelineStep};
