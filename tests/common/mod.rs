mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from shapeclass for tests
pub use shapeclass::{
    BinaryMask, BoundingBox, Embedding, ObjectRecognizer, Orientation, RecognizerConfig, Region,
    ShapeFeatureVector, TrainingDatabase, TrainingEntry, UNKNOWN_LABEL,
};
