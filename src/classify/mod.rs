pub mod database;
pub mod embedding;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod shape;

pub use database::{SharedDatabase, TrainingDatabase};
pub use embedding::{Embedder, EmbeddingClassifier, EmbeddingInput};
pub use shape::ShapeClassifier;
