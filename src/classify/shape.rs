use super::database::TrainingDatabase;
use crate::models::{ShapeFeatureVector, TrainingEntry, UNKNOWN_LABEL};

/// Below this a dimension is treated as constant across the training set
const MIN_SCALE: f64 = 1e-6;

type Scales = [f64; ShapeFeatureVector::DIMENSIONS];

/// Population standard deviation of every feature dimension, with constant
/// dimensions scaled by 1.0 instead
pub fn feature_scales(entries: &[TrainingEntry]) -> Scales {
    let mut scales = [1.0; ShapeFeatureVector::DIMENSIONS];
    if entries.is_empty() {
        return scales;
    }

    let n = entries.len() as f64;
    for (dim, scale) in scales.iter_mut().enumerate() {
        let mean = entries.iter().map(|e| e.features.to_array()[dim]).sum::<f64>() / n;
        let variance = entries
            .iter()
            .map(|e| {
                let d = e.features.to_array()[dim] - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        let stdev = variance.sqrt();
        *scale = if stdev < MIN_SCALE { 1.0 } else { stdev };
    }
    scales
}

/// Euclidean distance after dividing each dimension by its scale
pub fn scaled_distance(a: &ShapeFeatureVector, b: &ShapeFeatureVector, scales: &Scales) -> f64 {
    a.to_array()
        .iter()
        .zip(b.to_array())
        .zip(scales)
        .map(|((x, y), s)| {
            let d = (x - y) / s;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Closest training entry and its scaled distance
pub fn nearest<'a>(
    features: &ShapeFeatureVector,
    db: &'a TrainingDatabase,
) -> Option<(&'a TrainingEntry, f64)> {
    let scales = feature_scales(db.entries());
    db.iter()
        .map(|entry| (entry, scaled_distance(features, &entry.features, &scales)))
        .fold(None, |best, (entry, dist)| match best {
            Some((_, best_dist)) if best_dist <= dist => best,
            _ => Some((entry, dist)),
        })
}

/// Label of the nearest training entry, or `"unknown"` when the database is
/// empty or the nearest entry is farther than `reject_threshold`
pub fn classify(
    features: &ShapeFeatureVector,
    db: &TrainingDatabase,
    reject_threshold: f64,
) -> String {
    match nearest(features, db) {
        Some((entry, dist)) if dist <= reject_threshold => {
            log::debug!("Nearest match {:?} at distance {:.3}", entry.label, dist);
            entry.label.clone()
        }
        Some((entry, dist)) => {
            log::debug!(
                "Nearest match {:?} at distance {:.3} exceeds threshold {:.3}",
                entry.label,
                dist,
                reject_threshold
            );
            UNKNOWN_LABEL.to_string()
        }
        None => UNKNOWN_LABEL.to_string(),
    }
}

/// Scaled nearest-neighbour classifier over a training database
#[derive(Debug, Clone)]
pub struct ShapeClassifier {
    pub db: TrainingDatabase,
    pub reject_threshold: f64,
}

impl ShapeClassifier {
    /// Classifier that never rejects
    pub fn new(db: TrainingDatabase) -> Self {
        Self {
            db,
            reject_threshold: f64::INFINITY,
        }
    }

    pub fn with_reject_threshold(mut self, threshold: f64) -> Self {
        self.reject_threshold = threshold;
        self
    }

    pub fn classify(&self, features: &ShapeFeatureVector) -> String {
        classify(features, &self.db, self.reject_threshold)
    }
}
