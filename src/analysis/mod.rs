pub mod features;
pub mod morphology;
pub mod segmentation;
pub mod steps;
pub mod threshold;

use image::DynamicImage;

use crate::config::RecognizerConfig;
use crate::models::{Region, ShapeFeatureVector};
use features::FeatureExtraction;
use morphology::MorphologyFilter;
use segmentation::{RegionSegmenter, Segmentation};
use threshold::{Binarizer, BinaryMask};

/// Every intermediate product of analysing one image
#[derive(Debug, Clone)]
pub struct Analysis {
    pub threshold: f64,
    pub binary: BinaryMask,
    pub cleaned: BinaryMask,
    pub segmentation: Segmentation,
    /// Features of the largest region, if any region survived filtering
    pub extraction: Option<FeatureExtraction>,
}

impl Analysis {
    pub fn features(&self) -> Option<ShapeFeatureVector> {
        self.extraction.as_ref().map(|e| e.features)
    }

    /// Largest region with its orientation filled in
    pub fn region(&self) -> Option<&Region> {
        self.extraction.as_ref().map(|e| &e.region)
    }
}

/// Binarize → clean → segment → extract for single-object frames
#[derive(Debug, Clone)]
pub struct ObjectRecognizer {
    pub config: RecognizerConfig,
    binarizer: Binarizer,
    morphology: MorphologyFilter,
    segmenter: RegionSegmenter,
}

impl ObjectRecognizer {
    pub fn new(config: RecognizerConfig) -> Self {
        Self {
            binarizer: Binarizer::new(config.clone()),
            morphology: MorphologyFilter::from_config(&config),
            segmenter: RegionSegmenter::from_config(&config),
            config,
        }
    }

    /// Run the full analysis on an image
    pub fn analyze(&self, img: &DynamicImage) -> Analysis {
        let (binary, threshold) = self.binarizer.apply_with_threshold(img);
        let cleaned = self.morphology.apply(&binary);
        let segmentation = self.segmenter.segment(&cleaned);

        let extraction = segmentation
            .largest()
            .cloned()
            .map(|region| features::extract_features(&cleaned, region));

        if extraction.is_none() {
            log::info!("No object region found ({}x{} image)", img.width(), img.height());
        }

        Analysis {
            threshold,
            binary,
            cleaned,
            segmentation,
            extraction,
        }
    }

    /// Feature vector and oriented region of the largest object, if any
    pub fn features(&self, img: &DynamicImage) -> Option<(ShapeFeatureVector, Region)> {
        self.analyze(img)
            .extraction
            .map(|e| (e.features, e.region))
    }
}

impl Default for ObjectRecognizer {
    fn default() -> Self {
        Self::new(RecognizerConfig::default())
    }
}

/// Build the standard shape-classification pipeline
pub fn build_shape_pipeline(
    config: RecognizerConfig,
    db: crate::classify::SharedDatabase,
) -> crate::pipeline::Pipeline {
    use crate::pipeline::Pipeline;
    use std::sync::Arc;
    use steps::*;

    Pipeline::new()
        .with_config(config)
        .add_step(Arc::new(BinarizeStep))
        .add_step(Arc::new(CleanStep))
        .add_step(Arc::new(SegmentStep::default()))
        .add_step(Arc::new(FeatureStep))
        .add_step(Arc::new(ShapeClassifyStep { db }))
}
