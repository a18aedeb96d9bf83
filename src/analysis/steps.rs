use crate::analysis::features::{self, annotate};
use crate::analysis::morphology::MorphologyFilter;
use crate::analysis::segmentation::RegionSegmenter;
use crate::analysis::threshold::Binarizer;
use crate::classify::embedding::{self, Embedder, EmbeddingClassifier};
use crate::classify::{SharedDatabase, shape};
use crate::pipeline::{MetadataValue, PipelineContext, PipelineData, PipelineStep};
use anyhow::Result;
use image::DynamicImage;
use std::sync::Arc;

/// Adaptive two-cluster binarization
pub struct BinarizeStep;

impl PipelineStep for BinarizeStep {
    fn process(
        &self,
        data: Vec<PipelineData>,
        context: &PipelineContext,
    ) -> Result<Vec<PipelineData>> {
        let binarizer = Binarizer::new(context.config.clone());
        let mut result = Vec::new();
        for item in data {
            let (mask, threshold) = binarizer.apply_with_threshold(&item.image);
            let mut new_item = item.with_metadata("threshold", MetadataValue::Float(threshold));
            new_item.image = mask.to_dynamic();
            new_item.mask = Some(Arc::new(mask));
            result.push(new_item);
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Binarize"
    }
}

/// Opening then closing of the binary mask
pub struct CleanStep;

impl PipelineStep for CleanStep {
    fn process(
        &self,
        data: Vec<PipelineData>,
        context: &PipelineContext,
    ) -> Result<Vec<PipelineData>> {
        let filter = MorphologyFilter::from_config(&context.config);
        let mut result = Vec::new();
        for item in data {
            let cleaned = filter.apply(item.require_mask()?);
            let mut new_item = item.clone();
            new_item.image = cleaned.to_dynamic();
            new_item.mask = Some(Arc::new(cleaned));
            result.push(new_item);
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Morphology"
    }
}

/// Split each mask into its largest regions - one output item per region
pub struct SegmentStep {
    pub max_regions: usize,
}

impl Default for SegmentStep {
    fn default() -> Self {
        Self { max_regions: 1 }
    }
}

impl PipelineStep for SegmentStep {
    fn process(
        &self,
        data: Vec<PipelineData>,
        context: &PipelineContext,
    ) -> Result<Vec<PipelineData>> {
        let segmenter = RegionSegmenter::from_config(&context.config);
        let mut result = Vec::new();

        for item in data {
            let segmentation = segmenter.segment(item.require_mask()?);
            if segmentation.regions.is_empty() {
                log::info!("No region survived filtering");
                continue;
            }

            let visualization = DynamicImage::ImageRgb8(segmentation.visualize());
            let found = segmentation.regions.len() as i64;
            for region in segmentation.regions.into_iter().take(self.max_regions) {
                let mut region_item = item
                    .clone()
                    .with_metadata("regions", MetadataValue::Int(found));
                region_item.image = visualization.clone();
                region_item.region = Some(region);
                result.push(region_item);
            }
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Segmentation"
    }
}

/// Compute shape features and orientation of each region
pub struct FeatureStep;

impl PipelineStep for FeatureStep {
    fn process(
        &self,
        data: Vec<PipelineData>,
        _context: &PipelineContext,
    ) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();

        for item in data {
            let mask = item.require_mask()?.clone();
            let region = item.require_region()?.clone();
            let extraction = features::extract_features(&mask, region);

            let mut new_item = item;
            new_item.image = DynamicImage::ImageRgb8(annotate(&mask, &extraction));
            new_item.features = Some(extraction.features);
            new_item.region = Some(extraction.region);
            result.push(new_item);
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Features"
    }
}

/// Label each item by nearest scaled feature distance
pub struct ShapeClassifyStep {
    pub db: SharedDatabase,
}

impl PipelineStep for ShapeClassifyStep {
    fn process(
        &self,
        data: Vec<PipelineData>,
        context: &PipelineContext,
    ) -> Result<Vec<PipelineData>> {
        // one snapshot for the whole batch
        let db = self.db.snapshot();
        let mut result = Vec::new();

        for item in data {
            let features = item
                .features
                .ok_or_else(|| anyhow::anyhow!("Missing features; run feature extraction first"))?;
            let label = shape::classify(&features, &db, context.config.reject_threshold);
            let mut new_item = item;
            new_item.label = Some(label);
            result.push(new_item);
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Shape Classification"
    }
}

/// Label each item by nearest embedding of its aligned crop
pub struct EmbeddingClassifyStep {
    pub embedder: Arc<dyn Embedder + Send + Sync>,
    pub classifier: EmbeddingClassifier,
}

impl PipelineStep for EmbeddingClassifyStep {
    fn process(
        &self,
        data: Vec<PipelineData>,
        context: &PipelineContext,
    ) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();

        for item in data {
            let region = item.require_region()?;
            let crop = embedding::align_crop(&item.original, region);
            let input = embedding::prepare_input(&crop, context.config.embedding_input_size);
            let vector = self.embedder.embed(&input)?;
            let label = self.classifier.classify(&vector);

            let mut new_item = item.clone();
            new_item.image = crop;
            new_item.embedding = Some(vector);
            new_item.label = Some(label);
            result.push(new_item);
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Embedding Classification"
    }
}
