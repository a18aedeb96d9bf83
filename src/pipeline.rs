use image::DynamicImage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Result;

use crate::analysis::threshold::BinaryMask;
use crate::config::RecognizerConfig;
use crate::models::{Embedding, Region, ShapeFeatureVector};

/// Data that flows through the pipeline
/// Each PipelineData represents one image, or one region of it once segmented
#[derive(Clone)]
pub struct PipelineData {
    /// Output image of the most recent step (mask, visualization, crop, ...)
    pub image: DynamicImage,

    /// Reference to the original image (shared efficiently via Arc)
    pub original: Arc<DynamicImage>,

    /// Cleaned binary mask, once binarization has run
    pub mask: Option<Arc<BinaryMask>>,

    /// The region this item describes (None before segmentation)
    pub region: Option<Region>,

    pub features: Option<ShapeFeatureVector>,

    pub embedding: Option<Embedding>,

    /// Classification result
    pub label: Option<String>,

    /// Diagnostic values recorded by the steps (e.g., "threshold", "regions")
    pub metadata: HashMap<String, MetadataValue>,
}

/// Metadata value types
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Float(f64),
    Int(i64),
}

impl PipelineData {
    /// Create PipelineData for a full image
    pub fn from_image(image: DynamicImage) -> Self {
        let original = Arc::new(image.clone());
        Self {
            image,
            original,
            mask: None,
            region: None,
            features: None,
            embedding: None,
            label: None,
            metadata: HashMap::new(),
        }
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Get metadata as float
    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.metadata.get(key) {
            Some(MetadataValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    /// Get metadata as integer
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.metadata.get(key) {
            Some(MetadataValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn require_mask(&self) -> Result<&Arc<BinaryMask>> {
        self.mask
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Missing binary mask; run binarization first"))
    }

    pub fn require_region(&self) -> Result<&Region> {
        self.region
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Missing region; run segmentation first"))
    }
}

/// Context available to all pipeline steps
#[derive(Clone, Default)]
pub struct PipelineContext {
    pub config: RecognizerConfig,
    /// Root directory for per-step debug images, when enabled
    pub debug_dir: Option<PathBuf>,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Process data and return transformed data
    /// Steps can split data (1 → many), filter (many → fewer), or transform (many → many)
    fn process(
        &self,
        data: Vec<PipelineData>,
        context: &PipelineContext,
    ) -> Result<Vec<PipelineData>>;

    /// Human-readable name for this step (used in log output and debug directories)
    fn name(&self) -> &str;
}

/// Composable pipeline builder
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext::default(),
        }
    }

    pub fn with_config(mut self, config: RecognizerConfig) -> Self {
        self.context.config = config;
        self
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        // Check if directory exists and is empty
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            // Create directory if it doesn't exist
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug_dir = Some(output_dir);

        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    fn save_debug_images(&self, dir_name: &str, data: &[PipelineData]) -> Result<()> {
        let Some(output_dir) = &self.context.debug_dir else {
            return Ok(());
        };

        let step_dir = output_dir.join(dir_name);
        std::fs::create_dir_all(&step_dir)?;

        for (idx, item) in data.iter().enumerate() {
            let output_path = step_dir.join(format!("{:02}.png", idx + 1));
            item.image.save(&output_path)
                .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;
        }

        log::debug!("Debug: saved {} images to {}/", data.len(), dir_name);
        Ok(())
    }

    /// Run the pipeline sequentially on an input image
    pub fn run(&self, input: DynamicImage) -> Result<Vec<PipelineData>> {
        self.run_partial(input, self.steps.len())
    }

    /// Run the pipeline but stop after `num_steps` steps (useful for debugging)
    pub fn run_partial(&self, input: DynamicImage, num_steps: usize) -> Result<Vec<PipelineData>> {
        let mut data = vec![PipelineData::from_image(input)];
        self.save_debug_images("00_input", &data)?;

        for (step_idx, step) in self.steps.iter().take(num_steps).enumerate() {
            log::debug!("Running step: {} (processing {} items)", step.name(), data.len());

            data = step.process(data, &self.context)?;

            let step_dir_name = format!("{:02}_{}", step_idx + 1,
                step.name().to_lowercase().replace(' ', "_"));
            self.save_debug_images(&step_dir_name, &data)?;

            log::debug!("  → {} items", data.len());
        }

        Ok(data)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
