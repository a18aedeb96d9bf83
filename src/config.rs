use std::path::{Path, PathBuf};

use anyhow::Context;

/// Tunables for the whole recognition pipeline.
///
/// `Default` yields the canonical parameter set; callers override
/// individual fields with struct update syntax.
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// Pixel stride used when sampling intensities for threshold clustering
    pub sample_stride: u32,
    /// Starting cluster means on the 0-255 scale
    pub initial_means: (f64, f64),
    pub max_iterations: usize,
    /// Both means must move less than this to stop early
    pub convergence_epsilon: f64,
    /// Kernel size of the speckle-removing opening
    pub open_kernel: u32,
    /// Kernel size of the hole-filling closing
    pub close_kernel: u32,
    pub min_region_area: u32,
    /// Regions whose bounding box comes within this many pixels of an edge are dropped
    pub edge_margin: u32,
    /// Nearest-neighbour distance above which a shape is reported as unknown
    pub reject_threshold: f64,
    /// Side length of the square embedding network input
    pub embedding_input_size: u32,
    /// Preferred embedding output node; the model's default output is used when absent
    pub embedding_layer: Option<String>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            sample_stride: 4,
            initial_means: (85.0, 170.0),
            max_iterations: 20,
            convergence_epsilon: 0.5,
            open_kernel: 3,
            close_kernel: 5,
            min_region_area: 500,
            edge_margin: 1,
            reject_threshold: f64::INFINITY,
            embedding_input_size: 224,
            embedding_layer: Some("resnetv22_flatten0_reshape0".to_string()),
        }
    }
}

impl RecognizerConfig {
    pub fn with_reject_threshold(mut self, threshold: f64) -> Self {
        self.reject_threshold = threshold;
        self
    }
}

/// One labelled image in a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetItem {
    pub label: String,
    pub path: PathBuf,
}

/// Which half of the dataset an item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Eval,
}

/// Label set plus training and evaluation file lists.
///
/// Manifest text format, one item per line:
///
/// ```text
/// # comment
/// train,circle,images/circle_1.png
/// eval,circle,images/circle_2.png
/// ```
///
/// Relative paths are resolved against the manifest's directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetManifest {
    pub labels: Vec<String>,
    pub train: Vec<DatasetItem>,
    pub eval: Vec<DatasetItem>,
}

impl DatasetManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item, registering its label the first time it appears
    pub fn push(&mut self, split: Split, label: impl Into<String>, path: impl Into<PathBuf>) {
        let label = label.into();
        if !self.labels.contains(&label) {
            self.labels.push(label.clone());
        }
        let item = DatasetItem {
            label,
            path: path.into(),
        };
        match split {
            Split::Train => self.train.push(item),
            Split::Eval => self.eval.push(item),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base)
    }

    pub fn parse(text: &str, base: &Path) -> anyhow::Result<Self> {
        let mut manifest = Self::new();

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.splitn(3, ',').map(str::trim).collect();
            if fields.len() != 3 {
                anyhow::bail!(
                    "Manifest line {}: expected `split,label,path`, got {:?}",
                    line_no + 1,
                    line
                );
            }

            let split = match fields[0] {
                "train" => Split::Train,
                "eval" => Split::Eval,
                other => anyhow::bail!("Manifest line {}: unknown split {:?}", line_no + 1, other),
            };
            if fields[1].is_empty() {
                anyhow::bail!("Manifest line {}: empty label", line_no + 1);
            }

            let item_path = Path::new(fields[2]);
            let item_path = if item_path.is_absolute() {
                item_path.to_path_buf()
            } else {
                base.join(item_path)
            };
            manifest.push(split, fields[1], item_path);
        }

        Ok(manifest)
    }
}
