use std::fmt;

/// Label returned when no reference is close enough (or none exist)
pub const UNKNOWN_LABEL: &str = "unknown";

/// Axis-aligned bounding box in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn from_extents(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Exclusive right edge
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Principal-axis orientation and the contour extents measured along it.
///
/// `min_e1..max_e1` runs along the major axis, `min_e2..max_e2` along the
/// perpendicular axis with positive values pointing up in the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub theta: f64,
    pub min_e1: f64,
    pub max_e1: f64,
    pub min_e2: f64,
    pub max_e2: f64,
}

/// A connected foreground component that survived segmentation filtering
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub label: u32,
    pub centroid: (f64, f64),
    pub area: u32,
    pub bbox: BoundingBox,
    /// Filled in once by feature extraction
    pub orientation: Option<Orientation>,
}

impl Region {
    /// Fraction of the bounding box covered by the region
    pub fn percent_filled(&self) -> f64 {
        let bbox_area = self.bbox.area();
        if bbox_area == 0 {
            return 0.0;
        }
        self.area as f64 / bbox_area as f64
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }
}

/// Scale/rotation-tolerant shape statistics of one region
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShapeFeatureVector {
    pub percent_filled: f64,
    pub hw_ratio: f64,
    pub hu1: f64,
    pub hu2: f64,
    pub hu3: f64,
}

impl ShapeFeatureVector {
    pub const DIMENSIONS: usize = 5;

    pub fn new(percent_filled: f64, hw_ratio: f64, hu1: f64, hu2: f64, hu3: f64) -> Self {
        Self {
            percent_filled,
            hw_ratio,
            hu1,
            hu2,
            hu3,
        }
    }

    pub fn to_array(&self) -> [f64; Self::DIMENSIONS] {
        [
            self.percent_filled,
            self.hw_ratio,
            self.hu1,
            self.hu2,
            self.hu3,
        ]
    }

    pub fn from_array(values: [f64; Self::DIMENSIONS]) -> Self {
        let [percent_filled, hw_ratio, hu1, hu2, hu3] = values;
        Self::new(percent_filled, hw_ratio, hu1, hu2, hu3)
    }

    /// The all-zero vector returned for regions without any foreground pixels
    pub fn is_degenerate(&self) -> bool {
        self.to_array().iter().all(|v| *v == 0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingEntry {
    pub label: String,
    pub features: ShapeFeatureVector,
}

impl TrainingEntry {
    pub fn new(label: impl Into<String>, features: ShapeFeatureVector) -> Self {
        Self {
            label: label.into(),
            features,
        }
    }
}

/// Output vector of the embedding network for one aligned crop
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Euclidean distance. Extra trailing components of the longer vector
    /// count against the shorter one as if it were zero-padded.
    pub fn distance(&self, other: &Embedding) -> f64 {
        let len = self.0.len().max(other.0.len());
        let mut sum = 0.0f64;
        for i in 0..len {
            let a = self.0.get(i).copied().unwrap_or(0.0) as f64;
            let b = other.0.get(i).copied().unwrap_or(0.0) as f64;
            sum += (a - b) * (a - b);
        }
        sum.sqrt()
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl fmt::Display for ShapeFeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fill={:.3} hw={:.3} hu=({:.3}, {:.3}, {:.3})",
            self.percent_filled, self.hw_ratio, self.hu1, self.hu2, self.hu3
        )
    }
}
