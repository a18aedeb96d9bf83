use std::collections::HashMap;

use image::{ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::region_labelling::{Connectivity, connected_components};

use super::threshold::{BACKGROUND, BinaryMask};
use crate::config::RecognizerConfig;
use crate::models::{BoundingBox, Region};

/// Per-pixel component labels, 0 is background
pub type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

#[derive(Debug, Clone, Copy)]
struct ComponentStats {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    count: u32,
    sum_x: u64,
    sum_y: u64,
}

/// Regions found in a mask together with the label image they came from
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub labels: LabelImage,
    /// Surviving regions, largest first
    pub regions: Vec<Region>,
}

impl Segmentation {
    pub fn largest(&self) -> Option<&Region> {
        self.regions.first()
    }

    /// Color-coded rendering of the surviving regions on black
    pub fn visualize(&self) -> RgbImage {
        let kept: HashMap<u32, Rgb<u8>> = self
            .regions
            .iter()
            .map(|r| (r.label, label_color(r.label)))
            .collect();

        RgbImage::from_fn(self.labels.width(), self.labels.height(), |x, y| {
            let label = self.labels.get_pixel(x, y)[0];
            kept.get(&label).copied().unwrap_or(Rgb([0, 0, 0]))
        })
    }
}

/// Deterministic pseudo-random color in the 55..255 range per channel
fn label_color(label: u32) -> Rgb<u8> {
    let mut h = label.wrapping_mul(0x9E37_79B9) ^ 0x85EB_CA6B;
    let mut channel = || {
        h ^= h >> 15;
        h = h.wrapping_mul(0x2C1B_3C6D);
        h ^= h >> 12;
        (h % 200) as u8 + 55
    };
    Rgb([channel(), channel(), channel()])
}

/// Connected-component extraction with area and border filtering
#[derive(Debug, Clone)]
pub struct RegionSegmenter {
    pub min_area: u32,
    pub edge_margin: u32,
}

impl RegionSegmenter {
    pub fn from_config(config: &RecognizerConfig) -> Self {
        Self {
            min_area: config.min_region_area,
            edge_margin: config.edge_margin,
        }
    }

    /// A bounding box within `edge_margin` pixels of the image border means the
    /// object was only partly captured
    fn touches_border(&self, bbox: &BoundingBox, width: u32, height: u32) -> bool {
        let m = self.edge_margin;
        bbox.x <= m
            || bbox.y <= m
            || bbox.right() + m >= width
            || bbox.bottom() + m >= height
    }

    pub fn segment(&self, mask: &BinaryMask) -> Segmentation {
        let (width, height) = mask.dimensions();
        let labels = connected_components(mask.as_gray(), Connectivity::Eight, Luma([BACKGROUND]));

        let mut stats: HashMap<u32, ComponentStats> = HashMap::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label_val = label[0];
            if label_val == 0 {
                continue;
            }

            stats
                .entry(label_val)
                .and_modify(|s| {
                    s.min_x = s.min_x.min(x);
                    s.min_y = s.min_y.min(y);
                    s.max_x = s.max_x.max(x);
                    s.max_y = s.max_y.max(y);
                    s.count += 1;
                    s.sum_x += x as u64;
                    s.sum_y += y as u64;
                })
                .or_insert(ComponentStats {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                    count: 1,
                    sum_x: x as u64,
                    sum_y: y as u64,
                });
        }

        let mut regions: Vec<Region> = stats
            .into_iter()
            .filter(|(_, s)| s.count >= self.min_area)
            .map(|(label, s)| Region {
                label,
                centroid: (
                    s.sum_x as f64 / s.count as f64,
                    s.sum_y as f64 / s.count as f64,
                ),
                area: s.count,
                bbox: BoundingBox::from_extents(s.min_x, s.min_y, s.max_x, s.max_y),
                orientation: None,
            })
            .filter(|r| !self.touches_border(&r.bbox, width, height))
            .collect();

        // label as tie-breaker keeps the order independent of hash iteration
        regions.sort_by(|a, b| b.area.cmp(&a.area).then(a.label.cmp(&b.label)));

        log::debug!("Segmentation kept {} regions", regions.len());

        Segmentation { labels, regions }
    }
}

impl Default for RegionSegmenter {
    fn default() -> Self {
        Self::from_config(&RecognizerConfig::default())
    }
}

/// Segment with the default area and border filters
pub fn segment_regions(mask: &BinaryMask) -> Vec<Region> {
    RegionSegmenter::default().segment(mask).regions
}
