use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage};
use imageproc::definitions::Clamp;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};

use crate::config::RecognizerConfig;
use crate::models::{Embedding, Region, UNKNOWN_LABEL};

/// Per-channel (R, G, B) mean subtracted before scaling
const CHANNEL_MEAN: [f32; 3] = [124.0, 116.0, 104.0];
/// Multiplier applied after mean subtraction
const PIXEL_SCALE: f32 = (1.0 / 255.0) * (1.0 / 0.226);
/// Canvas side relative to the larger image side, enough to hold most rotations
const CANVAS_FACTOR: f64 = 1.414;

/// Normalised network input in NCHW layout with a batch of one
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingInput {
    pub size: u32,
    pub data: Vec<f32>,
}

impl EmbeddingInput {
    pub fn shape(&self) -> [usize; 4] {
        [1, 3, self.size as usize, self.size as usize]
    }

    /// Value at channel `c` (0 = R) and pixel (x, y)
    pub fn at(&self, c: usize, x: u32, y: u32) -> f32 {
        let plane = (self.size * self.size) as usize;
        self.data[c * plane + (y * self.size + x) as usize]
    }
}

/// Something that turns a prepared image into an embedding vector
pub trait Embedder {
    fn embed(&self, input: &EmbeddingInput) -> anyhow::Result<Embedding>;
}

/// Rotate `image` by `theta` about `center` onto a `side` x `side` canvas
fn rotate_about<P>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    center: (f32, f32),
    theta: f32,
    side: u32,
    background: P,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + Send + Sync,
    P::Subpixel: Send + Sync + Into<f32> + Clamp<f32>,
{
    let projection = Projection::translate(center.0, center.1)
        * Projection::rotate(theta)
        * Projection::translate(-center.0, -center.1);
    let mut canvas = ImageBuffer::from_pixel(side, side, background);
    warp_into(image, &projection, Interpolation::Bilinear, background, &mut canvas);
    canvas
}

/// Clamp a crop rectangle to a `cols` x `rows` canvas.
///
/// Returns `None` when nothing of positive size remains.
pub fn clamp_crop(
    left: i64,
    top: i64,
    width: i64,
    height: i64,
    cols: u32,
    rows: u32,
) -> Option<(u32, u32, u32, u32)> {
    let (mut left, mut top, mut width, mut height) = (left, top, width, height);
    let cols = cols as i64;
    let rows = rows as i64;

    if left < 0 {
        width += left;
        left = 0;
    }
    if top < 0 {
        height += top;
        top = 0;
    }
    if left + width >= cols {
        width = cols - 1 - left;
    }
    if top + height >= rows {
        height = rows - 1 - top;
    }

    if width <= 0 || height <= 0 {
        return None;
    }
    Some((left as u32, top as u32, width as u32, height as u32))
}

/// Rotate `original` so the region's principal axis is horizontal and crop
/// the region's oriented extent.
///
/// Falls back to the whole original image when the region has no
/// orientation or the crop is empty.
pub fn align_crop(original: &DynamicImage, region: &Region) -> DynamicImage {
    let Some(orientation) = region.orientation else {
        log::debug!("Region {} has no orientation, using full frame", region.label);
        return original.clone();
    };

    let cx = region.centroid.0 as i64;
    let cy = region.centroid.1 as i64;
    let side = (CANVAS_FACTOR * original.width().max(original.height()) as f64) as u32;
    let center = (cx as f32, cy as f32);
    let theta = -orientation.theta as f32;

    let left = cx + orientation.min_e1 as i64;
    let top = cy - orientation.max_e2 as i64;
    let width = orientation.max_e1 as i64 - orientation.min_e1 as i64;
    let height = orientation.max_e2 as i64 - orientation.min_e2 as i64;

    let Some((x, y, w, h)) = clamp_crop(left, top, width, height, side, side) else {
        log::debug!("Empty crop for region {}, using full frame", region.label);
        return original.clone();
    };

    match original {
        DynamicImage::ImageLuma8(gray) => {
            let rotated: GrayImage = rotate_about(gray, center, theta, side, Luma([0u8]));
            DynamicImage::ImageLuma8(imageops::crop_imm(&rotated, x, y, w, h).to_image())
        }
        other => {
            let rgb = other.to_rgb8();
            let rotated: RgbImage = rotate_about(&rgb, center, theta, side, Rgb([0u8, 0, 0]));
            DynamicImage::ImageRgb8(imageops::crop_imm(&rotated, x, y, w, h).to_image())
        }
    }
}

/// Resize to the square network input, expand to three channels and normalise
pub fn prepare_input(crop: &DynamicImage, size: u32) -> EmbeddingInput {
    let resized = crop.resize_exact(size, size, FilterType::Triangle).to_rgb8();
    let plane = (size * size) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = (y * size + x) as usize;
        for c in 0..3 {
            data[c * plane + offset] = (pixel[c] as f32 - CHANNEL_MEAN[c]) * PIXEL_SCALE;
        }
    }

    EmbeddingInput { size, data }
}

/// Align, crop, normalise and embed one region of `original`
pub fn embed_region(
    original: &DynamicImage,
    region: &Region,
    embedder: &dyn Embedder,
    config: &RecognizerConfig,
) -> anyhow::Result<Embedding> {
    let crop = align_crop(original, region);
    let input = prepare_input(&crop, config.embedding_input_size);
    embedder.embed(&input)
}

/// Nearest-reference classifier in embedding space
#[derive(Debug, Clone, Default)]
pub struct EmbeddingClassifier {
    references: Vec<(String, Embedding)>,
}

impl EmbeddingClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_reference(&mut self, label: impl Into<String>, embedding: Embedding) {
        self.references.push((label.into(), embedding));
    }

    pub fn references(&self) -> &[(String, Embedding)] {
        &self.references
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Closest reference label and its distance
    pub fn nearest(&self, query: &Embedding) -> Option<(&str, f64)> {
        self.references
            .iter()
            .map(|(label, reference)| (label.as_str(), query.distance(reference)))
            .fold(None, |best, (label, dist)| match best {
                Some((_, best_dist)) if best_dist <= dist => best,
                _ => Some((label, dist)),
            })
    }

    /// Label of the closest reference; `"unknown"` only when there are none
    pub fn classify(&self, query: &Embedding) -> String {
        match self.nearest(query) {
            Some((label, dist)) => {
                log::debug!("Nearest embedding {:?} at distance {:.3}", label, dist);
                label.to_string()
            }
            None => UNKNOWN_LABEL.to_string(),
        }
    }
}

impl FromIterator<(String, Embedding)> for EmbeddingClassifier {
    fn from_iter<I: IntoIterator<Item = (String, Embedding)>>(iter: I) -> Self {
        Self {
            references: iter.into_iter().collect(),
        }
    }
}
