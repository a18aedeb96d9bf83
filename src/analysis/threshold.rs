use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::separable_filter_equal;

use crate::config::RecognizerConfig;

/// Foreground value of a binary mask
pub const FOREGROUND: u8 = 255;
/// Background value of a binary mask
pub const BACKGROUND: u8 = 0;

/// 5-tap binomial kernel; applied along both axes it gives the 5x5 smoothing blur
const SMOOTHING_KERNEL: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

/// Grayscale image whose every pixel is either `FOREGROUND` or `BACKGROUND`
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask(GrayImage);

impl BinaryMask {
    /// All-background mask
    pub fn new(width: u32, height: u32) -> Self {
        Self(GrayImage::from_pixel(width, height, Luma([BACKGROUND])))
    }

    /// Build a mask from a predicate over pixel coordinates
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Self {
        Self(GrayImage::from_fn(width, height, |x, y| {
            Luma([if f(x, y) { FOREGROUND } else { BACKGROUND }])
        }))
    }

    /// Any non-zero pixel becomes foreground
    pub fn from_gray(image: &GrayImage) -> Self {
        Self::from_fn(image.width(), image.height(), |x, y| {
            image.get_pixel(x, y)[0] != BACKGROUND
        })
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.0.get_pixel(x, y)[0] == FOREGROUND
    }

    pub fn set(&mut self, x: u32, y: u32, foreground: bool) {
        let value = if foreground { FOREGROUND } else { BACKGROUND };
        self.0.put_pixel(x, y, Luma([value]));
    }

    pub fn foreground_count(&self) -> usize {
        self.0.pixels().filter(|p| p[0] == FOREGROUND).count()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.0
    }

    pub fn to_dynamic(&self) -> DynamicImage {
        DynamicImage::ImageLuma8(self.0.clone())
    }
}

/// BT.601 luma weights for R, G and B
const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// Convert image to grayscale with BT.601 weights, rounding to the nearest level.
///
/// Single-channel 8-bit images are returned as they are; alpha is ignored.
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = img {
        return gray.clone();
    }

    let rgb = img.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let p = rgb.get_pixel(x, y);
        let luma: f64 = (0..3).map(|c| LUMA_WEIGHTS[c] * p[c] as f64).sum();
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Apply the fixed 5x5 smoothing blur.
///
/// Pixels beyond the border repeat the edge value, and imageproc's conversion
/// back to 8 bits may land one level below a rounded result.
pub fn smooth(img: &GrayImage) -> GrayImage {
    separable_filter_equal(img, &SMOOTHING_KERNEL)
}

/// Two-means (ISODATA) clustering over a strided sample of the image.
///
/// Returns the midpoint between the two converged cluster means.
pub fn isodata_threshold(img: &GrayImage, config: &RecognizerConfig) -> f64 {
    let stride = config.sample_stride.max(1) as usize;
    let samples: Vec<f64> = (0..img.height())
        .step_by(stride)
        .flat_map(|y| {
            (0..img.width())
                .step_by(stride)
                .map(move |x| img.get_pixel(x, y)[0] as f64)
        })
        .collect();

    let (mut m1, mut m2) = config.initial_means;

    for iteration in 0..config.max_iterations {
        let (mut sum1, mut sum2) = (0.0, 0.0);
        let (mut count1, mut count2) = (0usize, 0usize);

        for &v in &samples {
            if (v - m1).abs() < (v - m2).abs() {
                sum1 += v;
                count1 += 1;
            } else {
                sum2 += v;
                count2 += 1;
            }
        }

        let new_m1 = if count1 > 0 { sum1 / count1 as f64 } else { m1 };
        let new_m2 = if count2 > 0 { sum2 / count2 as f64 } else { m2 };

        let converged = (new_m1 - m1).abs() < config.convergence_epsilon
            && (new_m2 - m2).abs() < config.convergence_epsilon;
        if converged {
            log::trace!("Threshold clustering converged after {} iterations", iteration + 1);
            break;
        }
        m1 = new_m1;
        m2 = new_m2;
    }

    (m1 + m2) / 2.0
}

/// Dark pixels (below the threshold) become foreground
pub fn apply_threshold(img: &GrayImage, threshold: f64) -> BinaryMask {
    BinaryMask::from_fn(img.width(), img.height(), |x, y| {
        (img.get_pixel(x, y)[0] as f64) < threshold
    })
}

/// Adaptive two-cluster binarization
#[derive(Debug, Clone, Default)]
pub struct Binarizer {
    pub config: RecognizerConfig,
}

impl Binarizer {
    pub fn new(config: RecognizerConfig) -> Self {
        Self { config }
    }

    /// Grayscale, blur, cluster a sample, and threshold the full blurred image
    pub fn apply(&self, img: &DynamicImage) -> BinaryMask {
        self.apply_with_threshold(img).0
    }

    /// Same as `apply`, also returning the threshold that was chosen
    pub fn apply_with_threshold(&self, img: &DynamicImage) -> (BinaryMask, f64) {
        let gray = to_grayscale(img);
        let blurred = smooth(&gray);
        let threshold = isodata_threshold(&blurred, &self.config);
        log::debug!("Binarization threshold: {:.2}", threshold);
        (apply_threshold(&blurred, threshold), threshold)
    }
}

/// Binarize with the default configuration
pub fn binarize(img: &DynamicImage) -> BinaryMask {
    Binarizer::default().apply(img)
}
