#![allow(dead_code)]

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, Luma};
use shapeclass::BinaryMask;

/// Intensity of the light table behind objects
pub const BACKGROUND_LEVEL: u8 = 220;
/// Intensity of the dark objects
pub const OBJECT_LEVEL: u8 = 30;

/// Synthetic object outlines
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    Rect { x: u32, y: u32, width: u32, height: u32 },
    Ellipse { cx: f64, cy: f64, rx: f64, ry: f64 },
    /// Rectangle of the given half sizes rotated by `angle` (radians, y down)
    RotatedRect { cx: f64, cy: f64, half_len: f64, half_width: f64, angle: f64 },
}

impl Shape {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        let (px, py) = (x as f64, y as f64);
        match *self {
            Shape::Rect { x: rx, y: ry, width, height } => {
                x >= rx && x < rx + width && y >= ry && y < ry + height
            }
            Shape::Ellipse { cx, cy, rx, ry } => {
                let dx = (px - cx) / rx;
                let dy = (py - cy) / ry;
                dx * dx + dy * dy <= 1.0
            }
            Shape::RotatedRect { cx, cy, half_len, half_width, angle } => {
                let (s, c) = angle.sin_cos();
                let dx = px - cx;
                let dy = py - cy;
                let u = dx * c + dy * s;
                let v = -dx * s + dy * c;
                u.abs() <= half_len && v.abs() <= half_width
            }
        }
    }

    /// The same shape moved by (dx, dy)
    pub fn translated(&self, dx: i32, dy: i32) -> Shape {
        match *self {
            Shape::Rect { x, y, width, height } => Shape::Rect {
                x: (x as i32 + dx) as u32,
                y: (y as i32 + dy) as u32,
                width,
                height,
            },
            Shape::Ellipse { cx, cy, rx, ry } => Shape::Ellipse {
                cx: cx + dx as f64,
                cy: cy + dy as f64,
                rx,
                ry,
            },
            Shape::RotatedRect { cx, cy, half_len, half_width, angle } => Shape::RotatedRect {
                cx: cx + dx as f64,
                cy: cy + dy as f64,
                half_len,
                half_width,
                angle,
            },
        }
    }
}

/// Left part at intensity 50, the rest at 200
pub fn bimodal_image(width: u32, height: u32, split_x: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, _| Luma([if x < split_x { 50 } else { 200 }]))
}

pub fn shape_mask(width: u32, height: u32, shape: Shape) -> BinaryMask {
    BinaryMask::from_fn(width, height, |x, y| shape.contains(x, y))
}

/// Dark object on a light background, as a grayscale image
pub fn object_image(width: u32, height: u32, shape: Shape) -> DynamicImage {
    let gray = GrayImage::from_fn(width, height, |x, y| {
        Luma([if shape.contains(x, y) { OBJECT_LEVEL } else { BACKGROUND_LEVEL }])
    });
    DynamicImage::ImageLuma8(gray)
}

/// Same as `object_image` but three-channel
pub fn object_image_rgb(width: u32, height: u32, shape: Shape) -> DynamicImage {
    DynamicImage::ImageRgb8(object_image(width, height, shape).to_rgb8())
}

/// Save an image as PNG inside `dir` and return its path
pub fn save_png(dir: &Path, name: &str, img: &DynamicImage) -> PathBuf {
    let path = dir.join(name);
    img.save_with_format(&path, image::ImageFormat::Png)
        .expect("Failed to save test image");
    path
}

pub fn rectangle() -> Shape {
    Shape::Rect { x: 60, y: 80, width: 80, height: 40 }
}

pub fn ellipse() -> Shape {
    Shape::Ellipse { cx: 100.0, cy: 100.0, rx: 40.0, ry: 25.0 }
}
