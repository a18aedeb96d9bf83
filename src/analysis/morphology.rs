use super::threshold::BinaryMask;
use crate::config::RecognizerConfig;

/// Square k x k structuring-element morphology.
///
/// Pixels within `k / 2` of any image edge are never processed and always
/// come out as background, for erosion and dilation alike.
fn apply_window(mask: &BinaryMask, ksize: u32, hit: impl Fn(usize, usize) -> bool) -> BinaryMask {
    let (width, height) = mask.dimensions();
    let half = ksize / 2;
    let mut out = BinaryMask::new(width, height);

    if width <= 2 * half || height <= 2 * half {
        return out;
    }

    for y in half..height - half {
        for x in half..width - half {
            let window_hits = (y - half..=y + half)
                .flat_map(|wy| (x - half..=x + half).map(move |wx| (wx, wy)))
                .filter(|&(wx, wy)| mask.is_foreground(wx, wy))
                .count();
            let window_size = (2 * half as usize + 1) * (2 * half as usize + 1);
            if hit(window_hits, window_size) {
                out.set(x, y, true);
            }
        }
    }

    out
}

/// Foreground only where the whole window is foreground
pub fn erode(mask: &BinaryMask, ksize: u32) -> BinaryMask {
    apply_window(mask, ksize, |hits, size| hits == size)
}

/// Foreground wherever any pixel of the window is foreground
pub fn dilate(mask: &BinaryMask, ksize: u32) -> BinaryMask {
    apply_window(mask, ksize, |hits, _| hits > 0)
}

/// Erode then dilate; removes specks smaller than the kernel
pub fn open(mask: &BinaryMask, ksize: u32) -> BinaryMask {
    dilate(&erode(mask, ksize), ksize)
}

/// Dilate then erode; fills holes smaller than the kernel
pub fn close(mask: &BinaryMask, ksize: u32) -> BinaryMask {
    erode(&dilate(mask, ksize), ksize)
}

/// Opening followed by closing
#[derive(Debug, Clone)]
pub struct MorphologyFilter {
    pub open_kernel: u32,
    pub close_kernel: u32,
}

impl MorphologyFilter {
    pub fn from_config(config: &RecognizerConfig) -> Self {
        Self {
            open_kernel: config.open_kernel,
            close_kernel: config.close_kernel,
        }
    }

    pub fn apply(&self, mask: &BinaryMask) -> BinaryMask {
        let opened = open(mask, self.open_kernel);
        close(&opened, self.close_kernel)
    }
}

impl Default for MorphologyFilter {
    fn default() -> Self {
        Self::from_config(&RecognizerConfig::default())
    }
}

/// Clean a mask with the default 3-kernel opening and 5-kernel closing
pub fn clean(mask: &BinaryMask) -> BinaryMask {
    MorphologyFilter::default().apply(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_band_is_left_background() {
        let full = BinaryMask::from_fn(10, 10, |_, _| true);
        let dilated = dilate(&full, 5);
        assert!(!dilated.is_foreground(1, 5));
        assert!(dilated.is_foreground(2, 5));
        assert!(!dilated.is_foreground(8, 5));
        assert!(dilated.is_foreground(7, 7));
    }

    #[test]
    fn kernel_larger_than_image_yields_empty_mask() {
        let full = BinaryMask::from_fn(4, 4, |_, _| true);
        assert_eq!(erode(&full, 5).foreground_count(), 0);
    }

    #[test]
    fn erosion_shrinks_square_by_radius() {
        let square =
            BinaryMask::from_fn(20, 20, |x, y| (5..15).contains(&x) && (5..15).contains(&y));
        let eroded = erode(&square, 3);
        assert_eq!(eroded.foreground_count(), 8 * 8);
        assert!(eroded.is_foreground(6, 6));
        assert!(!eroded.is_foreground(5, 5));
    }
}
