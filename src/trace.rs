//! Motion-trace pipeline.
//!
//! `detect_change` is a pure function over one frame pair: it reduces the
//! per-channel absolute difference to a binary low-resolution mask,
//! smooths it, re-binarizes it, and upscales it back to frame size. The
//! downscale before thresholding both denoises and makes the blur cheap;
//! the blur merges adjacent on-regions and drops isolated noise pixels.
//!
//! `trace_motion` folds the function over a frame directory. There is no
//! cross-pair state, so a partial run can simply be restarted.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};

use crate::frame::{diff_path, FrameSequence};

/// Grayscale value above which a pixel counts as "on".
pub const DEFAULT_THRESHOLD: u8 = 64;
/// Integer downscale factor applied before thresholding.
pub const DEFAULT_SCALE_FACTOR: u32 = 4;

/// Tuning knobs of the change detector.
#[derive(Debug, Clone, Copy)]
pub struct TraceSettings {
    pub threshold: u8,
    pub scale_factor: u32,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            scale_factor: DEFAULT_SCALE_FACTOR,
        }
    }
}

/// Minimal rectangle enclosing all "on" pixels. `right`/`bottom` are
/// exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

/// Change mask for one frame pair, at the source frame's dimensions.
#[derive(Debug, Clone)]
pub struct DiffImage {
    pub mask: GrayImage,
    /// None when the pair shows no detected change.
    pub bbox: Option<BoundingBox>,
}

impl DiffImage {
    pub fn has_change(&self) -> bool {
        self.bbox.is_some()
    }

    /// Number of "on" pixels in the mask.
    pub fn on_pixels(&self) -> usize {
        self.mask.pixels().filter(|px| px.0[0] > 0).count()
    }
}

/// Compute the changed-region mask between two frames of equal size.
pub fn detect_change(prev: &RgbImage, cur: &RgbImage, settings: &TraceSettings) -> Result<DiffImage> {
    if prev.dimensions() != cur.dimensions() {
        return Err(anyhow!(
            "frame pair dimensions differ: {:?} vs {:?}",
            prev.dimensions(),
            cur.dimensions()
        ));
    }
    if settings.scale_factor == 0 {
        return Err(anyhow!("scale factor must be at least 1"));
    }
    let (width, height) = cur.dimensions();

    let diff = abs_difference(prev, cur);
    let binarized = binarize(&imageops::grayscale(&diff), settings.threshold, settings.scale_factor);
    let blurred = box_blur(&binarized);
    // Same threshold, native scale: restores a sharp mask after the blur.
    let mask = binarize(&blurred, settings.threshold, 1);
    let bbox = bounding_box(&mask).map(|bbox| scale_bbox(bbox, settings.scale_factor, width, height));
    let mask = imageops::resize(&mask, width, height, FilterType::Nearest);

    Ok(DiffImage { mask, bbox })
}

/// Per-channel absolute difference. Symmetric in its arguments.
fn abs_difference(a: &RgbImage, b: &RgbImage) -> RgbImage {
    let (width, height) = a.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let pa = a.get_pixel(x, y);
        let pb = b.get_pixel(x, y);
        image::Rgb([
            pa.0[0].abs_diff(pb.0[0]),
            pa.0[1].abs_diff(pb.0[1]),
            pa.0[2].abs_diff(pb.0[2]),
        ])
    })
}

/// Downscale by `factor` and threshold to a 0/255 mask.
fn binarize(gray: &GrayImage, threshold: u8, factor: u32) -> GrayImage {
    let scaled = if factor > 1 {
        let (width, height) = gray.dimensions();
        imageops::resize(
            gray,
            (width / factor).max(1),
            (height / factor).max(1),
            FilterType::Triangle,
        )
    } else {
        gray.clone()
    };
    GrayImage::from_fn(scaled.width(), scaled.height(), |x, y| {
        if scaled.get_pixel(x, y).0[0] > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// 3x3 mean filter with clamped edges (box blur, radius 1).
fn box_blur(gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let mut sum = 0u32;
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let sx = (i64::from(x) + dx).clamp(0, i64::from(width) - 1) as u32;
                let sy = (i64::from(y) + dy).clamp(0, i64::from(height) - 1) as u32;
                sum += u32::from(gray.get_pixel(sx, sy).0[0]);
            }
        }
        Luma([(sum / 9) as u8])
    })
}

/// Bounding box of nonzero pixels, or None for an all-off mask.
fn bounding_box(mask: &GrayImage) -> Option<BoundingBox> {
    let mut bbox: Option<BoundingBox> = None;
    for (x, y, px) in mask.enumerate_pixels() {
        if px.0[0] == 0 {
            continue;
        }
        bbox = Some(match bbox {
            None => BoundingBox {
                left: x,
                top: y,
                right: x + 1,
                bottom: y + 1,
            },
            Some(b) => BoundingBox {
                left: b.left.min(x),
                top: b.top.min(y),
                right: b.right.max(x + 1),
                bottom: b.bottom.max(y + 1),
            },
        });
    }
    bbox
}

/// Scale a low-resolution bbox back to source coordinates, clamped to the
/// frame. (The original reported the bbox at thumbnail scale.)
fn scale_bbox(bbox: BoundingBox, factor: u32, width: u32, height: u32) -> BoundingBox {
    BoundingBox {
        left: bbox.left * factor,
        top: bbox.top * factor,
        right: (bbox.right * factor).min(width),
        bottom: (bbox.bottom * factor).min(height),
    }
}

/// Compute and write the diff sequence for every consecutive frame pair
/// in `frames_dir`. Diff `i` (1-based) covers the pair of the `i`-th and
/// `i+1`-th frames in capture order. Returns the number of diffs written.
pub fn trace_motion(frames_dir: &Path, diffs_dir: &Path, settings: &TraceSettings) -> Result<usize> {
    std::fs::create_dir_all(diffs_dir)
        .with_context(|| format!("failed to create diffs directory {}", diffs_dir.display()))?;
    let frames = FrameSequence::scan_frames(frames_dir)?;
    if frames.is_empty() {
        log::warn!("no frames found in {}", frames_dir.display());
        return Ok(0);
    }

    let mut count = 0usize;
    let mut prev: Option<RgbImage> = None;
    for frame in frames.iter() {
        let cur = image::open(&frame.path)
            .with_context(|| format!("failed to decode frame {}", frame.path.display()))?
            .to_rgb8();
        if let Some(prev) = prev.take() {
            let diff = detect_change(&prev, &cur, settings)
                .with_context(|| format!("change detection failed at {}", frame.path.display()))?;
            count += 1;
            let dest = diff_path(diffs_dir, count as u32);
            diff.mask
                .save(&dest)
                .with_context(|| format!("failed to write diff {}", dest.display()))?;
            match &diff.bbox {
                Some(bbox) => log::debug!("diff {count}: change in {bbox:?}"),
                None => log::debug!("diff {count}: no change"),
            }
        }
        prev = Some(cur);
    }
    log::info!("processed {} frames, wrote {} diffs", frames.len(), count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn flat(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
    }

    fn with_square(mut img: RgbImage, x0: u32, y0: u32, size: u32, value: u8) -> RgbImage {
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                img.put_pixel(x, y, Rgb([value, value, value]));
            }
        }
        img
    }

    #[test]
    fn identical_frames_yield_empty_mask_and_no_bbox() {
        let frame = with_square(flat(64, 48, 20), 8, 8, 16, 240);
        let diff = detect_change(&frame, &frame, &TraceSettings::default()).unwrap();
        assert!(!diff.has_change());
        assert_eq!(diff.on_pixels(), 0);
    }

    #[test]
    fn moved_square_is_detected() {
        let a = with_square(flat(64, 48, 20), 8, 16, 16, 240);
        let b = with_square(flat(64, 48, 20), 40, 16, 16, 240);
        let diff = detect_change(&a, &b, &TraceSettings::default()).unwrap();
        assert!(diff.has_change());
        assert!(diff.on_pixels() > 0);
        let bbox = diff.bbox.unwrap();
        assert!(bbox.left < bbox.right);
        assert!(bbox.top < bbox.bottom);
    }

    #[test]
    fn detection_is_symmetric_in_pair_order() {
        let a = with_square(flat(64, 48, 20), 8, 16, 16, 240);
        let b = with_square(flat(64, 48, 20), 40, 16, 16, 240);
        let settings = TraceSettings::default();
        let ab = detect_change(&a, &b, &settings).unwrap();
        let ba = detect_change(&b, &a, &settings).unwrap();
        assert_eq!(ab.mask.as_raw(), ba.mask.as_raw());
        assert_eq!(ab.bbox, ba.bbox);
    }

    #[test]
    fn mask_matches_source_dimensions() {
        // 65x49 does not divide evenly by the scale factor.
        let a = flat(65, 49, 20);
        let b = with_square(flat(65, 49, 20), 10, 10, 20, 240);
        let diff = detect_change(&a, &b, &TraceSettings::default()).unwrap();
        assert_eq!(diff.mask.dimensions(), (65, 49));
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let a = flat(64, 48, 0);
        let b = flat(32, 48, 0);
        assert!(detect_change(&a, &b, &TraceSettings::default()).is_err());
    }

    #[test]
    fn faint_noise_stays_below_threshold() {
        let a = flat(64, 48, 100);
        let b = flat(64, 48, 120); // 20 gray levels of uniform drift
        let diff = detect_change(&a, &b, &TraceSettings::default()).unwrap();
        assert!(!diff.has_change());
    }
}
