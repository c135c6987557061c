//! Overlay compositor.
//!
//! Projects the diff masks back onto the raw frames: masked pixels become
//! a fixed marker color, everything else passes through. The first frame
//! has no diff by construction and is copied byte-for-byte.

use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};

use crate::frame::{overlay_path, FrameSequence, FRAME_EXT};
use crate::trace::DiffImage;

/// Magenta, the fixed change-region marker.
pub const DEFAULT_MARKER: Rgb<u8> = Rgb([255, 0, 255]);

/// Replace masked pixels of `raw` with the marker color.
pub fn composite(raw: &RgbImage, diff: &DiffImage, marker: Rgb<u8>) -> Result<RgbImage> {
    if raw.dimensions() != diff.mask.dimensions() {
        anyhow::bail!(
            "frame and mask dimensions differ: {:?} vs {:?}",
            raw.dimensions(),
            diff.mask.dimensions()
        );
    }
    let (width, height) = raw.dimensions();
    Ok(RgbImage::from_fn(width, height, |x, y| {
        if diff.mask.get_pixel(x, y).0[0] >= 128 {
            marker
        } else {
            *raw.get_pixel(x, y)
        }
    }))
}

/// Write the overlay sequence for `frames_dir` against the masks in
/// `diffs_dir`. Returns the number of overlays written (one per raw
/// frame).
///
/// The diff sequence being exactly one shorter than the frame sequence is
/// the expected shape; any other mismatch is logged and processing stops
/// at the shorter of the two.
pub fn overlay_motion_trace(
    frames_dir: &Path,
    diffs_dir: &Path,
    overlays_dir: &Path,
    marker: Rgb<u8>,
) -> Result<usize> {
    std::fs::create_dir_all(overlays_dir).with_context(|| {
        format!(
            "failed to create overlays directory {}",
            overlays_dir.display()
        )
    })?;
    let frames = FrameSequence::scan_frames(frames_dir)?;
    if frames.is_empty() {
        log::warn!("no frames found in {}", frames_dir.display());
        return Ok(0);
    }
    let diffs = FrameSequence::scan_diffs(diffs_dir)?;
    if diffs.len() + 1 != frames.len() {
        log::warn!(
            "expected {} diffs for {} frames, found {}",
            frames.len() - 1,
            frames.len(),
            diffs.len()
        );
    }

    let mut written = 0usize;
    let mut diff_iter = diffs.iter();
    for (position, frame) in frames.iter().enumerate() {
        if position == 0 {
            // Pass-through, byte-identical; keeps the raw encoding.
            let dest = overlays_dir.join(format!("overlay_0000.{FRAME_EXT}"));
            std::fs::copy(&frame.path, &dest).with_context(|| {
                format!("failed to copy frame 0 to {}", dest.display())
            })?;
            written += 1;
            continue;
        }
        let Some(diff) = diff_iter.next() else {
            break;
        };
        let raw = image::open(&frame.path)
            .with_context(|| format!("failed to decode frame {}", frame.path.display()))?
            .to_rgb8();
        let mask = image::open(&diff.path)
            .with_context(|| format!("failed to decode diff {}", diff.path.display()))?
            .to_luma8();
        let diff_image = DiffImage { mask, bbox: None };
        let out = composite(&raw, &diff_image, marker)
            .with_context(|| format!("composite failed for frame {}", frame.index))?;
        let dest = overlay_path(overlays_dir, position as u32);
        out.save(&dest)
            .with_context(|| format!("failed to write overlay {}", dest.display()))?;
        written += 1;
    }
    log::info!("wrote {written} overlays");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{detect_change, TraceSettings};

    fn flat(value: u8) -> RgbImage {
        RgbImage::from_pixel(64, 48, Rgb([value, value, value]))
    }

    fn with_square(mut img: RgbImage, x0: u32) -> RgbImage {
        for y in 16..32 {
            for x in x0..x0 + 16 {
                img.put_pixel(x, y, Rgb([240, 240, 240]));
            }
        }
        img
    }

    #[test]
    fn masked_pixels_become_marker_and_rest_pass_through() {
        let a = with_square(flat(20), 8);
        let b = with_square(flat(20), 40);
        let diff = detect_change(&a, &b, &TraceSettings::default()).unwrap();
        let out = composite(&b, &diff, DEFAULT_MARKER).unwrap();

        let mut marker_pixels = 0usize;
        for (x, y, px) in out.enumerate_pixels() {
            if diff.mask.get_pixel(x, y).0[0] >= 128 {
                assert_eq!(*px, DEFAULT_MARKER);
                marker_pixels += 1;
            } else {
                assert_eq!(px, b.get_pixel(x, y));
            }
        }
        assert!(marker_pixels > 0);
    }

    #[test]
    fn empty_mask_passes_everything_through() {
        let frame = with_square(flat(20), 8);
        let diff = detect_change(&frame, &frame, &TraceSettings::default()).unwrap();
        let out = composite(&frame, &diff, DEFAULT_MARKER).unwrap();
        assert_eq!(out.as_raw(), frame.as_raw());
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let frame = flat(20);
        let small = RgbImage::from_pixel(32, 24, Rgb([0, 0, 0]));
        let diff = detect_change(&small, &small, &TraceSettings::default()).unwrap();
        assert!(composite(&frame, &diff, DEFAULT_MARKER).is_err());
    }
}
