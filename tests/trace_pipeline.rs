use std::path::Path;

use image::{Rgb, RgbImage};

use tetherlapse::{overlay_motion_trace, trace_motion, TraceSettings, DEFAULT_MARKER};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

/// Write `n` JPEG frames of a bright square stepping across a dark field.
fn write_frames(dir: &Path, n: u32) {
    for i in 1..=n {
        let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([16, 16, 16]));
        let x0 = (i - 1) * 12;
        for y in 16..32 {
            for x in x0..x0 + 12 {
                img.put_pixel(x, y, Rgb([250, 250, 250]));
            }
        }
        img.save(dir.join(format!("frame{i:04}.jpg"))).expect("write frame");
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).expect("read dir").count()
}

#[test]
fn four_frames_yield_three_diffs_and_four_overlays() {
    let root = tempfile::tempdir().expect("tempdir");
    let frames = root.path().join("frames");
    let diffs = root.path().join("diffs");
    let overlays = root.path().join("overlays");
    std::fs::create_dir(&frames).expect("mkdir");
    write_frames(&frames, 4);

    let written = trace_motion(&frames, &diffs, &TraceSettings::default()).expect("trace");
    assert_eq!(written, 3);
    assert_eq!(count_files(&diffs), 3);
    for i in 1..=3 {
        assert!(diffs.join(format!("difference_{i:04}.png")).exists());
    }

    let written =
        overlay_motion_trace(&frames, &diffs, &overlays, DEFAULT_MARKER).expect("overlay");
    assert_eq!(written, 4);
    assert_eq!(count_files(&overlays), 4);
}

#[test]
fn overlay_zero_is_byte_identical_to_frame_one() {
    let root = tempfile::tempdir().expect("tempdir");
    let frames = root.path().join("frames");
    let diffs = root.path().join("diffs");
    let overlays = root.path().join("overlays");
    std::fs::create_dir(&frames).expect("mkdir");
    write_frames(&frames, 3);

    trace_motion(&frames, &diffs, &TraceSettings::default()).expect("trace");
    overlay_motion_trace(&frames, &diffs, &overlays, DEFAULT_MARKER).expect("overlay");

    let raw = std::fs::read(frames.join("frame0001.jpg")).expect("read raw");
    let passthrough = std::fs::read(overlays.join("overlay_0000.jpg")).expect("read overlay");
    assert_eq!(raw, passthrough);
}

#[test]
fn moving_square_produces_marker_pixels_in_overlays() {
    let root = tempfile::tempdir().expect("tempdir");
    let frames = root.path().join("frames");
    let diffs = root.path().join("diffs");
    let overlays = root.path().join("overlays");
    std::fs::create_dir(&frames).expect("mkdir");
    write_frames(&frames, 3);

    trace_motion(&frames, &diffs, &TraceSettings::default()).expect("trace");
    overlay_motion_trace(&frames, &diffs, &overlays, DEFAULT_MARKER).expect("overlay");

    let overlay = image::open(overlays.join("overlay_0001.png"))
        .expect("decode overlay")
        .to_rgb8();
    let marker_pixels = overlay
        .pixels()
        .filter(|px| **px == DEFAULT_MARKER)
        .count();
    assert!(marker_pixels > 0, "expected marked change pixels");
}

#[test]
fn static_scene_produces_empty_masks() {
    let root = tempfile::tempdir().expect("tempdir");
    let frames = root.path().join("frames");
    let diffs = root.path().join("diffs");
    std::fs::create_dir(&frames).expect("mkdir");

    // Same bytes for every frame: no motion at all.
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([80, 80, 80]));
    for y in 10..20 {
        for x in 10..30 {
            img.put_pixel(x, y, Rgb([200, 200, 200]));
        }
    }
    img.save(frames.join("frame0001.jpg")).expect("write");
    for i in 2..=3u32 {
        std::fs::copy(
            frames.join("frame0001.jpg"),
            frames.join(format!("frame{i:04}.jpg")),
        )
        .expect("copy");
    }

    trace_motion(&frames, &diffs, &TraceSettings::default()).expect("trace");
    for i in 1..=2u32 {
        let mask = image::open(diffs.join(format!("difference_{i:04}.png")))
            .expect("decode mask")
            .to_luma8();
        assert!(mask.pixels().all(|px| px.0[0] == 0));
    }
}

#[test]
fn trace_is_restartable() {
    let root = tempfile::tempdir().expect("tempdir");
    let frames = root.path().join("frames");
    let diffs = root.path().join("diffs");
    std::fs::create_dir(&frames).expect("mkdir");
    write_frames(&frames, 3);

    let first = trace_motion(&frames, &diffs, &TraceSettings::default()).expect("trace");
    let again = trace_motion(&frames, &diffs, &TraceSettings::default()).expect("re-trace");
    assert_eq!(first, again);
    assert_eq!(count_files(&diffs), 2);
}

#[test]
fn empty_frame_directory_is_not_an_error() {
    let root = tempfile::tempdir().expect("tempdir");
    let frames = root.path().join("frames");
    let diffs = root.path().join("diffs");
    std::fs::create_dir(&frames).expect("mkdir");
    assert_eq!(
        trace_motion(&frames, &diffs, &TraceSettings::default()).expect("trace"),
        0
    );
}
