//! Directory-resident frame sequences.
//!
//! The scheduler, motion-trace pipeline, and overlay compositor hand off
//! through the file system: each stage reads one directory of numbered
//! files and writes another. Names follow fixed zero-padded templates so a
//! file's sequence index is its identity.
//!
//! Frames are append-only. The scheduler never renumbers or overwrites an
//! existing frame; a restarted run continues at the next free index.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Raw capture frames: `frame0001.jpg`, 1-indexed.
pub const FRAME_PREFIX: &str = "frame";
pub const FRAME_EXT: &str = "jpg";

/// Motion-trace masks: `difference_0001.png`; index `i` is the diff of
/// frame pair `(i-1, i)`.
pub const DIFF_PREFIX: &str = "difference_";
pub const DIFF_EXT: &str = "png";

/// Overlay composites: `overlay_0000.png`, one per raw frame including
/// the pass-through at index 0.
pub const OVERLAY_PREFIX: &str = "overlay_";
pub const OVERLAY_EXT: &str = "png";

/// Path of the raw frame at `index` under `dir`.
pub fn frame_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("{FRAME_PREFIX}{index:04}.{FRAME_EXT}"))
}

/// Path of the diff mask at `index` under `dir`.
pub fn diff_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("{DIFF_PREFIX}{index:04}.{DIFF_EXT}"))
}

/// Path of the overlay at `index` under `dir`.
pub fn overlay_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("{OVERLAY_PREFIX}{index:04}.{OVERLAY_EXT}"))
}

/// One frame of a sequence: its 1-indexed capture position and file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub index: u32,
    pub path: PathBuf,
}

/// An ordered scan of a template-named directory.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    /// Scan `dir` for files matching `prefix`/`ext`, ordered by parsed
    /// index. Files that do not match the template are ignored; directory
    /// listing order does not matter.
    pub fn scan(dir: &Path, prefix: &str, ext: &str) -> Result<Self> {
        let mut frames = Vec::new();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("failed to list frame directory {}", dir.display()))?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(index) = parse_index(name, prefix, ext) {
                frames.push(Frame {
                    index,
                    path: entry.path(),
                });
            }
        }
        frames.sort_by_key(|frame| frame.index);
        Ok(Self { frames })
    }

    /// Scan for raw capture frames.
    pub fn scan_frames(dir: &Path) -> Result<Self> {
        Self::scan(dir, FRAME_PREFIX, FRAME_EXT)
    }

    /// Scan for diff masks.
    pub fn scan_diffs(dir: &Path) -> Result<Self> {
        Self::scan(dir, DIFF_PREFIX, DIFF_EXT)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    /// The first index a new capture may use without overwriting anything.
    /// 1 for an empty directory (frames are 1-indexed).
    pub fn next_free_index(&self) -> u32 {
        self.frames.last().map_or(1, |frame| frame.index + 1)
    }
}

fn parse_index(name: &str, prefix: &str, ext: &str) -> Option<u32> {
    let stem = name.strip_prefix(prefix)?;
    let digits = stem.strip_suffix(ext)?.strip_suffix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_are_zero_padded() {
        let dir = Path::new("static/frames");
        assert_eq!(frame_path(dir, 1), dir.join("frame0001.jpg"));
        assert_eq!(frame_path(dir, 12345), dir.join("frame12345.jpg"));
        assert_eq!(diff_path(dir, 7), dir.join("difference_0007.png"));
        assert_eq!(overlay_path(dir, 0), dir.join("overlay_0000.png"));
    }

    #[test]
    fn parse_index_rejects_non_template_names() {
        assert_eq!(parse_index("frame0001.jpg", FRAME_PREFIX, FRAME_EXT), Some(1));
        assert_eq!(parse_index("frame0001.jpg.tmp", FRAME_PREFIX, FRAME_EXT), None);
        assert_eq!(parse_index("framex001.jpg", FRAME_PREFIX, FRAME_EXT), None);
        assert_eq!(parse_index("preview.webm", FRAME_PREFIX, FRAME_EXT), None);
        assert_eq!(parse_index("frame.jpg", FRAME_PREFIX, FRAME_EXT), None);
    }

    #[test]
    fn scan_sorts_by_index_and_skips_strays() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frame0003.jpg", "frame0001.jpg", "frame0002.jpg", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let seq = FrameSequence::scan_frames(dir.path()).unwrap();
        let indices: Vec<u32> = seq.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(seq.next_free_index(), 4);
    }

    #[test]
    fn empty_directory_starts_at_one() {
        let dir = tempfile::tempdir().unwrap();
        let seq = FrameSequence::scan_frames(dir.path()).unwrap();
        assert!(seq.is_empty());
        assert_eq!(seq.next_free_index(), 1);
    }
}
