// ============================================================
// Layer 4 — Clip Reader
// ============================================================
// Samples random labelled clips from a segmented set directory.
//
// On open the reader scans every .clips / .clips.gz file once to
// learn how many records it holds. A draw then:
//
//   1. picks a record uniformly over the whole set
//   2. streams its file up to that record (skipping the rest)
//   3. checks the frame size against the configured ClipShape
//   4. cuts a random window of `frames` consecutive frames
//      when the stored clip is longer than that
//
// Reference: Rust Book §9 (Error Handling), rand crate docs

use anyhow::{bail, Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::codec::{is_clip_file, open_clip_file, read_header, read_record, skip_record};
use crate::domain::clip::{ClipShape, VideoClip};
use crate::domain::traits::ExampleSource;

#[derive(Debug, Clone)]
struct IndexedFile {
    path:    PathBuf,
    records: usize,
}

/// Random-access reader over one segmented set.
pub struct ClipReader {
    files: Vec<IndexedFile>,
    total: usize,
    shape: ClipShape,
    rng:   StdRng,
}

impl ClipReader {
    /// Index every clip file under `dir`.
    ///
    /// `seed` makes the sampling sequence reproducible; `None` seeds
    /// from the OS.
    pub fn open(dir: impl AsRef<Path>, shape: ClipShape, seed: Option<u64>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
            .with_context(|| format!("Cannot read dataset directory '{}'", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_clip_file(p))
            .collect();
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let mut r   = open_clip_file(&path)?;
            let records = read_header(&mut r)
                .with_context(|| format!("Bad clip file '{}'", path.display()))?;
            if records == 0 {
                tracing::warn!("Skipping empty clip file '{}'", path.display());
                continue;
            }
            files.push(IndexedFile { path, records });
        }

        let total: usize = files.iter().map(|f| f.records).sum();
        if total == 0 {
            bail!("No clips found in '{}'", dir.display());
        }
        tracing::info!(
            "Indexed {} clips in {} files under '{}'",
            total,
            files.len(),
            dir.display()
        );

        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None    => StdRng::from_entropy(),
        };
        Ok(Self { files, total, shape, rng })
    }

    /// Read the `index`-th clip of the set, counting across files in path order.
    pub fn read_at(&self, index: usize) -> Result<VideoClip> {
        let mut remaining = index;
        for file in &self.files {
            if remaining < file.records {
                let mut r = open_clip_file(&file.path)?;
                read_header(&mut r)?;
                for _ in 0..remaining {
                    skip_record(&mut r)?;
                }
                return read_record(&mut r)
                    .with_context(|| format!("Bad record {} in '{}'", remaining, file.path.display()));
            }
            remaining -= file.records;
        }
        bail!("Clip index {index} out of range ({} clips)", self.total)
    }

    /// Validate a stored clip against the configured shape and cut it to length.
    fn fit(&mut self, clip: VideoClip) -> Result<VideoClip> {
        let want = self.shape;
        let got  = clip.shape;
        if got.height != want.height || got.width != want.width {
            bail!(
                "Clip frames are {}x{}, network expects {}x{}",
                got.height, got.width, want.height, want.width
            );
        }
        if got.frames < want.frames {
            bail!("Clip has {} frames, network expects {}", got.frames, want.frames);
        }
        if got.frames == want.frames {
            return Ok(clip);
        }
        let start = self.rng.gen_range(0..=got.frames - want.frames);
        clip.window(start, want.frames)
    }
}

impl ExampleSource for ClipReader {
    fn random_example(&mut self) -> Result<VideoClip> {
        let index = self.rng.gen_range(0..self.total);
        let clip  = self.read_at(index)?;
        self.fit(clip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::codec::writer::write_clip_file;

    fn clip(label: u32, frames: usize) -> VideoClip {
        let shape  = ClipShape::new(frames, 4, 4);
        let pixels = (0..shape.pixel_len()).map(|i| (i / shape.frame_len()) as u8).collect();
        VideoClip::new(label, shape, pixels).unwrap()
    }

    #[test]
    fn indexes_records_across_files() {
        let dir = tempfile::tempdir().unwrap();
        write_clip_file(&dir.path().join("a.clips"), &[clip(0, 2), clip(1, 2)]).unwrap();
        write_clip_file(&dir.path().join("b.clips.gz"), &[clip(2, 2)]).unwrap();
        fs::write(dir.path().join("README.txt"), "not a clip file").unwrap();

        let reader = ClipReader::open(dir.path(), ClipShape::new(2, 4, 4), Some(1)).unwrap();
        assert_eq!(reader.total, 3);
        assert_eq!(reader.read_at(0).unwrap().label, 0);
        assert_eq!(reader.read_at(1).unwrap().label, 1);
        assert_eq!(reader.read_at(2).unwrap().label, 2);
        assert!(reader.read_at(3).is_err());
    }

    #[test]
    fn random_examples_come_from_the_set() {
        let dir = tempfile::tempdir().unwrap();
        write_clip_file(&dir.path().join("a.clips"), &[clip(3, 2), clip(5, 2)]).unwrap();

        let mut reader = ClipReader::open(dir.path(), ClipShape::new(2, 4, 4), Some(7)).unwrap();
        for _ in 0..20 {
            let ex = reader.random_example().unwrap();
            assert!(ex.label == 3 || ex.label == 5);
            assert_eq!(ex.shape.frames, 2);
        }
    }

    #[test]
    fn long_clips_are_cut_to_a_window() {
        let dir = tempfile::tempdir().unwrap();
        write_clip_file(&dir.path().join("a.clips"), &[clip(1, 6)]).unwrap();

        let mut reader = ClipReader::open(dir.path(), ClipShape::new(3, 4, 4), Some(3)).unwrap();
        let ex    = reader.random_example().unwrap();
        let first = ex.pixels[0];
        assert_eq!(ex.shape.frames, 3);
        assert!(first <= 3);
        assert_eq!(*ex.pixels.last().unwrap(), first + 2);
    }

    #[test]
    fn mismatched_frame_size_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_clip_file(&dir.path().join("a.clips"), &[clip(1, 2)]).unwrap();

        let mut reader = ClipReader::open(dir.path(), ClipShape::new(2, 8, 8), None).unwrap();
        assert!(reader.random_example().is_err());
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ClipReader::open(dir.path(), ClipShape::new(2, 4, 4), None).is_err());
    }
}
