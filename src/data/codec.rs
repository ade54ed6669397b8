// ============================================================
// Layer 4 — Segmented Clip File Format
// ============================================================
// A segmented set is a directory of `.clips` files, optionally
// gzip-compressed as `.clips.gz`. Every file is a little-endian
// stream:
//
//   magic   "CLPS"
//   version u32 (= 1)
//   count   u32
//   count × record:
//     label  u32
//     frames u32
//     height u32
//     width  u32
//     frames*height*width*3 bytes of RGB pixels (HWC per frame)
//
// Records are variable sized, so random access means streaming
// from the start of the file and skipping whole records.
//
// Reference: byteorder / flate2 crate documentation

use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::GzDecoder;
use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};

use crate::domain::clip::{ClipShape, VideoClip};

pub const MAGIC:   &[u8; 4] = b"CLPS";
pub const VERSION: u32      = 1;

/// Upper bound on a single record, guards against corrupt headers
/// asking for absurd allocations.
const MAX_RECORD_BYTES: usize = 1 << 31;

/// Returns true for file names the reader should pick up.
pub fn is_clip_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(".clips") || n.ends_with(".clips.gz"))
        .unwrap_or(false)
}

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

/// Open a clip file for streaming, transparently un-gzipping it.
pub fn open_clip_file(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open clip file '{}'", path.display()))?;
    let reader = BufReader::new(file);
    if is_gzip(path) {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Read and validate the file header, returning the record count.
pub fn read_header<R: Read>(r: &mut R) -> Result<usize> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).context("Truncated clip file header")?;
    if &magic != MAGIC {
        bail!("Not a clip file (bad magic {:?})", magic);
    }
    let version = r.read_u32::<LittleEndian>()?;
    if version != VERSION {
        bail!("Unsupported clip file version {version}");
    }
    Ok(r.read_u32::<LittleEndian>()? as usize)
}

fn read_record_header<R: Read>(r: &mut R) -> Result<(u32, ClipShape)> {
    let label  = r.read_u32::<LittleEndian>().context("Truncated record header")?;
    let frames = r.read_u32::<LittleEndian>()? as usize;
    let height = r.read_u32::<LittleEndian>()? as usize;
    let width  = r.read_u32::<LittleEndian>()? as usize;
    let shape  = ClipShape::new(frames, height, width);
    if frames == 0 || height == 0 || width == 0 {
        bail!("Record has an empty dimension: {frames}x{height}x{width}");
    }
    match shape.checked_pixel_len() {
        Some(len) if len <= MAX_RECORD_BYTES => Ok((label, shape)),
        _ => bail!(
            "Record of {frames}x{height}x{width} frames exceeds the {MAX_RECORD_BYTES} byte limit"
        ),
    }
}

/// Read the next record.
pub fn read_record<R: Read>(r: &mut R) -> Result<VideoClip> {
    let (label, shape) = read_record_header(r)?;
    let mut pixels = vec![0u8; shape.pixel_len()];
    r.read_exact(&mut pixels).context("Truncated record pixels")?;
    VideoClip::new(label, shape, pixels)
}

/// Advance past the next record without materialising its pixels.
pub fn skip_record<R: Read>(r: &mut R) -> Result<()> {
    let (_, shape) = read_record_header(r)?;
    let want   = shape.pixel_len() as u64;
    let copied = io::copy(&mut r.by_ref().take(want), &mut io::sink())?;
    if copied != want {
        bail!("Truncated record: expected {want} pixel bytes, got {copied}");
    }
    Ok(())
}

/// Writers for building clip files in tests.
#[cfg(test)]
pub mod writer {
    use super::*;
    use byteorder::WriteBytesExt;
    use flate2::{write::GzEncoder, Compression};
    use std::io::{BufWriter, Write};

    fn dim(n: usize) -> Result<u32> {
        u32::try_from(n).with_context(|| format!("{n} does not fit a u32 header field"))
    }

    /// Serialise clips into the segmented format.
    pub fn write_clips<W: Write>(w: &mut W, clips: &[VideoClip]) -> Result<()> {
        w.write_all(MAGIC)?;
        w.write_u32::<LittleEndian>(VERSION)?;
        w.write_u32::<LittleEndian>(dim(clips.len())?)?;
        for clip in clips {
            w.write_u32::<LittleEndian>(clip.label)?;
            w.write_u32::<LittleEndian>(dim(clip.shape.frames)?)?;
            w.write_u32::<LittleEndian>(dim(clip.shape.height)?)?;
            w.write_u32::<LittleEndian>(dim(clip.shape.width)?)?;
            w.write_all(&clip.pixels)?;
        }
        Ok(())
    }

    /// Write a clip file, gzip-compressing it when the path ends in `.gz`.
    pub fn write_clip_file(path: &Path, clips: &[VideoClip]) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Cannot create clip file '{}'", path.display()))?;
        let mut out = BufWriter::new(file);
        if is_gzip(path) {
            let mut gz = GzEncoder::new(out, Compression::default());
            write_clips(&mut gz, clips)?;
            gz.finish()?.flush()?;
        } else {
            write_clips(&mut out, clips)?;
            out.flush()?;
        }
        Ok(())
    }

    #[test]
    fn oversized_dimensions_do_not_fit_the_header() {
        assert_eq!(dim(7).unwrap(), 7);
        assert!(dim(u32::MAX as usize + 1).is_err());
    }
}

#[cfg(test)]
mod tests {
    use super::writer::{write_clip_file, write_clips};
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Cursor;

    fn clip(label: u32, frames: usize, fill: u8) -> VideoClip {
        let shape = ClipShape::new(frames, 3, 2);
        VideoClip::new(label, shape, vec![fill; shape.pixel_len()]).unwrap()
    }

    #[test]
    fn skip_then_read_lands_on_the_second_record() {
        let mut buf = Vec::new();
        write_clips(&mut buf, &[clip(1, 2, 10), clip(5, 4, 20)]).unwrap();

        let mut r = Cursor::new(buf);
        assert_eq!(read_header(&mut r).unwrap(), 2);
        skip_record(&mut r).unwrap();
        let second = read_record(&mut r).unwrap();
        assert_eq!(second.label, 5);
        assert_eq!(second.shape, ClipShape::new(4, 3, 2));
        assert!(second.pixels.iter().all(|&p| p == 20));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut r = Cursor::new(b"NOPE\x01\x00\x00\x00\x00\x00\x00\x00".to_vec());
        assert!(read_header(&mut r).is_err());
    }

    #[test]
    fn truncated_record_is_an_error() {
        let mut buf = Vec::new();
        write_clips(&mut buf, &[clip(0, 2, 1)]).unwrap();
        buf.truncate(buf.len() - 3);

        let mut r = Cursor::new(buf.clone());
        read_header(&mut r).unwrap();
        assert!(read_record(&mut r).is_err());

        let mut r = Cursor::new(buf);
        read_header(&mut r).unwrap();
        assert!(skip_record(&mut r).is_err());
    }

    #[test]
    fn overflowing_record_header_is_an_error() {
        let mut buf = Vec::new();
        for field in [9, u32::MAX, u32::MAX, u32::MAX] {
            buf.write_u32::<LittleEndian>(field).unwrap();
        }
        assert!(read_record(&mut Cursor::new(buf.clone())).is_err());
        assert!(skip_record(&mut Cursor::new(buf)).is_err());
    }

    #[test]
    fn oversized_record_is_refused_before_allocating() {
        let mut buf = Vec::new();
        for field in [0, 1 << 16, 1 << 10, 1 << 10] {
            buf.write_u32::<LittleEndian>(field).unwrap();
        }
        let err = read_record(&mut Cursor::new(buf)).unwrap_err();
        assert!(err.to_string().contains("byte limit"));
    }

    #[test]
    fn gzip_files_are_read_back_transparently() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("set.clips.gz");
        write_clip_file(&path, &[clip(3, 1, 7)]).unwrap();

        let mut r = open_clip_file(&path).unwrap();
        assert_eq!(read_header(&mut r).unwrap(), 1);
        assert_eq!(read_record(&mut r).unwrap().label, 3);
    }

    #[test]
    fn recognises_clip_file_names() {
        assert!(is_clip_file(Path::new("a/seg_01.clips")));
        assert!(is_clip_file(Path::new("seg_01.clips.gz")));
        assert!(!is_clip_file(Path::new("seg_01.tfr")));
        assert!(!is_clip_file(Path::new("notes.gz")));
    }
}
