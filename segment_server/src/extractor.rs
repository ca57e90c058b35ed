//! Segment extraction: cut `[start, end)` seconds out of a catalog asset
//! into a self-contained WAV buffer.

use crate::catalog::AudioAsset;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;
use std::io::{self, Cursor};
use thiserror::Error;

/// Size of a canonical RIFF/WAVE header
const WAV_HEADER_BYTES: usize = 44;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Invalid range: start={start}s end={end}s")]
    InvalidRange { start: f64, end: f64 },

    #[error("Empty range after clamping: frames {start_frame}..{end_frame}")]
    EmptyRange { start_frame: u32, end_frame: u32 },

    #[error("Source ended early: expected {expected} samples, read {read}")]
    Truncated { expected: usize, read: usize },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// An independently playable WAV file holding exactly the requested frames
#[derive(Debug, Clone)]
pub struct SegmentPayload {
    pub data: Vec<u8>,
    pub start_frame: u32,
    pub end_frame: u32,
    pub spec: WavSpec,
}

impl SegmentPayload {
    pub fn frames(&self) -> u32 {
        self.end_frame - self.start_frame
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.spec.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Split the payload into wire chunks of at most `chunk_size` bytes
    pub fn chunks(&self, chunk_size: usize) -> std::slice::Chunks<'_, u8> {
        self.data.chunks(chunk_size.max(1))
    }
}

/// Convert a time range into a clamped frame range.
///
/// `start_frame = floor(start * rate)`, `end_frame = floor(end * rate)`, both
/// clamped to `[0, total_frames]`. Negative, non-finite or inverted input is
/// `InvalidRange`; a range that collapses after clamping is `EmptyRange`.
pub fn frame_range(
    asset: &AudioAsset,
    start_seconds: f64,
    end_seconds: f64,
) -> Result<(u32, u32), ExtractError> {
    let invalid = !start_seconds.is_finite()
        || !end_seconds.is_finite()
        || start_seconds < 0.0
        || end_seconds <= start_seconds;
    if invalid {
        return Err(ExtractError::InvalidRange {
            start: start_seconds,
            end: end_seconds,
        });
    }

    let rate = asset.sample_rate() as f64;
    let total = asset.total_frames as f64;
    let start_frame = (start_seconds * rate).floor().min(total) as u32;
    let end_frame = (end_seconds * rate).floor().min(total) as u32;

    if end_frame <= start_frame {
        return Err(ExtractError::EmptyRange {
            start_frame,
            end_frame,
        });
    }

    Ok((start_frame, end_frame))
}

/// Extract `[start_seconds, end_seconds)` of `asset`.
///
/// The source file is opened read-only. The payload reuses the source's
/// channel count, sample width, sample format and rate.
pub fn extract(
    asset: &AudioAsset,
    start_seconds: f64,
    end_seconds: f64,
) -> Result<SegmentPayload, ExtractError> {
    let (start_frame, end_frame) = frame_range(asset, start_seconds, end_seconds)?;

    let mut reader = WavReader::open(&asset.path)?;
    let spec = reader.spec();
    reader.seek(start_frame)?;

    let frames = (end_frame - start_frame) as usize;
    let expected = frames * spec.channels as usize;
    let bytes_per_sample = (spec.bits_per_sample as usize + 7) / 8;

    let mut buffer = Cursor::new(Vec::with_capacity(
        WAV_HEADER_BYTES + expected * bytes_per_sample,
    ));
    {
        let mut writer = WavWriter::new(&mut buffer, spec)?;
        let read = match spec.sample_format {
            SampleFormat::Int => copy_samples::<i32, _, _>(&mut reader, &mut writer, expected)?,
            SampleFormat::Float => copy_samples::<f32, _, _>(&mut reader, &mut writer, expected)?,
        };
        if read < expected {
            return Err(ExtractError::Truncated { expected, read });
        }
        writer.finalize()?;
    }

    let data = buffer.into_inner();
    debug!(
        "✂️  Extracted {} frames [{}, {}) from {} into {} bytes",
        frames,
        start_frame,
        end_frame,
        asset.name,
        data.len()
    );

    Ok(SegmentPayload {
        data,
        start_frame,
        end_frame,
        spec,
    })
}

fn copy_samples<S, R, W>(
    reader: &mut WavReader<R>,
    writer: &mut WavWriter<W>,
    count: usize,
) -> Result<usize, ExtractError>
where
    S: hound::Sample,
    R: io::Read,
    W: io::Write + io::Seek,
{
    let mut read = 0;
    for sample in reader.samples::<S>().take(count) {
        writer.write_sample(sample?)?;
        read += 1;
    }
    Ok(read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::test_utils::{pcm16_spec, write_test_wav};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn catalog_with(name: &str, spec: WavSpec, seconds: f64) -> (TempDir, Catalog) {
        let dir = tempdir().unwrap();
        write_test_wav(dir.path(), name, spec, seconds).unwrap();
        let catalog = Catalog::build(dir.path()).unwrap();
        (dir, catalog)
    }

    fn decode(payload: &SegmentPayload) -> (WavSpec, u32, Vec<i32>) {
        let mut reader = WavReader::new(Cursor::new(&payload.data)).unwrap();
        let spec = reader.spec();
        let duration = reader.duration();
        let samples = reader.samples::<i32>().map(|s| s.unwrap()).collect();
        (spec, duration, samples)
    }

    #[test]
    fn test_two_seconds_at_8khz() {
        let (_dir, catalog) = catalog_with("a.wav", pcm16_spec(8000, 1), 10.0);
        let asset = catalog.lookup("a.wav").unwrap();

        let payload = extract(asset, 2.0, 4.0).unwrap();
        assert_eq!(payload.start_frame, 16000);
        assert_eq!(payload.end_frame, 32000);
        assert_eq!(payload.frames(), 16000);
        assert!((payload.duration_seconds() - 2.0).abs() < f64::EPSILON);

        let (spec, duration, samples) = decode(&payload);
        assert_eq!(spec, asset.spec);
        assert_eq!(duration, 16000);
        // Fixture samples encode their frame index
        assert_eq!(samples[0], 16000);
        assert_eq!(samples[samples.len() - 1], 31999);
    }

    #[test]
    fn test_declared_duration_matches_request() {
        let (_dir, catalog) = catalog_with("tone.wav", pcm16_spec(11025, 1), 3.0);
        let asset = catalog.lookup("tone.wav").unwrap();
        let frame = 1.0 / asset.sample_rate() as f64;

        for (start, end) in [(0.0, 3.0), (0.1, 0.2), (1.234, 2.5), (2.9999, 3.0), (0.0, 0.001)] {
            let payload = extract(asset, start, end).unwrap();
            let (_, duration, _) = decode(&payload);
            let declared = duration as f64 / asset.sample_rate() as f64;
            assert!(
                (declared - (end - start)).abs() <= frame,
                "[{}, {}) declared {}s",
                start,
                end,
                declared
            );
        }
    }

    #[test]
    fn test_preserves_stereo_layout() {
        let (_dir, catalog) = catalog_with("stereo.wav", pcm16_spec(8000, 2), 1.0);
        let asset = catalog.lookup("stereo.wav").unwrap();

        let payload = extract(asset, 0.5, 0.75).unwrap();
        let (spec, duration, samples) = decode(&payload);
        assert_eq!(spec.channels, 2);
        assert_eq!(duration, 2000);
        assert_eq!(samples.len(), 4000);
        assert_eq!(&samples[..4], &[4000, -4000, 4001, -4001]);
    }

    #[test]
    fn test_float_source() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let (_dir, catalog) = catalog_with("float.wav", spec, 1.0);
        let asset = catalog.lookup("float.wav").unwrap();

        let payload = extract(asset, 0.25, 0.5).unwrap();
        let reader = WavReader::new(Cursor::new(&payload.data)).unwrap();
        assert_eq!(reader.spec(), spec);
        assert_eq!(reader.duration(), 2000);
    }

    #[test]
    fn test_end_is_clamped_to_asset_length() {
        let (_dir, catalog) = catalog_with("a.wav", pcm16_spec(8000, 1), 10.0);
        let asset = catalog.lookup("a.wav").unwrap();

        let payload = extract(asset, 9.0, 60.0).unwrap();
        assert_eq!(payload.start_frame, 72000);
        assert_eq!(payload.end_frame, 80000);
    }

    #[test]
    fn test_range_past_end_is_empty() {
        let (_dir, catalog) = catalog_with("a.wav", pcm16_spec(8000, 1), 10.0);
        let asset = catalog.lookup("a.wav").unwrap();

        assert!(matches!(
            extract(asset, 10.0, 12.0),
            Err(ExtractError::EmptyRange {
                start_frame: 80000,
                end_frame: 80000
            })
        ));
        // Sub-frame request collapses to nothing
        assert!(matches!(
            frame_range(asset, 1.0, 1.00001),
            Err(ExtractError::EmptyRange { .. })
        ));
    }

    #[test]
    fn test_invalid_ranges_are_rejected_before_io() {
        let (dir, catalog) = catalog_with("a.wav", pcm16_spec(8000, 1), 10.0);
        let asset = catalog.lookup("a.wav").unwrap().clone();
        // Remove the source: validation must fail without touching the file
        fs::remove_file(&asset.path).unwrap();

        for (start, end) in [
            (-1.0, 5.0),
            (4.0, 2.0),
            (3.0, 3.0),
            (f64::NAN, 1.0),
            (0.0, f64::INFINITY),
        ] {
            assert!(
                matches!(
                    extract(&asset, start, end),
                    Err(ExtractError::InvalidRange { .. })
                ),
                "[{}, {})",
                start,
                end
            );
        }
        drop(dir);
    }

    #[test]
    fn test_source_is_left_untouched() {
        let (_dir, catalog) = catalog_with("a.wav", pcm16_spec(8000, 1), 2.0);
        let asset = catalog.lookup("a.wav").unwrap();
        let before = fs::read(&asset.path).unwrap();

        extract(asset, 0.5, 1.5).unwrap();
        extract(asset, 0.0, 2.0).unwrap();

        assert_eq!(fs::read(&asset.path).unwrap(), before);
    }

    #[test]
    fn test_missing_source_is_io_failure() {
        let (_dir, catalog) = catalog_with("a.wav", pcm16_spec(8000, 1), 2.0);
        let asset = catalog.lookup("a.wav").unwrap();
        fs::remove_file(&asset.path).unwrap();

        assert!(matches!(
            extract(asset, 0.0, 1.0),
            Err(ExtractError::Wav(_)) | Err(ExtractError::Io(_))
        ));
    }

    #[test]
    fn test_chunks_cover_payload() {
        let (_dir, catalog) = catalog_with("a.wav", pcm16_spec(8000, 1), 1.0);
        let asset = catalog.lookup("a.wav").unwrap();
        let payload = extract(asset, 0.0, 0.1).unwrap();

        let chunks: Vec<&[u8]> = payload.chunks(300).collect();
        assert!(chunks.iter().all(|c| c.len() <= 300));
        assert_eq!(chunks.concat(), payload.data);
    }

    #[test]
    fn test_source_shortened_after_catalog_build() {
        let (dir, catalog) = catalog_with("a.wav", pcm16_spec(8000, 1), 2.0);
        let asset = catalog.lookup("a.wav").unwrap();

        // Replaced by a valid but shorter file
        write_test_wav(dir.path(), "a.wav", pcm16_spec(8000, 1), 0.5).unwrap();

        match extract(asset, 0.0, 1.5) {
            Err(ExtractError::Truncated { expected, read }) => {
                assert_eq!(expected, 12000);
                assert_eq!(read, 4000);
            }
            other => panic!("expected truncation, got {:?}", other.map(|p| p.frames())),
        }
    }

    #[test]
    fn test_source_removed_after_catalog_build() {
        let (dir, catalog) = catalog_with("a.wav", pcm16_spec(8000, 1), 2.0);
        let asset = catalog.lookup("a.wav").unwrap();
        fs::remove_file(dir.path().join("a.wav")).unwrap();

        assert!(matches!(
            extract(asset, 0.0, 1.0),
            Err(ExtractError::Wav(hound::Error::IoError(_)))
        ));
    }
}
