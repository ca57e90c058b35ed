//! Test utilities for catalog, extractor and server tests
//!
//! Fixtures are synthesized on the fly so tests do not depend on audio files
//! checked into the repository.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};

/// 16-bit PCM spec with the given rate and channel count
pub fn pcm16_spec(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Write a WAV file of `seconds` length into `dir/name`
///
/// Integer sample values encode the frame index (modulo the sample range) so
/// tests can check which frames ended up in a segment. The second channel
/// carries the negated value.
pub fn write_test_wav(
    dir: &Path,
    name: &str,
    spec: WavSpec,
    seconds: f64,
) -> Result<PathBuf, hound::Error> {
    let path = dir.join(name);
    let frames = (seconds * spec.sample_rate as f64).round() as u32;

    let modulus = 1u32 << (spec.bits_per_sample.min(16) - 1);

    let mut writer = WavWriter::create(&path, spec)?;
    for frame in 0..frames {
        for channel in 0..spec.channels {
            match spec.sample_format {
                SampleFormat::Int => {
                    let value = ((frame % modulus) as i32) * if channel == 0 { 1 } else { -1 };
                    writer.write_sample(value)?;
                }
                SampleFormat::Float => {
                    writer.write_sample(frame as f32 / frames.max(1) as f32)?;
                }
            }
        }
    }
    writer.finalize()?;

    Ok(path)
}
