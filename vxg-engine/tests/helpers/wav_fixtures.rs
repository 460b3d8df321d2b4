//! WAV Fixture Generation
//!
//! Writes mono 16-bit PCM files the same way call recordings arrive.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};

pub fn write_fixture(dir: &Path, name: &str, samples: &[f32], sample_rate: u32) -> PathBuf {
    let path = dir.join(name);
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(&path, spec).unwrap();
    for &s in samples {
        writer
            .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();
    path
}
