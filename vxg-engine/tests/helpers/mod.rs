//! Test helpers for vxg-engine integration tests
//!
//! - signals: deterministic synthetic call audio
//! - wav_fixtures: write signals to WAV files in temp directories

#![allow(dead_code)]

pub mod signals;
pub mod wav_fixtures;

pub use signals::{hard_gated, sine, spliced_with_digital_silence, vowel, with_fades};
pub use wav_fixtures::write_fixture;
