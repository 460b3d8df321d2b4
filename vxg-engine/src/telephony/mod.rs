//! Telephony channel simulation
//!
//! Emulates landline, mobile and VoIP transmission so training, benchmarking
//! and inference see the same channel degradations:
//! - band-pass filtering to the codec's transmission band
//! - 8-bit A-law / µ-law companding
//! - packet loss with concealment (VoIP only)
//!
//! `clean` is a pass-through and returns the input waveform unchanged.

pub mod companding;
pub mod filter;
pub mod packet_loss;

pub use companding::CompandingLaw;
pub use packet_loss::Concealment;

use crate::error::{EngineError, Result};
use crate::types::Waveform;
use filter::BandPass;
use packet_loss::PacketLossSimulator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Channel a call is assumed to have traveled through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecProfile {
    Landline,
    Mobile,
    Voip,
    Clean,
}

/// Transform parameters of a codec profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodecSpec {
    /// Transmission band in Hz
    pub band: (f64, f64),
    pub law: CompandingLaw,
    pub packet_loss: bool,
}

impl CodecProfile {
    pub const ALL: [CodecProfile; 4] = [
        CodecProfile::Landline,
        CodecProfile::Mobile,
        CodecProfile::Voip,
        CodecProfile::Clean,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CodecProfile::Landline => "landline",
            CodecProfile::Mobile => "mobile",
            CodecProfile::Voip => "voip",
            CodecProfile::Clean => "clean",
        }
    }

    /// Band-limited telephone channels select the narrowband weight profile
    pub fn is_narrowband(&self) -> bool {
        matches!(self, CodecProfile::Landline | CodecProfile::Mobile)
    }

    /// Channel transform, or `None` for the clean pass-through
    pub fn spec(&self) -> Option<CodecSpec> {
        match self {
            CodecProfile::Landline => Some(CodecSpec {
                band: (300.0, 3400.0),
                law: CompandingLaw::ALaw,
                packet_loss: false,
            }),
            CodecProfile::Mobile => Some(CodecSpec {
                band: (200.0, 3800.0),
                law: CompandingLaw::MuLaw,
                packet_loss: false,
            }),
            CodecProfile::Voip => Some(CodecSpec {
                band: (50.0, 7000.0),
                law: CompandingLaw::MuLaw,
                packet_loss: true,
            }),
            CodecProfile::Clean => None,
        }
    }
}

impl fmt::Display for CodecProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodecProfile {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "landline" => Ok(CodecProfile::Landline),
            "mobile" => Ok(CodecProfile::Mobile),
            "voip" => Ok(CodecProfile::Voip),
            "clean" => Ok(CodecProfile::Clean),
            _ => Err(EngineError::InvalidCodecProfile(s.to_string())),
        }
    }
}

/// Channel simulator settings (`[channel]` in the engine TOML)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Fraction of packets lost on packetized channels
    pub packet_loss_rate: f64,
    /// Packet duration in milliseconds
    pub packet_ms: u32,
    pub concealment: Concealment,
    /// Seed for the packet-loss RNG
    pub seed: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            packet_loss_rate: 0.02,
            packet_ms: 20,
            concealment: Concealment::RepeatPrevious,
            seed: 42,
        }
    }
}

/// Applies codec-profile degradations to waveforms
#[derive(Debug, Clone)]
pub struct ChannelSimulator {
    config: ChannelConfig,
}

impl ChannelSimulator {
    pub fn new(config: ChannelConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.packet_loss_rate) {
            return Err(EngineError::InvalidInput(format!(
                "packet_loss_rate must be within [0, 1], got {}",
                config.packet_loss_rate
            )));
        }
        if config.packet_ms == 0 {
            return Err(EngineError::InvalidInput(
                "packet_ms must be positive".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Apply a profile using the configured seed
    pub fn apply(&self, waveform: &Waveform, profile: CodecProfile) -> Waveform {
        self.apply_with_seed(waveform, profile, self.config.seed)
    }

    /// Apply a profile given by name
    ///
    /// Unknown names are an error; there is no silent default because the
    /// profile also selects the fusion weight set.
    pub fn apply_named(&self, waveform: &Waveform, profile: &str) -> Result<Waveform> {
        let profile = profile.parse::<CodecProfile>()?;
        Ok(self.apply(waveform, profile))
    }

    /// Apply a profile with an explicit packet-loss seed
    pub fn apply_with_seed(
        &self,
        waveform: &Waveform,
        profile: CodecProfile,
        seed: u64,
    ) -> Waveform {
        let Some(spec) = profile.spec() else {
            return waveform.clone();
        };
        if waveform.is_empty() {
            return waveform.clone();
        }

        let sample_rate = waveform.sample_rate();
        let band_pass = BandPass::new(spec.band.0, spec.band.1, sample_rate);
        let mut samples = band_pass.filtfilt(waveform.samples());
        clip(&mut samples);

        if spec.packet_loss && self.config.packet_loss_rate > 0.0 {
            let packet_len = (sample_rate as usize * self.config.packet_ms as usize) / 1000;
            let simulator = PacketLossSimulator::new(
                self.config.packet_loss_rate,
                packet_len,
                self.config.concealment,
            );
            let outcome = simulator.apply(&samples, seed);
            debug!(
                "{}: lost {}/{} packets",
                profile, outcome.packets_lost, outcome.packets_total
            );
            samples = outcome.samples;
        }

        let samples = spec.law.quantize(&samples);
        debug!(
            "Applied {} channel ({:.0}-{:.0} Hz, {:?}) to {} samples",
            profile,
            spec.band.0,
            spec.band.1,
            spec.law,
            samples.len()
        );
        Waveform::from_processed(samples, sample_rate)
    }
}

impl Default for ChannelSimulator {
    fn default() -> Self {
        Self {
            config: ChannelConfig::default(),
        }
    }
}

fn clip(samples: &mut [f32]) {
    for s in samples.iter_mut() {
        *s = s.clamp(-1.0, 1.0);
    }
}
