//! Packet-loss simulation for packetized (VoIP) channels

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// How a lost packet is filled in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Concealment {
    /// Repeat the previous packet (zeros for the first packet)
    #[default]
    RepeatPrevious,
    /// Replace with silence
    Zero,
}

/// Drops fixed-size packets at random and conceals the gaps
#[derive(Debug, Clone)]
pub struct PacketLossSimulator {
    loss_rate: f64,
    packet_len: usize,
    concealment: Concealment,
}

/// Outcome of one packet-loss pass
#[derive(Debug, Clone)]
pub struct PacketLossOutcome {
    pub samples: Vec<f32>,
    pub packets_total: usize,
    pub packets_lost: usize,
}

impl PacketLossSimulator {
    /// `packet_len` is in samples and is raised to at least one
    pub fn new(loss_rate: f64, packet_len: usize, concealment: Concealment) -> Self {
        Self {
            loss_rate: loss_rate.clamp(0.0, 1.0),
            packet_len: packet_len.max(1),
            concealment,
        }
    }

    /// Apply loss with a deterministic RNG seeded from `seed`
    pub fn apply(&self, samples: &[f32], seed: u64) -> PacketLossOutcome {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut output = samples.to_vec();
        let packets_total = samples.len().div_ceil(self.packet_len);
        let mut packets_lost = 0;

        for packet in 0..packets_total {
            if rng.gen::<f64>() >= self.loss_rate {
                continue;
            }
            packets_lost += 1;

            let start = packet * self.packet_len;
            let end = (start + self.packet_len).min(output.len());
            match self.concealment {
                Concealment::RepeatPrevious if packet > 0 => {
                    let prev_start = start - self.packet_len;
                    // Previous packet may itself be concealed already
                    for i in 0..(end - start) {
                        output[start + i] = output[prev_start + i];
                    }
                }
                _ => output[start..end].fill(0.0),
            }
        }

        PacketLossOutcome {
            samples: output,
            packets_total,
            packets_lost,
        }
    }
}
