//! vxg-engine - single-call voice authenticity analysis
//!
//! **Usage:**
//! ```bash
//! vxg-engine analyze call.wav [--codec landline] [--simulate] [--config vxg-engine.toml]
//! vxg-engine simulate input.wav output.wav --codec voip [--seed 7]
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use vxg_engine::telephony::ChannelSimulator;
use vxg_engine::wav::{read_wav, write_wav};
use vxg_engine::{CodecProfile, DetectionPipeline, EngineConfig};

/// Voice authenticity detection engine
#[derive(Parser, Debug)]
#[clap(name = "vxg-engine", version)]
#[clap(about = "Assess whether recorded call audio is genuine or synthetic")]
struct Args {
    /// Config file (overrides VXG_CONFIG and the per-user config)
    #[clap(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a WAV file and print the verdict as JSON
    Analyze {
        /// Input WAV file
        input: PathBuf,

        /// Channel the call came through (landline, mobile, voip, clean)
        #[clap(long, default_value = "clean")]
        codec: String,

        /// Degrade the input through the codec channel before analysis
        #[clap(long)]
        simulate: bool,

        /// Include individual sensor results in the output
        #[clap(long)]
        details: bool,
    },

    /// Write a channel-degraded copy of a WAV file
    Simulate {
        input: PathBuf,
        output: PathBuf,

        #[clap(long)]
        codec: String,

        /// Packet-loss seed (defaults to `[channel] seed`)
        #[clap(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (config, source) = EngineConfig::load(args.config.as_deref())
        .context("Failed to load engine configuration")?;
    vxg_common::config::init_tracing(&config.logging)
        .context("Failed to initialize logging")?;

    info!("Starting vxg-engine v{}", env!("CARGO_PKG_VERSION"));
    if let Some(source) = &source {
        info!("Configuration: {}", source.path.display());
    }

    match args.command {
        Command::Analyze {
            input,
            codec,
            simulate,
            details,
        } => {
            // Profile names are validated before any work is done
            let codec: CodecProfile = codec.parse()?;
            let pipeline = DetectionPipeline::from_config(&config)
                .context("Failed to initialize detection pipeline")?;

            let mut waveform = read_wav(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            if simulate {
                let channel = ChannelSimulator::new(config.channel.clone())?;
                waveform = channel.apply(&waveform, codec);
            }

            let analysis = pipeline.analyze_detailed(&waveform, Some(codec))?;
            info!(
                "{}: {} (score {:.3})",
                input.display(),
                analysis.verdict.verdict,
                analysis.verdict.global_risk_score
            );

            let output = if details {
                serde_json::json!({
                    "verdict": analysis.verdict,
                    "technical_evidence": analysis.verdict.technical_evidence(),
                    "sensor_results": analysis.sensor_results,
                    "classifier_score": analysis.classifier_score,
                })
            } else {
                serde_json::to_value(&analysis.verdict)?
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Simulate {
            input,
            output,
            codec,
            seed,
        } => {
            let codec: CodecProfile = codec.parse()?;
            let channel = ChannelSimulator::new(config.channel.clone())?;
            let waveform = read_wav(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let seed = seed.unwrap_or(config.channel.seed);
            let degraded = channel.apply_with_seed(&waveform, codec, seed);
            write_wav(&output, &degraded)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!(
                "Wrote {} ({} channel, {:.2}s)",
                output.display(),
                codec,
                degraded.duration_seconds()
            );
        }
    }

    Ok(())
}
