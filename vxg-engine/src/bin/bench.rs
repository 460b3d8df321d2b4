//! vxg-bench - offline calibration and classifier training
//!
//! **Usage:**
//! ```bash
//! vxg-bench run corpus.toml [--codecs clean,landline] [--target-fpr 0.01] \
//!     [--export report.json] [--apply]
//! vxg-bench train corpus.toml --output model.json [--components 32]
//! ```
//!
//! The corpus manifest lists labeled WAV files; relative paths resolve
//! against the manifest's directory:
//!
//! ```toml
//! [[sample]]
//! path = "genuine/alice_01.wav"
//! label = "genuine"
//!
//! [[sample]]
//! path = "spoof/tts_01.wav"
//! label = "spoof"
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use vxg_common::config::{default_config_path, write_toml_config};
use vxg_engine::calibration::{BenchmarkHarness, CalibrationReport, Label, LabeledSample};
use vxg_engine::classifier::GmmConfig;
use vxg_engine::config::CONFIG_FILE_NAME;
use vxg_engine::wav::read_wav;
use vxg_engine::{
    ChannelSimulator, CodecProfile, DetectionPipeline, EngineConfig, FeatureExtractor, FeatureSet,
    GmmSpoofClassifier,
};

/// Calibration and training for the detection engine
#[derive(Parser, Debug)]
#[clap(name = "vxg-bench", version)]
#[clap(about = "Benchmark detection accuracy per codec and train the spoof classifier")]
struct Args {
    /// Config file (overrides VXG_CONFIG and the per-user config)
    #[clap(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute EER/AUC and recommended thresholds per codec
    Run {
        /// Corpus manifest (TOML)
        manifest: PathBuf,

        /// Comma-separated codec profiles
        #[clap(long, default_value = "clean,landline,mobile,voip")]
        codecs: String,

        /// Target false-positive rate for the recommended threshold
        #[clap(long, default_value = "0.01")]
        target_fpr: f64,

        /// Worker threads (defaults to available parallelism)
        #[clap(long)]
        workers: Option<usize>,

        /// Export the report to a JSON file
        #[clap(long, value_name = "FILE")]
        export: Option<PathBuf>,

        /// Write the clean-channel sensor thresholds back to the config file
        #[clap(long)]
        apply: bool,
    },

    /// Train the GMM spoof classifier on the corpus
    Train {
        manifest: PathBuf,

        /// Output model file (JSON)
        #[clap(long, value_name = "FILE")]
        output: PathBuf,

        /// Mixture components per class
        #[clap(long, default_value = "32")]
        components: usize,
    },
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(rename = "sample")]
    samples: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    path: PathBuf,
    label: Label,
}

fn load_corpus(manifest_path: &Path) -> Result<Vec<LabeledSample>> {
    let content = std::fs::read_to_string(manifest_path)
        .with_context(|| format!("Failed to read manifest {}", manifest_path.display()))?;
    let manifest: Manifest = toml::from_str(&content)
        .with_context(|| format!("Invalid manifest {}", manifest_path.display()))?;
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let mut corpus = Vec::with_capacity(manifest.samples.len());
    for entry in manifest.samples {
        let path = base.join(&entry.path);
        let waveform =
            read_wav(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        corpus.push(LabeledSample {
            id: entry.path.display().to_string(),
            label: entry.label,
            waveform,
        });
    }
    info!("Loaded {} samples from {}", corpus.len(), manifest_path.display());
    Ok(corpus)
}

fn parse_codecs(list: &str) -> Result<Vec<CodecProfile>> {
    let codecs = list
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<CodecProfile>())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if codecs.is_empty() {
        bail!("No codec profiles given");
    }
    Ok(codecs)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, source) = EngineConfig::load(args.config.as_deref())
        .context("Failed to load engine configuration")?;
    vxg_common::config::init_tracing(&config.logging)
        .context("Failed to initialize logging")?;

    match args.command {
        Command::Run {
            manifest,
            codecs,
            target_fpr,
            workers,
            export,
            apply,
        } => {
            let codecs = parse_codecs(&codecs)?;
            let corpus = load_corpus(&manifest)?;
            let pipeline = DetectionPipeline::from_config(&config)
                .context("Failed to initialize detection pipeline")?;
            let channel = ChannelSimulator::new(config.channel.clone())?;

            let mut harness = BenchmarkHarness::new(&pipeline, channel);
            if let Some(workers) = workers {
                harness = harness.with_workers(workers);
            }

            let start = Instant::now();
            let report = harness.run(&corpus, &codecs, target_fpr)?;
            info!("Benchmark finished in {:.1}s", start.elapsed().as_secs_f64());

            println!("{}", report.summary_table());

            if let Some(path) = export {
                report
                    .save(&path)
                    .with_context(|| format!("Failed to export report to {}", path.display()))?;
                println!("\nReport exported to: {}", path.display());
            }

            if apply {
                let target = args
                    .config
                    .clone()
                    .or_else(|| source.map(|s| s.path))
                    .or_else(|| default_config_path(CONFIG_FILE_NAME))
                    .context("No config file location available for --apply")?;
                apply_thresholds(&mut config, &report)?;
                write_toml_config(&config, &target)
                    .with_context(|| format!("Failed to write {}", target.display()))?;
                println!("Thresholds written to: {}", target.display());
            }
        }

        Command::Train {
            manifest,
            output,
            components,
        } => {
            let corpus = load_corpus(&manifest)?;
            let extractor = FeatureExtractor::new(config.features.clone())?;
            let feature_type = config.classifier.feature_type;

            let mut genuine = Vec::new();
            let mut spoof = Vec::new();
            for sample in &corpus {
                let features = extractor.extract_one(&sample.waveform, feature_type);
                if features.is_empty() {
                    warn!("{}: no frames, skipped", sample.id);
                    continue;
                }
                match sample.label {
                    Label::Genuine => genuine.push(features),
                    Label::Spoof => spoof.push(features),
                }
            }
            if genuine.is_empty() || spoof.is_empty() {
                bail!("Training needs samples of both classes");
            }

            let gmm = GmmConfig {
                n_components: components,
                ..GmmConfig::default()
            };
            let classifier = GmmSpoofClassifier::train_with(
                &FeatureSet::concat(&genuine)?,
                &FeatureSet::concat(&spoof)?,
                &gmm,
            )?;
            classifier.save(&output)?;
            println!("Model written to: {}", output.display());
        }
    }

    Ok(())
}

/// Copy the clean-channel sensor recommendations into the fusion thresholds
fn apply_thresholds(config: &mut EngineConfig, report: &CalibrationReport) -> Result<()> {
    let Some(metrics) = report
        .codec(CodecProfile::Clean)
        .or_else(|| report.codecs.first())
    else {
        bail!("Report has no codec results");
    };

    for rec in &metrics.sensor_thresholds {
        match config.fusion.thresholds.set(&rec.sensor, rec.threshold) {
            Ok(()) => info!(
                "{}: threshold {:.4} (FAR {:.3}, FRR {:.3})",
                rec.sensor, rec.threshold, rec.far, rec.frr
            ),
            Err(e) => warn!("Skipping {}: {}", rec.sensor, e),
        }
    }
    Ok(())
}
