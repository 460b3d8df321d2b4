//! End-to-End Detection Tests
//!
//! Full `analyze_call` runs over synthetic calls with default configuration.
//!
//! **Coverage:**
//! - Pure tone: no vocal tract structure, frozen phase, forced SYNTHETIC by the veto
//! - 20 s continuous phonation: biologically impossible breath pattern
//! - Empty waveform: every sensor returns a defined result, no NaN
//! - Spliced digital silence
//! - WAV file input through the channel simulator

mod helpers;

use helpers::signals::{waveform, SR};
use helpers::{sine, spliced_with_digital_silence, vowel, with_fades, write_fixture};
use vxg_engine::fusion::VetoTier;
use vxg_engine::wav::read_wav;
use vxg_engine::{
    ChannelSimulator, CodecProfile, DetectionPipeline, EngineConfig, FailureCode, PassState,
    Verdict,
};

fn pipeline() -> DetectionPipeline {
    DetectionPipeline::from_config(&EngineConfig::default()).unwrap()
}

#[test]
fn test_pure_tone_is_synthetic() {
    let w = waveform(sine(440.0, 2.0, SR, 0.5), SR);
    let analysis = pipeline()
        .analyze_detailed(&w, Some(CodecProfile::Clean))
        .unwrap();

    let formant = analysis.sensor_results.get("formant").unwrap();
    assert_eq!(formant.passed, PassState::Fail);
    assert_eq!(formant.reason, Some(FailureCode::FormantImplausible));

    // A steady tone's instantaneous frequency never moves
    let phase = analysis.sensor_results.get("phase_coherence").unwrap();
    assert_eq!(phase.passed, PassState::Fail);
    assert_eq!(phase.reason, Some(FailureCode::VocoderArtifact));

    let verdict = analysis.verdict;
    assert_eq!(verdict.verdict, Verdict::Synthetic);
    assert_eq!(verdict.veto.unwrap().tier, VetoTier::HighConfidence);
}

#[test]
fn test_continuous_phonation_is_biologically_impossible() {
    let samples = with_fades(vowel(20.0, 120.0, [700.0, 1200.0], SR), 0.2, SR);
    let w = waveform(samples, SR);
    let analysis = pipeline().analyze_detailed(&w, None).unwrap();

    let breath = analysis.sensor_results.get("breath").unwrap();
    assert_eq!(breath.passed, PassState::Fail);
    assert_eq!(breath.reason, Some(FailureCode::BiologicallyImpossible));
    assert!(breath.value > 14.0);

    assert_eq!(analysis.verdict.verdict, Verdict::Synthetic);
}

#[test]
fn test_empty_waveform_defined_results() {
    let pipeline = pipeline();
    let w = waveform(Vec::new(), SR);
    let analysis = pipeline.analyze_detailed(&w, None).unwrap();

    assert_eq!(analysis.sensor_results.len(), pipeline.registry().len());
    for result in &analysis.sensor_results {
        assert_eq!(result.value, 0.0, "{}", result.sensor_name);
        assert!(result.threshold.is_finite(), "{}", result.sensor_name);
        assert_ne!(result.passed, PassState::Pass, "{}", result.sensor_name);
    }

    let verdict = analysis.verdict;
    assert!(!verdict.global_risk_score.is_nan());
    assert!((0.0..=1.0).contains(&verdict.global_risk_score));
    assert!(!verdict.confidence.is_nan());
}

#[test]
fn test_spliced_digital_silence_flagged() {
    let w = waveform(spliced_with_digital_silence(SR), SR);
    let analysis = pipeline().analyze_detailed(&w, None).unwrap();

    let silence = analysis.sensor_results.get("digital_silence").unwrap();
    assert_eq!(silence.passed, PassState::Fail);
    assert_eq!(silence.reason, Some(FailureCode::DigitalSilenceArtifact));
    assert_eq!(analysis.verdict.verdict, Verdict::Synthetic);
}

#[test]
fn test_every_result_has_numeric_trace() {
    let w = waveform(with_fades(vowel(3.0, 150.0, [650.0, 1100.0], SR), 0.2, SR), SR);
    let analysis = pipeline().analyze_detailed(&w, None).unwrap();
    for result in &analysis.sensor_results {
        assert!(result.value.is_finite(), "{}", result.sensor_name);
        assert!(result.threshold.is_finite(), "{}", result.sensor_name);
        assert_eq!(
            result.reason.is_some(),
            result.passed == PassState::Fail,
            "{}",
            result.sensor_name
        );
    }
}

#[test]
fn test_wav_through_landline_channel() {
    let dir = tempfile::tempdir().unwrap();
    let samples = with_fades(vowel(2.0, 130.0, [700.0, 1200.0], SR), 0.2, SR);
    let path = write_fixture(dir.path(), "call.wav", &samples, SR);

    let w = read_wav(&path).unwrap();
    assert_eq!(w.sample_rate(), SR);
    let degraded = ChannelSimulator::default().apply(&w, CodecProfile::Landline);
    let verdict = pipeline()
        .analyze_call(&degraded, Some(CodecProfile::Landline))
        .unwrap();

    assert_eq!(verdict.codec, CodecProfile::Landline);
    assert!(verdict.excluded.iter().any(|name| name == "bandwidth"));
    assert!(verdict
        .contributing_factors
        .iter()
        .all(|f| f.sensor_name != "bandwidth"));
}
