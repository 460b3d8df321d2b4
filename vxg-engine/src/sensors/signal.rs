//! Frame-level signal statistics shared by the physics sensors

/// Floor for dB conversion (-200 dB)
const DB_FLOOR_LINEAR: f64 = 1e-10;

/// Frame and hop lengths in samples for a duration in seconds
pub fn samples_for(seconds: f64, sample_rate: u32) -> usize {
    ((seconds * sample_rate as f64).round() as usize).max(1)
}

/// RMS of a slice (0.0 for empty input)
pub fn calculate_rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt()
}

/// Linear amplitude to dB, floored at -200 dB
pub fn linear_to_db(linear: f64) -> f64 {
    20.0 * linear.max(DB_FLOOR_LINEAR).log10()
}

/// Per-frame RMS in dB
///
/// Input shorter than one frame is treated as a single frame; empty input
/// has no frames.
pub fn frame_rms_db(samples: &[f32], frame_len: usize, hop: usize) -> Vec<f64> {
    let hop = hop.max(1);
    if samples.is_empty() {
        return Vec::new();
    }
    if samples.len() <= frame_len {
        return vec![linear_to_db(calculate_rms(samples))];
    }
    let n_frames = 1 + (samples.len() - frame_len) / hop;
    (0..n_frames)
        .map(|i| {
            let start = i * hop;
            linear_to_db(calculate_rms(&samples[start..start + frame_len]))
        })
        .collect()
}

/// Percentile with linear interpolation between closest ranks (`p` in 0..=100)
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Median filter over booleans with an odd window, window shrunk at the edges
pub fn median_filter(flags: &[bool], window: usize) -> Vec<bool> {
    let half = window / 2;
    (0..flags.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(flags.len());
            let votes = flags[lo..hi].iter().filter(|&&f| f).count();
            votes * 2 > hi - lo
        })
        .collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Population variance
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_of_sine() {
        let samples: Vec<f32> = (0..16000)
            .map(|i| (2.0 * std::f32::consts::PI * 100.0 * i as f32 / 16000.0).sin())
            .collect();
        assert!((calculate_rms(&samples) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-3);
    }

    #[test]
    fn test_silence_db_floor() {
        assert_eq!(linear_to_db(0.0), -200.0);
        assert!((linear_to_db(1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_frames_short_input() {
        assert!(frame_rms_db(&[], 10, 5).is_empty());
        assert_eq!(frame_rms_db(&[0.5; 3], 10, 5).len(), 1);
        assert_eq!(frame_rms_db(&[0.5; 30], 10, 5).len(), 5);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 50.0), Some(3.0));
        assert!((percentile(&values, 10.0).unwrap() - 1.4).abs() < 1e-12);
        assert_eq!(percentile(&[], 10.0), None);
    }

    #[test]
    fn test_median_filter_removes_blips() {
        let flags = [true, true, false, true, true, false, false, true, false, false];
        let filtered = median_filter(&flags, 5);
        assert!(filtered[2]);
        assert!(!filtered[7]);
    }
}
