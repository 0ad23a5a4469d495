//! Absolute level metrics (dB re 20 µPa). Every metric in this family
//! needs a calibrated waveform; on uncalibrated input it degrades to NaN
//! upstream via `MetricError::CalibrationRequired`.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::{window_samples, MetricDescriptor, MetricError, MetricInput, RawOutput};
use crate::recording::leq_db;
use crate::settings::{ParamValue, Params, Statistic};
use crate::REF_PRESSURE;

/// Measurement floor in dB. Silent frames clamp here instead of -inf so
/// statistics over a series stay finite.
const LEVEL_FLOOR_DB: f64 = -120.0;

pub fn descriptors() -> Vec<MetricDescriptor> {
    vec![
        MetricDescriptor {
            family: "levels".into(),
            name: "Leq".into(),
            label: "Leq".into(),
            requires_calibration: true,
            default_statistics: vec![Statistic::Avg, Statistic::Max],
            default_params: window_param(0.125),
            func: leq,
        },
        MetricDescriptor {
            family: "levels".into(),
            name: "LAeq".into(),
            label: "LAeq".into(),
            requires_calibration: true,
            default_statistics: vec![
                Statistic::Percentile(5),
                Statistic::Percentile(10),
                Statistic::Percentile(50),
                Statistic::Percentile(90),
                Statistic::Percentile(95),
                Statistic::Avg,
                Statistic::Max,
                Statistic::Min,
            ],
            default_params: window_param(0.125),
            func: laeq,
        },
        MetricDescriptor {
            family: "levels".into(),
            name: "SEL".into(),
            label: "SEL".into(),
            requires_calibration: true,
            default_statistics: vec![Statistic::Avg],
            default_params: Params::new(),
            func: sel,
        },
        MetricDescriptor {
            family: "levels".into(),
            name: "Lpeak".into(),
            label: "Lpeak".into(),
            requires_calibration: true,
            default_statistics: vec![Statistic::Max],
            default_params: Params::new(),
            func: lpeak,
        },
    ]
}

fn window_param(secs: f64) -> Params {
    let mut params = Params::new();
    params.insert("window_secs".into(), ParamValue::Float(secs));
    params
}

fn require_calibration(input: &MetricInput) -> Result<(), MetricError> {
    if input.calibrated {
        Ok(())
    } else {
        Err(MetricError::CalibrationRequired)
    }
}

fn require_samples(input: &MetricInput) -> Result<(), MetricError> {
    if input.samples.is_empty() {
        Err(MetricError::Computation("empty waveform".to_string()))
    } else {
        Ok(())
    }
}

/// Windowed equivalent level series.
fn leq(input: &MetricInput, params: &Params) -> Result<RawOutput, MetricError> {
    require_calibration(input)?;
    require_samples(input)?;
    let window = window_samples(params, 0.125, input.sample_rate)?;

    let series = input
        .samples
        .chunks(window)
        .map(|frame| leq_db(frame).max(LEVEL_FLOOR_DB))
        .collect();
    Ok(RawOutput::Series(series))
}

/// A-weighted windowed level series. Each frame is Hann-windowed, its
/// power spectrum weighted by the IEC 61672 A-curve, then summed back to
/// a level.
fn laeq(input: &MetricInput, params: &Params) -> Result<RawOutput, MetricError> {
    require_calibration(input)?;
    require_samples(input)?;
    let window = window_samples(params, 0.125, input.sample_rate)?;

    let mut planner = FftPlanner::new();
    let mut series = Vec::new();

    for frame in input.samples.chunks(window) {
        let power = weighted_mean_square(frame, input.sample_rate, &mut planner, a_weight_db);
        let level = 10.0 * (power / (REF_PRESSURE * REF_PRESSURE)).log10();
        series.push(level.max(LEVEL_FLOOR_DB));
    }
    Ok(RawOutput::Series(series))
}

/// Sound exposure level: the whole recording's energy normalized to 1 s.
fn sel(input: &MetricInput, _params: &Params) -> Result<RawOutput, MetricError> {
    require_calibration(input)?;
    require_samples(input)?;
    let duration = input.samples.len() as f64 / input.sample_rate as f64;
    let level = leq_db(input.samples).max(LEVEL_FLOOR_DB) + 10.0 * duration.log10();
    Ok(RawOutput::Scalar(level))
}

/// Peak sound pressure level.
fn lpeak(input: &MetricInput, _params: &Params) -> Result<RawOutput, MetricError> {
    require_calibration(input)?;
    require_samples(input)?;
    let peak = input.samples.iter().fold(0.0f64, |m, s| m.max(s.abs()));
    let level = (20.0 * (peak / REF_PRESSURE).log10()).max(LEVEL_FLOOR_DB);
    Ok(RawOutput::Scalar(level))
}

/// Mean-square pressure of a frame after applying a dB-valued frequency
/// weighting to its Hann-windowed power spectrum.
pub(crate) fn weighted_mean_square(
    frame: &[f64],
    sample_rate: u32,
    planner: &mut FftPlanner<f64>,
    weight_db: fn(f64) -> f64,
) -> f64 {
    let n = frame.len();
    if n == 0 {
        return 0.0;
    }

    let fft = planner.plan_fft_forward(n);
    let mut buffer: Vec<Complex<f64>> = frame
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let w = hann(i, n);
            Complex::new(s * w, 0.0)
        })
        .collect();
    fft.process(&mut buffer);

    // One-sided spectrum; Hann mean-square of 0.375 compensated so the
    // unweighted sum matches the time-domain mean square (Parseval).
    let bin_hz = sample_rate as f64 / n as f64;
    let norm = 1.0 / (n as f64 * n as f64 * 0.375);
    let half = n / 2;

    let mut sum = 0.0;
    for (k, value) in buffer.iter().enumerate().take(half + 1) {
        let freq = k as f64 * bin_hz;
        let sided = if k == 0 || (n % 2 == 0 && k == half) {
            1.0
        } else {
            2.0
        };
        let power = value.norm_sqr() * norm * sided;
        sum += power * 10f64.powf(weight_db(freq) / 10.0);
    }
    sum
}

fn hann(i: usize, n: usize) -> f64 {
    if n == 1 {
        return 1.0;
    }
    let x = std::f64::consts::PI * i as f64 / (n - 1) as f64;
    x.sin() * x.sin()
}

/// IEC 61672 A-weighting in dB at frequency `f`.
pub(crate) fn a_weight_db(f: f64) -> f64 {
    if f <= 0.0 {
        return -120.0;
    }
    let f2 = f * f;
    let ra = (12194.0f64.powi(2) * f2 * f2)
        / ((f2 + 20.6f64.powi(2))
            * ((f2 + 107.7f64.powi(2)) * (f2 + 737.9f64.powi(2))).sqrt()
            * (f2 + 12194.0f64.powi(2)));
    20.0 * ra.log10() + 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, rate: u32, secs: f64, amp: f64) -> Vec<f64> {
        let n = (rate as f64 * secs) as usize;
        (0..n)
            .map(|i| amp * (2.0 * std::f64::consts::PI * freq * i as f64 / rate as f64).sin())
            .collect()
    }

    fn calibrated(samples: &[f64], rate: u32) -> MetricInput<'_> {
        MetricInput {
            samples,
            sample_rate: rate,
            calibrated: true,
        }
    }

    fn series(out: RawOutput) -> Vec<f64> {
        match out {
            RawOutput::Series(s) => s,
            other => panic!("expected series, got {other:?}"),
        }
    }

    fn scalar(out: RawOutput) -> f64 {
        match out {
            RawOutput::Scalar(v) => v,
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn test_leq_series_matches_overall_level() {
        let samples = sine(440.0, 8000, 1.0, 0.02);
        let overall = leq_db(&samples);
        let out = series(leq(&calibrated(&samples, 8000), &Params::new()).unwrap());

        assert_eq!(out.len(), 8); // 1s / 0.125s windows
        let avg = out.iter().sum::<f64>() / out.len() as f64;
        assert!((avg - overall).abs() < 0.5, "avg {avg} vs overall {overall}");
    }

    #[test]
    fn test_levels_require_calibration() {
        let samples = sine(440.0, 8000, 0.5, 0.02);
        let input = MetricInput {
            samples: &samples,
            sample_rate: 8000,
            calibrated: false,
        };
        for func in [leq, laeq, sel, lpeak] {
            assert!(matches!(
                func(&input, &Params::new()),
                Err(MetricError::CalibrationRequired)
            ));
        }
    }

    #[test]
    fn test_leq_monotone_with_level() {
        // A louder copy of the same waveform shape scores strictly higher.
        let quiet = sine(440.0, 8000, 0.5, 0.02);
        let loud: Vec<f64> = quiet.iter().map(|s| s * 10.0).collect();

        let q = series(leq(&calibrated(&quiet, 8000), &Params::new()).unwrap());
        let l = series(leq(&calibrated(&loud, 8000), &Params::new()).unwrap());
        for (a, b) in q.iter().zip(&l) {
            assert!((b - a - 20.0).abs() < 1e-6); // 10x amplitude = +20 dB
        }
    }

    #[test]
    fn test_laeq_near_leq_at_1khz() {
        // A-weighting is ~0 dB at 1 kHz
        let samples = sine(1000.0, 48_000, 0.25, 0.02);
        let unweighted = series(leq(&calibrated(&samples, 48_000), &Params::new()).unwrap());
        let weighted = series(laeq(&calibrated(&samples, 48_000), &Params::new()).unwrap());
        let diff = (weighted[0] - unweighted[0]).abs();
        assert!(diff < 1.5, "LAeq off by {diff} dB at 1 kHz");
    }

    #[test]
    fn test_laeq_attenuates_low_frequencies() {
        let low = sine(50.0, 48_000, 0.25, 0.02);
        let mid = sine(1000.0, 48_000, 0.25, 0.02);
        let low_a = series(laeq(&calibrated(&low, 48_000), &Params::new()).unwrap());
        let mid_a = series(laeq(&calibrated(&mid, 48_000), &Params::new()).unwrap());
        // A-curve is roughly -30 dB at 50 Hz
        assert!(mid_a[0] - low_a[0] > 20.0);
    }

    #[test]
    fn test_sel_integrates_duration() {
        let one_sec = sine(440.0, 8000, 1.0, 0.02);
        let four_sec = sine(440.0, 8000, 4.0, 0.02);
        let s1 = scalar(sel(&calibrated(&one_sec, 8000), &Params::new()).unwrap());
        let s4 = scalar(sel(&calibrated(&four_sec, 8000), &Params::new()).unwrap());
        // Same level, 4x duration: SEL rises by 10*log10(4) ~ 6 dB
        assert!((s4 - s1 - 6.02).abs() < 0.1);
    }

    #[test]
    fn test_lpeak() {
        let mut samples = vec![0.001; 1000];
        samples[500] = 0.2;
        let peak = scalar(lpeak(&calibrated(&samples, 8000), &Params::new()).unwrap());
        let expected = 20.0 * (0.2f64 / REF_PRESSURE).log10();
        assert!((peak - expected).abs() < 1e-9);
    }

    #[test]
    fn test_a_weight_reference_points() {
        assert!(a_weight_db(1000.0).abs() < 0.2);
        assert!(a_weight_db(100.0) < -15.0);
        assert!(a_weight_db(0.0) <= -120.0);
    }
}
