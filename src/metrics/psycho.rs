//! Psychoacoustic metrics. Loudness needs an absolute level; sharpness and
//! roughness are ratio-based and run fine on uncalibrated recordings.

use rustfft::FftPlanner;

use super::{param_f64, window_samples, MetricDescriptor, MetricError, MetricInput, RawOutput};
use crate::recording::leq_db;
use crate::settings::{ParamValue, Params, Statistic};

pub fn descriptors() -> Vec<MetricDescriptor> {
    vec![
        MetricDescriptor {
            family: "psychoacoustics".into(),
            name: "loudness".into(),
            label: "Loudness".into(),
            requires_calibration: true,
            default_statistics: vec![Statistic::Percentile(5), Statistic::Avg, Statistic::Max],
            default_params: window_param(0.125),
            func: loudness,
        },
        MetricDescriptor {
            family: "psychoacoustics".into(),
            name: "sharpness".into(),
            label: "Sharpness".into(),
            requires_calibration: false,
            default_statistics: vec![Statistic::Avg],
            default_params: window_param(0.125),
            func: sharpness,
        },
        MetricDescriptor {
            family: "psychoacoustics".into(),
            name: "roughness".into(),
            label: "Roughness".into(),
            requires_calibration: false,
            default_statistics: vec![Statistic::Avg],
            default_params: window_param(0.5),
            func: roughness,
        },
    ]
}

fn window_param(secs: f64) -> Params {
    let mut params = Params::new();
    params.insert("window_secs".into(), ParamValue::Float(secs));
    params
}

/// Windowed loudness series in sone, from the power-law mapping of each
/// frame's equivalent level (2^((L-40)/10), i.e. 40 dB ~ 1 sone).
fn loudness(input: &MetricInput, params: &Params) -> Result<RawOutput, MetricError> {
    if !input.calibrated {
        return Err(MetricError::CalibrationRequired);
    }
    if input.samples.is_empty() {
        return Err(MetricError::Computation("empty waveform".to_string()));
    }
    let window = window_samples(params, 0.125, input.sample_rate)?;

    let series = input
        .samples
        .chunks(window)
        .map(|frame| {
            let level = leq_db(frame);
            if level.is_finite() {
                2f64.powf((level - 40.0) / 10.0)
            } else {
                0.0
            }
        })
        .collect();
    Ok(RawOutput::Series(series))
}

/// Windowed sharpness series: the high-frequency-weighted spectral
/// centroid of each frame, in kHz. A ratio of spectral moments, so the
/// absolute playback level cancels out.
fn sharpness(input: &MetricInput, params: &Params) -> Result<RawOutput, MetricError> {
    if input.samples.is_empty() {
        return Err(MetricError::Computation("empty waveform".to_string()));
    }
    let window = window_samples(params, 0.125, input.sample_rate)?;
    let mut planner = FftPlanner::new();

    let mut series = Vec::new();
    for frame in input.samples.chunks(window) {
        series.push(frame_sharpness(frame, input.sample_rate, &mut planner));
    }
    Ok(RawOutput::Series(series))
}

fn frame_sharpness(frame: &[f64], sample_rate: u32, planner: &mut FftPlanner<f64>) -> f64 {
    use rustfft::num_complex::Complex;

    let n = frame.len();
    if n < 2 {
        return 0.0;
    }
    let fft = planner.plan_fft_forward(n);
    let mut buffer: Vec<Complex<f64>> =
        frame.iter().map(|&s| Complex::new(s, 0.0)).collect();
    fft.process(&mut buffer);

    let bin_hz = sample_rate as f64 / n as f64;
    let half = n / 2;

    let mut weighted = 0.0;
    let mut total = 0.0;
    for (k, value) in buffer.iter().enumerate().take(half + 1).skip(1) {
        let freq = k as f64 * bin_hz;
        let power = value.norm_sqr();
        let g = hf_emphasis(freq);
        weighted += power * g * freq;
        total += power * g;
    }

    if total <= 0.0 {
        0.0
    } else {
        weighted / total / 1000.0
    }
}

/// Emphasis curve rising above 3 kHz, flat below.
fn hf_emphasis(freq: f64) -> f64 {
    if freq <= 3000.0 {
        1.0
    } else {
        (0.2 * (freq / 1000.0 - 3.0)).exp()
    }
}

/// Windowed roughness series: normalized envelope fluctuation inside each
/// window, from the RMS of 2 ms sub-blocks. Steady tones score near zero,
/// amplitude-modulated content scores higher.
fn roughness(input: &MetricInput, params: &Params) -> Result<RawOutput, MetricError> {
    if input.samples.is_empty() {
        return Err(MetricError::Computation("empty waveform".to_string()));
    }
    let window = window_samples(params, 0.5, input.sample_rate)?;
    let sub = ((0.002 * input.sample_rate as f64).round() as usize).max(1);
    let smoothing = param_f64(params, "smoothing", 1.0)?;
    if smoothing <= 0.0 {
        return Err(MetricError::BadParameter {
            name: "smoothing".to_string(),
            message: format!("must be positive, got {smoothing}"),
        });
    }

    let mut series = Vec::new();
    for frame in input.samples.chunks(window) {
        let envelope: Vec<f64> = frame
            .chunks(sub)
            .map(|b| (b.iter().map(|s| s * s).sum::<f64>() / b.len() as f64).sqrt())
            .collect();
        series.push(envelope_fluctuation(&envelope) / smoothing);
    }
    Ok(RawOutput::Series(series))
}

fn envelope_fluctuation(envelope: &[f64]) -> f64 {
    if envelope.len() < 2 {
        return 0.0;
    }
    let mean = envelope.iter().sum::<f64>() / envelope.len() as f64;
    if mean <= 0.0 {
        return 0.0;
    }
    let delta: f64 = envelope.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    delta / (envelope.len() - 1) as f64 / mean
}
