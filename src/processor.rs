use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::metrics::{MetricError, MetricInput, MetricRegistry, RawOutput};
use crate::recording::Recording;
use crate::results::{MetricResult, RunError};
use crate::settings::{AnalysisSettings, MetricSpec, Statistic};

/// Everything one recording produced: a flat result list (the orchestrator
/// indexes it into the table) plus per-metric failure annotations.
pub struct ProcessOutput {
    pub results: Vec<MetricResult>,
    pub failures: Vec<RunError>,
}

/// Compute every enabled metric for every channel of a recording.
///
/// A failing metric implementation never aborts the recording: its
/// statistics are recorded as NaN, a failure annotation is attached, and
/// the remaining metrics run normally. Panics inside an implementation
/// are caught and treated the same as a returned error.
pub fn process(
    recording: &Recording,
    settings: &AnalysisSettings,
    registry: &MetricRegistry,
) -> ProcessOutput {
    let calibrated = recording.calibration_level.is_some();
    let mut results = Vec::new();
    let mut failures = Vec::new();

    for channel in &recording.channels {
        for spec in settings.enabled_metrics() {
            let Some(descriptor) = registry.get(&spec.family, &spec.name) else {
                // Settings are validated before a run; an unknown metric
                // here means the caller skipped validation.
                push_nan_results(&mut results, recording, &channel.label, &spec.name, spec);
                failures.push(RunError {
                    recording_id: recording.id.clone(),
                    channel: Some(channel.label.clone()),
                    metric: Some(spec.name.clone()),
                    message: format!("unknown metric {}/{}", spec.family, spec.name),
                });
                continue;
            };

            let input = MetricInput {
                samples: &channel.samples,
                sample_rate: recording.sample_rate,
                calibrated,
            };

            let outcome = catch_unwind(AssertUnwindSafe(|| (descriptor.func)(&input, &spec.parameters)))
                .unwrap_or_else(|_| {
                    Err(MetricError::Computation(
                        "implementation panicked".to_string(),
                    ))
                });

            match outcome {
                Ok(raw) => {
                    for stat in &spec.statistics {
                        match reduce(&raw, *stat) {
                            Ok(value) => results.push(MetricResult {
                                recording_id: recording.id.clone(),
                                channel_label: channel.label.clone(),
                                metric_label: descriptor.label.clone(),
                                statistic: *stat,
                                value,
                            }),
                            Err(message) => {
                                results.push(MetricResult {
                                    recording_id: recording.id.clone(),
                                    channel_label: channel.label.clone(),
                                    metric_label: descriptor.label.clone(),
                                    statistic: *stat,
                                    value: f64::NAN,
                                });
                                failures.push(RunError {
                                    recording_id: recording.id.clone(),
                                    channel: Some(channel.label.clone()),
                                    metric: Some(descriptor.label.clone()),
                                    message,
                                });
                            }
                        }
                    }
                }
                Err(e) => {
                    log::debug!(
                        "{}/{} failed on {} [{}]: {}",
                        spec.family,
                        spec.name,
                        recording.id,
                        channel.label,
                        e
                    );
                    push_nan_results(
                        &mut results,
                        recording,
                        &channel.label,
                        &descriptor.label,
                        spec,
                    );
                    failures.push(RunError {
                        recording_id: recording.id.clone(),
                        channel: Some(channel.label.clone()),
                        metric: Some(descriptor.label.clone()),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    ProcessOutput { results, failures }
}

fn push_nan_results(
    results: &mut Vec<MetricResult>,
    recording: &Recording,
    channel_label: &str,
    metric_label: &str,
    spec: &MetricSpec,
) {
    for stat in &spec.statistics {
        results.push(MetricResult {
            recording_id: recording.id.clone(),
            channel_label: channel_label.to_string(),
            metric_label: metric_label.to_string(),
            statistic: *stat,
            value: f64::NAN,
        });
    }
}

/// Reduce a metric's raw output to one scalar for a requested statistic.
fn reduce(raw: &RawOutput, stat: Statistic) -> Result<f64, String> {
    match raw {
        // A scalar passes through every statistic unchanged.
        RawOutput::Scalar(v) => Ok(*v),
        RawOutput::Series(series) => {
            if series.is_empty() {
                return Err("metric produced an empty series".to_string());
            }
            Ok(match stat {
                Statistic::Avg => series.iter().sum::<f64>() / series.len() as f64,
                Statistic::Max => series.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v)),
                Statistic::Min => series.iter().fold(f64::INFINITY, |m, &v| m.min(v)),
                Statistic::Percentile(p) => percentile(series, p),
            })
        }
        RawOutput::Aggregated(map) => map
            .get(&stat.label())
            .copied()
            .ok_or_else(|| format!("statistic '{}' not in aggregated output", stat.label())),
    }
}

/// Linearly-interpolated percentile over an unsorted series.
fn percentile(series: &[f64], p: u8) -> f64 {
    let mut sorted = series.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = p as f64 / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let frac = rank - lo as f64;
    if lo + 1 < sorted.len() {
        sorted[lo] + frac * (sorted[lo + 1] - sorted[lo])
    } else {
        sorted[lo]
    }
}
