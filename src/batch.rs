use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

use crate::calibration::{CalibrationMap, ResolvedTargets};
use crate::metrics::MetricRegistry;
use crate::processor;
use crate::recording::Recording;
use crate::results::{ExportError, ResultTable, RunError};
use crate::settings::{AnalysisSettings, SettingsError};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("No recordings discovered in {0}")]
    NoRecordings(PathBuf),
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("Worker pool creation failed: {0}")]
    Pool(String),
}

/// Knobs for one batch run.
#[derive(Clone)]
pub struct BatchOptions {
    /// Number of parallel workers. 0 = auto-detect, 1 = fully serial.
    pub jobs: usize,
    /// Fail before dispatch if the directory yields no recordings.
    pub strict: bool,
    /// File extensions to discover.
    pub extensions: Vec<String>,
    /// Show a progress bar.
    pub progress: bool,
    /// Cooperative cancellation flag, checked before each unit starts.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            jobs: 0,
            strict: false,
            extensions: crate::SUPPORTED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            progress: false,
            cancel: None,
        }
    }
}

/// One discovered recording, in canonical (path-sorted) order.
#[derive(Debug, Clone)]
pub struct DiscoveredRecording {
    pub id: String,
    pub path: PathBuf,
}

/// The terminal state of a run: the merged table plus every error
/// annotation collected along the way. Callers distinguish "fully
/// successful" from "degraded but completed" by inspecting `errors`.
#[derive(Debug)]
pub struct RunReport {
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub table: ResultTable,
    pub errors: Vec<RunError>,
    pub processed: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl RunReport {
    pub fn write_json_file(&self, path: &Path) -> Result<(), ExportError> {
        let value = serde_json::json!({
            "started": self.started.to_rfc3339(),
            "finished": self.finished.to_rfc3339(),
            "processed": self.processed,
            "failed": self.failed,
            "cancelled": self.cancelled,
            "columns": self.table.column_names(),
            "rows": self.table.to_json_value(),
            "errors": serde_json::to_value(&self.errors)?,
        });
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
        Ok(())
    }
}

/// Enumerate audio files under a directory in canonical order:
/// lexicographic full-path sort, fixed regardless of execution mode.
/// Recording ids are file stems; on a stem collision the id falls back
/// to the directory-relative path.
pub fn discover(
    dir: &Path,
    extensions: &[String],
) -> Result<Vec<DiscoveredRecording>, BatchError> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if extensions.iter().any(|e| e == &ext) {
            paths.push(entry.path().to_path_buf());
        }
    }
    paths.sort();

    let mut stem_counts: HashMap<String, usize> = HashMap::new();
    for path in &paths {
        *stem_counts.entry(stem_of(path)).or_insert(0) += 1;
    }

    let recordings = paths
        .into_iter()
        .map(|path| {
            let stem = stem_of(&path);
            let id = if stem_counts[&stem] > 1 {
                path.strip_prefix(dir)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .to_string()
            } else {
                stem
            };
            DiscoveredRecording { id, path }
        })
        .collect();

    Ok(recordings)
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("recording")
        .to_string()
}

/// Analyze every recording in a directory.
pub fn run(
    dir: &Path,
    settings: &AnalysisSettings,
    calibration: &CalibrationMap,
    registry: &MetricRegistry,
    options: &BatchOptions,
) -> Result<RunReport, BatchError> {
    // Fail fast on configuration problems, before any file is touched.
    settings.validate(registry)?;

    if !dir.is_dir() {
        return Err(BatchError::NotADirectory(dir.to_path_buf()));
    }

    let units = discover(dir, &options.extensions)?;
    if units.is_empty() {
        if options.strict {
            return Err(BatchError::NoRecordings(dir.to_path_buf()));
        }
        log::warn!("No recordings discovered in {}", dir.display());
    }

    run_units(units, settings, calibration, registry, options)
}

/// Analyze a single recording file through the same pipeline.
pub fn run_single(
    path: &Path,
    settings: &AnalysisSettings,
    calibration: &CalibrationMap,
    registry: &MetricRegistry,
    options: &BatchOptions,
) -> Result<RunReport, BatchError> {
    settings.validate(registry)?;
    let unit = DiscoveredRecording {
        id: stem_of(path),
        path: path.to_path_buf(),
    };
    run_units(vec![unit], settings, calibration, registry, options)
}

/// Everything one unit of work produced, tagged with its canonical index
/// so out-of-order parallel completions re-sort before the merge.
struct RecordingOutcome {
    index: usize,
    id: String,
    channels: Vec<String>,
    results: Vec<crate::results::MetricResult>,
    errors: Vec<RunError>,
    failed: bool,
}

fn run_units(
    units: Vec<DiscoveredRecording>,
    settings: &AnalysisSettings,
    calibration: &CalibrationMap,
    registry: &MetricRegistry,
    options: &BatchOptions,
) -> Result<RunReport, BatchError> {
    let started = Utc::now();
    let jobs = resolve_jobs(options.jobs);
    let cancel = options.cancel.clone();
    let cancel_requested = || {
        cancel
            .as_ref()
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(false)
    };

    log::info!("Analyzing {} recordings with {} workers", units.len(), jobs);

    let pb = if options.progress {
        let pb = ProgressBar::new(units.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .unwrap()
            .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut outcomes: Vec<RecordingOutcome> = Vec::with_capacity(units.len());
    let mut cancelled = false;

    if jobs <= 1 {
        // Serial: units execute in canonical order on the calling thread.
        for (index, unit) in units.iter().enumerate() {
            if cancel_requested() {
                cancelled = true;
                break;
            }
            outcomes.push(process_unit(unit, index, settings, calibration, registry));
            pb.inc(1);
        }
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| BatchError::Pool(e.to_string()))?;

        // Chunked dispatch: each chunk is analyzed in parallel, results
        // land in memory, then the next chunk starts. Keeps memory
        // bounded and gives the cancel flag a between-chunks checkpoint.
        let indexed: Vec<(usize, &DiscoveredRecording)> = units.iter().enumerate().collect();
        let chunk_size = jobs * 2;

        for chunk in indexed.chunks(chunk_size) {
            if cancel_requested() {
                cancelled = true;
                break;
            }
            let chunk_outcomes: Vec<RecordingOutcome> = pool.install(|| {
                use rayon::prelude::*;
                chunk
                    .par_iter()
                    .filter_map(|&(index, unit)| {
                        // Undispatched units honor cancellation; units
                        // already past this point run to completion.
                        if cancel_requested() {
                            return None;
                        }
                        let outcome =
                            process_unit(unit, index, settings, calibration, registry);
                        pb.inc(1);
                        Some(outcome)
                    })
                    .collect()
            });
            if chunk_outcomes.len() < chunk.len() {
                cancelled = true;
            }
            outcomes.extend(chunk_outcomes);
        }
    }

    // Merge: re-sort into canonical order so serial and parallel runs
    // produce identical tables.
    outcomes.sort_by_key(|o| o.index);

    let mut table = ResultTable::new(ResultTable::columns_for(settings, registry));
    let mut errors = Vec::new();
    let mut processed = 0;
    let mut failed = 0;

    for outcome in outcomes {
        if outcome.failed {
            table.push_failed_row(&outcome.id, "-");
            failed += 1;
        } else {
            for label in &outcome.channels {
                table.push_from_results(&outcome.id, label, &outcome.results);
            }
            processed += 1;
        }
        errors.extend(outcome.errors);
    }

    pb.finish_and_clear();
    let finished = Utc::now();
    log::info!(
        "Run complete: {} processed, {} failed, {} annotations{}",
        processed,
        failed,
        errors.len(),
        if cancelled { " (cancelled)" } else { "" }
    );

    Ok(RunReport {
        started,
        finished,
        table,
        errors,
        processed,
        failed,
        cancelled,
    })
}

fn resolve_jobs(jobs: usize) -> usize {
    if jobs > 0 {
        jobs
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2)
    }
}

/// One unit of work: load, resolve calibration, rescale, resample, process.
fn process_unit(
    unit: &DiscoveredRecording,
    index: usize,
    settings: &AnalysisSettings,
    calibration: &CalibrationMap,
    registry: &MetricRegistry,
) -> RecordingOutcome {
    let failed = |message: String| RecordingOutcome {
        index,
        id: unit.id.clone(),
        channels: Vec::new(),
        results: Vec::new(),
        errors: vec![RunError {
            recording_id: unit.id.clone(),
            channel: None,
            metric: None,
            message,
        }],
        failed: true,
    };

    let recording = match Recording::load(&unit.path) {
        Ok(r) => r,
        Err(e) => return failed(e.to_string()),
    };

    let labels = recording.channel_labels();
    let mut errors = Vec::new();

    let recording = match calibration.resolve_all(&unit.id, &labels) {
        ResolvedTargets::Full(targets) => match recording.rescale_channels(&targets) {
            Ok(r) => r,
            // Hard calibration error: the gain is undefined, fail the recording.
            Err(e) => return failed(e.to_string()),
        },
        ResolvedTargets::Partial => {
            errors.push(RunError {
                recording_id: unit.id.clone(),
                channel: None,
                metric: None,
                message: "calibration entry does not cover every channel; processed uncalibrated"
                    .to_string(),
            });
            recording
        }
        ResolvedTargets::Missing => recording,
    };

    let recording = match settings.resample_to {
        Some(rate) => match recording.resample(rate) {
            Ok(r) => r,
            // Soft: process at native rate rather than dropping the recording.
            Err(e) => {
                errors.push(RunError {
                    recording_id: unit.id.clone(),
                    channel: None,
                    metric: None,
                    message: format!("resample to {rate} Hz failed ({e}); using native rate"),
                });
                recording
            }
        },
        None => recording,
    };

    let output = processor::process(&recording, settings, registry);
    errors.extend(output.failures);

    RecordingOutcome {
        index,
        id: unit.id.clone(),
        channels: labels,
        results: output.results,
        errors,
        failed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::registry;
    use crate::settings::{MetricSpec, Params, Statistic};

    /// Deterministic pseudo-random generator for fixture variety.
    struct Lcg(u64);

    impl Lcg {
        fn next_u32(&mut self) -> u32 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 33) as u32
        }

        fn range(&mut self, lo: u32, hi: u32) -> u32 {
            lo + self.next_u32() % (hi - lo + 1)
        }

        fn unit_f64(&mut self) -> f64 {
            self.next_u32() as f64 / u32::MAX as f64
        }
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("acoustat_batch_{}_{}", std::process::id(), tag));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_wav(dir: &Path, name: &str, rate: u32, channels: &[Vec<f64>]) {
        let spec = hound::WavSpec {
            channels: channels.len() as u16,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(dir.join(name), spec).unwrap();
        let frames = channels[0].len();
        for i in 0..frames {
            for ch in channels {
                let s = (ch[i].clamp(-1.0, 1.0) * i16::MAX as f64) as i16;
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    fn sine(freq: f64, rate: u32, secs: f64, amp: f64) -> Vec<f64> {
        let n = (rate as f64 * secs) as usize;
        (0..n)
            .map(|i| amp * (2.0 * std::f64::consts::PI * freq * i as f64 / rate as f64).sin())
            .collect()
    }

    fn spec(family: &str, name: &str, stats: Vec<Statistic>) -> MetricSpec {
        MetricSpec {
            family: family.into(),
            name: name.into(),
            enabled: true,
            parameters: Params::new(),
            statistics: stats,
        }
    }

    fn leq_and_sharpness() -> AnalysisSettings {
        AnalysisSettings {
            resample_to: None,
            metrics: vec![
                spec("levels", "Leq", vec![Statistic::Avg, Statistic::Max]),
                spec("psychoacoustics", "sharpness", vec![Statistic::Avg]),
            ],
        }
    }

    fn serial_options() -> BatchOptions {
        BatchOptions {
            jobs: 1,
            ..BatchOptions::default()
        }
    }

    #[test]
    fn test_end_to_end_two_recordings() {
        let dir = temp_dir("e2e");
        write_wav(
            &dir,
            "A.wav",
            8000,
            &[sine(440.0, 8000, 0.5, 0.3), sine(880.0, 8000, 0.5, 0.3)],
        );
        write_wav(
            &dir,
            "B.wav",
            8000,
            &[sine(440.0, 8000, 0.5, 0.3), sine(880.0, 8000, 0.5, 0.3)],
        );
        let (calibration, _) = CalibrationMap::from_json_str(r#"{"A": 60.0}"#).unwrap();

        let report = run(
            &dir,
            &leq_and_sharpness(),
            &calibration,
            registry(),
            &serial_options(),
        )
        .unwrap();
        std::fs::remove_dir_all(&dir).ok();

        // 4 rows in canonical order, 3 columns
        assert_eq!(report.table.num_rows(), 4);
        assert_eq!(
            report.table.column_names(),
            vec!["Leq_avg", "Leq_max", "Sharpness_avg"]
        );
        let keys: Vec<(String, String)> = report
            .table
            .rows()
            .iter()
            .map(|r| (r.recording_id.clone(), r.channel_label.clone()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("A".to_string(), "ch0".to_string()),
                ("A".to_string(), "ch1".to_string()),
                ("B".to_string(), "ch0".to_string()),
                ("B".to_string(), "ch1".to_string()),
            ]
        );

        // A is calibrated: numeric everywhere
        for ch in ["ch0", "ch1"] {
            assert!(report.table.get("A", ch, "Leq_avg").unwrap().is_finite());
            assert!(report.table.get("A", ch, "Leq_max").unwrap().is_finite());
            assert!(report.table.get("A", ch, "Sharpness_avg").unwrap().is_finite());
        }
        // B has no calibration entry: level metrics NaN, sharpness numeric
        for ch in ["ch0", "ch1"] {
            assert!(report.table.get("B", ch, "Leq_avg").unwrap().is_nan());
            assert!(report.table.get("B", ch, "Leq_max").unwrap().is_nan());
            assert!(report.table.get("B", ch, "Sharpness_avg").unwrap().is_finite());
        }

        // One soft degradation annotation per channel of B
        assert_eq!(report.errors.len(), 2);
        for error in &report.errors {
            assert_eq!(error.recording_id, "B");
            assert_eq!(error.metric.as_deref(), Some("Leq"));
        }
        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 0);
        assert!(!report.cancelled);
    }

    #[test]
    fn test_serial_and_parallel_runs_are_identical() {
        let settings = AnalysisSettings {
            resample_to: None,
            metrics: vec![
                spec("levels", "Leq", vec![Statistic::Avg, Statistic::Percentile(5)]),
                spec("psychoacoustics", "sharpness", vec![Statistic::Avg]),
                spec("psychoacoustics", "loudness", vec![Statistic::Avg]),
            ],
        };

        let mut rng = Lcg(0x5eed);
        for set in 0..20 {
            let dir = temp_dir(&format!("det{set}"));
            let count = rng.range(3, 6);
            let mut calibration = CalibrationMap::empty();

            for i in 0..count {
                let n_channels = rng.range(1, 2) as usize;
                let secs = 0.1 + rng.unit_f64() * 0.2;
                let channels: Vec<Vec<f64>> = (0..n_channels)
                    .map(|_| {
                        let freq = 100.0 + rng.unit_f64() * 2000.0;
                        sine(freq, 8000, secs, 0.05 + rng.unit_f64() * 0.4)
                    })
                    .collect();
                write_wav(&dir, &format!("rec{i:02}.wav"), 8000, &channels);
                if rng.next_u32() % 2 == 0 {
                    calibration.insert(
                        format!("rec{i:02}"),
                        crate::calibration::CalibrationEntry::Uniform(
                            50.0 + rng.unit_f64() * 30.0,
                        ),
                    );
                }
            }

            let mut reports = Vec::new();
            for jobs in [1, 2, 4] {
                let options = BatchOptions {
                    jobs,
                    ..BatchOptions::default()
                };
                reports.push(
                    run(&dir, &settings, &calibration, registry(), &options).unwrap(),
                );
            }
            std::fs::remove_dir_all(&dir).ok();

            let baseline = &reports[0];
            for report in &reports[1..] {
                assert!(
                    baseline.table.bitwise_eq(&report.table),
                    "set {set}: parallel table diverged from serial"
                );
                assert_eq!(baseline.errors, report.errors, "set {set}: errors diverged");
            }
        }
    }

    #[test]
    fn test_unreadable_file_becomes_nan_row() {
        let dir = temp_dir("bad");
        std::fs::write(dir.join("aaa_broken.wav"), b"not a wav file").unwrap();
        write_wav(&dir, "good.wav", 8000, &[sine(440.0, 8000, 0.3, 0.3)]);
        let (calibration, _) =
            CalibrationMap::from_json_str(r#"{"good": 60.0, "aaa_broken": 60.0}"#).unwrap();

        let report = run(
            &dir,
            &leq_and_sharpness(),
            &calibration,
            registry(),
            &serial_options(),
        )
        .unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(report.failed, 1);
        assert_eq!(report.processed, 1);
        // Failed recording: one fully-NaN row, first in canonical order
        let row = &report.table.rows()[0];
        assert_eq!(row.recording_id, "aaa_broken");
        assert_eq!(row.channel_label, "-");
        assert!(row.values.iter().all(|v| v.is_nan()));
        // Good recording unaffected
        assert!(report.table.get("good", "ch0", "Leq_avg").unwrap().is_finite());
        // Whole-recording error annotation (no channel, no metric)
        let hard = report
            .errors
            .iter()
            .find(|e| e.recording_id == "aaa_broken")
            .unwrap();
        assert!(hard.channel.is_none() && hard.metric.is_none());
    }

    #[test]
    fn test_silent_recording_fails_calibration_hard() {
        let dir = temp_dir("silent");
        write_wav(&dir, "quiet.wav", 8000, &[vec![0.0; 800]]);
        let (calibration, _) = CalibrationMap::from_json_str(r#"{"quiet": 60.0}"#).unwrap();

        let report = run(
            &dir,
            &leq_and_sharpness(),
            &calibration,
            registry(),
            &serial_options(),
        )
        .unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(report.failed, 1);
        assert!(report.errors[0].message.contains("silent"));
    }

    #[test]
    fn test_strict_empty_directory() {
        let dir = temp_dir("empty");
        let options = BatchOptions {
            strict: true,
            ..serial_options()
        };
        let err = run(
            &dir,
            &leq_and_sharpness(),
            &CalibrationMap::empty(),
            registry(),
            &options,
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::NoRecordings(_)));

        // Without strict the run completes with an empty table
        let report = run(
            &dir,
            &leq_and_sharpness(),
            &CalibrationMap::empty(),
            registry(),
            &serial_options(),
        )
        .unwrap();
        std::fs::remove_dir_all(&dir).ok();
        assert!(report.table.is_empty());
    }

    #[test]
    fn test_invalid_settings_fail_before_dispatch() {
        let dir = temp_dir("cfg");
        write_wav(&dir, "a.wav", 8000, &[sine(440.0, 8000, 0.2, 0.3)]);

        let settings = AnalysisSettings {
            resample_to: None,
            metrics: vec![spec("nosuch", "metric", vec![Statistic::Avg])],
        };
        let err = run(
            &dir,
            &settings,
            &CalibrationMap::empty(),
            registry(),
            &serial_options(),
        )
        .unwrap_err();
        std::fs::remove_dir_all(&dir).ok();
        assert!(matches!(err, BatchError::Settings(SettingsError::Invalid(_))));
    }

    #[test]
    fn test_cancellation_before_dispatch() {
        let dir = temp_dir("cancel");
        write_wav(&dir, "a.wav", 8000, &[sine(440.0, 8000, 0.2, 0.3)]);
        write_wav(&dir, "b.wav", 8000, &[sine(440.0, 8000, 0.2, 0.3)]);

        let flag = Arc::new(AtomicBool::new(true));
        let options = BatchOptions {
            cancel: Some(flag),
            ..serial_options()
        };
        let report = run(
            &dir,
            &leq_and_sharpness(),
            &CalibrationMap::empty(),
            registry(),
            &options,
        )
        .unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert!(report.cancelled);
        assert_eq!(report.table.num_rows(), 0);
    }

    #[test]
    fn test_discovery_canonical_order_and_ids() {
        let dir = temp_dir("disc");
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        write_wav(&dir, "c.wav", 8000, &[vec![0.1; 80]]);
        write_wav(&dir.join("sub"), "a.wav", 8000, &[vec![0.1; 80]]);
        write_wav(&dir, "a.wav", 8000, &[vec![0.1; 80]]);
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let extensions = vec!["wav".to_string()];
        let discovered = discover(&dir, &extensions).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        let ids: Vec<String> = discovered.iter().map(|d| d.id.clone()).collect();
        // Lexicographic path order; colliding stems fall back to relative paths
        let sep = std::path::MAIN_SEPARATOR;
        assert_eq!(
            ids,
            vec!["a.wav".to_string(), "c".to_string(), format!("sub{sep}a.wav")]
        );
    }

    #[test]
    fn test_run_single_file() {
        let dir = temp_dir("single");
        write_wav(&dir, "solo.wav", 8000, &[sine(440.0, 8000, 0.3, 0.3)]);
        let (calibration, _) = CalibrationMap::from_json_str(r#"{"solo": 62.0}"#).unwrap();

        let report = run_single(
            &dir.join("solo.wav"),
            &leq_and_sharpness(),
            &calibration,
            registry(),
            &serial_options(),
        )
        .unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(report.table.num_rows(), 1);
        assert!(report.table.get("solo", "ch0", "Leq_avg").unwrap().is_finite());
        assert!(report.errors.is_empty());
    }
}
