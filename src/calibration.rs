use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Calibration document must be a JSON object of recording-id entries")]
    NotAnObject,
}

/// One recording's target playback level(s) in dB.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationEntry {
    /// One level for every channel.
    Uniform(f64),
    /// Levels by channel position.
    PerIndex(Vec<f64>),
    /// Levels by channel label.
    PerLabel(BTreeMap<String, f64>),
}

/// A skipped calibration-file entry, reported but never fatal.
#[derive(Debug, Clone)]
pub struct CalibrationWarning {
    pub recording_id: String,
    pub message: String,
}

/// Result of resolving a whole recording against the map.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTargets {
    /// No entry: process uncalibrated (soft degradation downstream).
    Missing,
    /// A target for every channel, in channel order.
    Full(Vec<f64>),
    /// An entry exists but does not cover every channel.
    Partial,
}

/// Read-only map of recording id to target level, shared across workers.
#[derive(Debug, Clone, Default)]
pub struct CalibrationMap {
    entries: HashMap<String, CalibrationEntry>,
}

impl CalibrationMap {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a JSON calibration document. Malformed entries are skipped and
    /// reported individually; only an unreadable or non-object document
    /// fails the load.
    ///
    /// Accepted entry shapes:
    /// `"REC1": 60.0`, `"REC2": [60.0, 58.5]`, `"REC3": {"ch0": 60.0, "ch1": 58.5}`
    pub fn load(path: &Path) -> Result<(Self, Vec<CalibrationWarning>), CalibrationError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(
        json: &str,
    ) -> Result<(Self, Vec<CalibrationWarning>), CalibrationError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let object = value.as_object().ok_or(CalibrationError::NotAnObject)?;

        let mut map = Self::empty();
        let mut warnings = Vec::new();

        for (id, entry) in object {
            match parse_entry(entry) {
                Ok(parsed) => {
                    map.entries.insert(id.clone(), parsed);
                }
                Err(message) => {
                    log::warn!("Calibration entry '{id}' skipped: {message}");
                    warnings.push(CalibrationWarning {
                        recording_id: id.clone(),
                        message,
                    });
                }
            }
        }

        Ok((map, warnings))
    }

    pub fn insert(&mut self, id: impl Into<String>, entry: CalibrationEntry) {
        self.entries.insert(id.into(), entry);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Target level for one channel of a recording. `None` is the
    /// uncalibrated sentinel, not an error.
    pub fn resolve(&self, id: &str, channel_index: usize, channel_label: &str) -> Option<f64> {
        match self.entries.get(id)? {
            CalibrationEntry::Uniform(level) => Some(*level),
            CalibrationEntry::PerIndex(levels) => levels.get(channel_index).copied(),
            CalibrationEntry::PerLabel(levels) => levels.get(channel_label).copied(),
        }
    }

    /// Resolve every channel of a recording at once. A recording is only
    /// rescaled when the entry covers all its channels.
    pub fn resolve_all(&self, id: &str, channel_labels: &[String]) -> ResolvedTargets {
        if !self.contains(id) {
            return ResolvedTargets::Missing;
        }
        let targets: Vec<Option<f64>> = channel_labels
            .iter()
            .enumerate()
            .map(|(i, label)| self.resolve(id, i, label))
            .collect();
        if targets.iter().all(|t| t.is_some()) {
            ResolvedTargets::Full(targets.into_iter().flatten().collect())
        } else {
            ResolvedTargets::Partial
        }
    }
}

fn parse_entry(value: &serde_json::Value) -> Result<CalibrationEntry, String> {
    match value {
        serde_json::Value::Number(n) => n
            .as_f64()
            .map(CalibrationEntry::Uniform)
            .ok_or_else(|| "level is not a finite number".to_string()),
        serde_json::Value::Array(items) => {
            let mut levels = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let level = item
                    .as_f64()
                    .ok_or_else(|| format!("channel {i} level is not a number"))?;
                levels.push(level);
            }
            if levels.is_empty() {
                return Err("empty channel level list".to_string());
            }
            Ok(CalibrationEntry::PerIndex(levels))
        }
        serde_json::Value::Object(map) => {
            let mut levels = BTreeMap::new();
            for (label, item) in map {
                let level = item
                    .as_f64()
                    .ok_or_else(|| format!("channel '{label}' level is not a number"))?;
                levels.insert(label.clone(), level);
            }
            if levels.is_empty() {
                return Err("empty channel level map".to_string());
            }
            Ok(CalibrationEntry::PerLabel(levels))
        }
        other => Err(format!("unsupported entry shape: {other}")),
    }
}
