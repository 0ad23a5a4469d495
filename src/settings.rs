use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::MetricRegistry;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Unknown metric: {family}/{name}")]
    UnknownMetric { family: String, name: String },
    #[error("Invalid settings: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// A reduction applied to a metric's raw output.
/// Serialized as the strings `avg`/`max`/`min` or a bare percentile number,
/// matching the settings documents this engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StatisticRepr", into = "StatisticRepr")]
pub enum Statistic {
    Avg,
    Max,
    Min,
    Percentile(u8),
}

impl Statistic {
    /// Label used as the column-name suffix, e.g. `LAeq_5`, `LAeq_avg`.
    pub fn label(&self) -> String {
        match self {
            Self::Avg => "avg".to_string(),
            Self::Max => "max".to_string(),
            Self::Min => "min".to_string(),
            Self::Percentile(n) => n.to_string(),
        }
    }
}

/// Wire form of a Statistic.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StatisticRepr {
    Num(i64),
    Name(String),
}

impl TryFrom<StatisticRepr> for Statistic {
    type Error = String;

    fn try_from(repr: StatisticRepr) -> Result<Self, String> {
        match repr {
            StatisticRepr::Num(n) if (0..=255).contains(&n) => Ok(Self::Percentile(n as u8)),
            StatisticRepr::Num(n) => Err(format!("percentile {n} out of range")),
            StatisticRepr::Name(s) => match s.as_str() {
                "avg" => Ok(Self::Avg),
                "max" => Ok(Self::Max),
                "min" => Ok(Self::Min),
                other => Err(format!("unknown statistic '{other}'")),
            },
        }
    }
}

impl From<Statistic> for StatisticRepr {
    fn from(stat: Statistic) -> Self {
        match stat {
            Statistic::Avg => Self::Name("avg".into()),
            Statistic::Max => Self::Name("max".into()),
            Statistic::Min => Self::Name("min".into()),
            Statistic::Percentile(n) => Self::Num(n as i64),
        }
    }
}

/// A metric parameter value. Kept as a small closed set so settings
/// documents stay schema-checked instead of free-form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Per-metric parameters, keyed by name. BTreeMap so serialization order
/// is deterministic.
pub type Params = BTreeMap<String, ParamValue>;

/// Configuration for one metric: whether it runs, with what parameters,
/// and which summary statistics are reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub family: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub parameters: Params,
    #[serde(default)]
    pub statistics: Vec<Statistic>,
}

fn default_enabled() -> bool {
    true
}

impl MetricSpec {
    pub fn key(&self) -> (String, String) {
        (self.family.to_lowercase(), self.name.to_lowercase())
    }
}

/// The full analysis configuration: an ordered list of metric specs plus
/// engine-wide options. Validated eagerly, read-only once a run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Resample every recording to this rate before analysis.
    #[serde(default)]
    pub resample_to: Option<u32>,
    pub metrics: Vec<MetricSpec>,
}

impl AnalysisSettings {
    /// The built-in preset: every registered metric with its registry
    /// defaults, a curated subset of them enabled.
    pub fn default_preset() -> Self {
        // Listed but off by default; enable per run when needed.
        let disabled: [(&str, &str); 2] = [("levels", "SEL"), ("psychoacoustics", "roughness")];

        let registry = crate::metrics::registry();
        let metrics = registry
            .descriptors()
            .map(|d| MetricSpec {
                family: d.family.to_string(),
                name: d.name.to_string(),
                enabled: !disabled.contains(&(d.family.as_str(), d.name.as_str())),
                parameters: d.default_params.clone(),
                statistics: d.default_statistics.clone(),
            })
            .collect();
        Self {
            resample_to: None,
            metrics,
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, SettingsError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn to_yaml_string(&self) -> Result<String, SettingsError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_yaml_file(&self, path: &Path) -> Result<(), SettingsError> {
        std::fs::write(path, self.to_yaml_string()?)?;
        Ok(())
    }

    /// Look up the spec for a metric by (family, name), case-insensitive.
    pub fn get_metric_settings(
        &self,
        family: &str,
        name: &str,
    ) -> Result<&MetricSpec, SettingsError> {
        let key = (family.to_lowercase(), name.to_lowercase());
        self.metrics
            .iter()
            .find(|m| m.key() == key)
            .ok_or_else(|| SettingsError::UnknownMetric {
                family: family.to_string(),
                name: name.to_string(),
            })
    }

    /// Specs that will actually run.
    pub fn enabled_metrics(&self) -> impl Iterator<Item = &MetricSpec> {
        self.metrics.iter().filter(|m| m.enabled)
    }

    /// Validate the whole settings tree against a registry, collecting
    /// every violation so a long configuration fails with one report
    /// instead of one error at a time.
    pub fn validate(&self, registry: &MetricRegistry) -> Result<(), SettingsError> {
        let mut violations = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for spec in &self.metrics {
            let key = spec.key();
            if !seen.insert(key.clone()) {
                violations.push(format!("duplicate metric {}/{}", spec.family, spec.name));
            }

            if registry.get(&spec.family, &spec.name).is_none() {
                violations.push(format!("unknown metric {}/{}", spec.family, spec.name));
            }

            if spec.enabled && spec.statistics.is_empty() {
                violations.push(format!(
                    "metric {}/{} is enabled but has no statistics",
                    spec.family, spec.name
                ));
            }

            for stat in &spec.statistics {
                if let Statistic::Percentile(n) = stat {
                    if *n > 100 {
                        violations.push(format!(
                            "metric {}/{}: percentile {} out of range 0-100",
                            spec.family, spec.name, n
                        ));
                    }
                }
            }
        }

        if self.resample_to == Some(0) {
            violations.push("resample_to must be a positive rate".to_string());
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SettingsError::Invalid(violations))
        }
    }
}
