pub mod levels;
pub mod psycho;

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use thiserror::Error;

use crate::settings::{Params, Statistic};

#[derive(Error, Debug)]
pub enum MetricError {
    #[error("Metric requires a calibrated recording")]
    CalibrationRequired,
    #[error("Bad parameter '{name}': {message}")]
    BadParameter { name: String, message: String },
    #[error("Computation failed: {0}")]
    Computation(String),
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Duplicate metric registration: {family}/{name}")]
    Duplicate { family: String, name: String },
}

/// Raw output of a metric implementation, before statistic reduction.
#[derive(Debug, Clone)]
pub enum RawOutput {
    /// A single value; every requested statistic passes it through.
    Scalar(f64),
    /// A time series; statistics reduce it to scalars.
    Series(Vec<f64>),
    /// Already-reduced values keyed by statistic label.
    Aggregated(BTreeMap<String, f64>),
}

/// Everything a metric implementation sees: one channel's waveform,
/// its rate, and whether the waveform carries an absolute level.
pub struct MetricInput<'a> {
    pub samples: &'a [f64],
    pub sample_rate: u32,
    pub calibrated: bool,
}

pub type MetricFn = fn(&MetricInput, &Params) -> Result<RawOutput, MetricError>;

/// One registry entry: the implementation plus the defaults the settings
/// preset and the `metrics` listing are built from.
#[derive(Clone, Debug)]
pub struct MetricDescriptor {
    pub family: String,
    pub name: String,
    /// Column label in the result table, e.g. `LAeq` in `LAeq_5`.
    pub label: String,
    /// Whether the implementation needs an absolute (calibrated) level.
    pub requires_calibration: bool,
    pub default_statistics: Vec<Statistic>,
    pub default_params: Params,
    pub func: MetricFn,
}

impl MetricDescriptor {
    fn key(&self) -> (String, String) {
        (self.family.to_lowercase(), self.name.to_lowercase())
    }
}

/// The metric registry, keyed by (family, name).
/// Built once at startup; lookups are O(1).
#[derive(Debug)]
pub struct MetricRegistry {
    metrics: Vec<MetricDescriptor>,
    /// Maps lowercase (family, name) → index in `metrics`
    key_to_index: HashMap<(String, String), usize>,
}

static REGISTRY: OnceLock<MetricRegistry> = OnceLock::new();

/// The process-wide registry with both built-in families.
pub fn registry() -> &'static MetricRegistry {
    REGISTRY.get_or_init(MetricRegistry::builtin)
}

impl MetricRegistry {
    /// Registry with the built-in `levels` and `psychoacoustics` families.
    pub fn builtin() -> Self {
        let mut registry = Self {
            metrics: Vec::new(),
            key_to_index: HashMap::new(),
        };
        for descriptor in levels::descriptors() {
            registry
                .add(descriptor)
                .expect("built-in levels metrics collide");
        }
        for descriptor in psycho::descriptors() {
            registry
                .add(descriptor)
                .expect("built-in psychoacoustic metrics collide");
        }
        registry
    }

    /// Extend with a custom metric, e.g. a plugin family or a test stub.
    pub fn with_metric(mut self, descriptor: MetricDescriptor) -> Result<Self, RegistryError> {
        self.add(descriptor)?;
        Ok(self)
    }

    fn add(&mut self, descriptor: MetricDescriptor) -> Result<(), RegistryError> {
        let key = descriptor.key();
        if self.key_to_index.contains_key(&key) {
            return Err(RegistryError::Duplicate {
                family: descriptor.family.clone(),
                name: descriptor.name.clone(),
            });
        }
        self.key_to_index.insert(key, self.metrics.len());
        self.metrics.push(descriptor);
        Ok(())
    }

    /// Look up a metric by (family, name), case-insensitive.
    pub fn get(&self, family: &str, name: &str) -> Option<&MetricDescriptor> {
        let key = (family.to_lowercase(), name.to_lowercase());
        self.key_to_index.get(&key).map(|&i| &self.metrics[i])
    }

    /// All registered metrics, in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &MetricDescriptor> {
        self.metrics.iter()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Numeric parameter lookup with a per-metric default.
pub(crate) fn param_f64(params: &Params, name: &str, default: f64) -> Result<f64, MetricError> {
    match params.get(name) {
        None => Ok(default),
        Some(v) => v.as_f64().ok_or_else(|| MetricError::BadParameter {
            name: name.to_string(),
            message: format!("expected a number, got {v:?}"),
        }),
    }
}

/// Positive window length in samples from a `window_secs` parameter.
pub(crate) fn window_samples(
    params: &Params,
    default_secs: f64,
    sample_rate: u32,
) -> Result<usize, MetricError> {
    let secs = param_f64(params, "window_secs", default_secs)?;
    if secs <= 0.0 {
        return Err(MetricError::BadParameter {
            name: "window_secs".to_string(),
            message: format!("must be positive, got {secs}"),
        });
    }
    Ok(((secs * sample_rate as f64).round() as usize).max(1))
}
