//! Abstract model-instance capability consumed by the pool layer.
//!
//! A kernel wraps one loaded model on one accelerator core. Instances are
//! expensive to construct and are not safe for concurrent use; exclusivity
//! is provided by [`crate::pool::ModelPool`], which hands a kernel to at
//! most one caller at a time.

use serde::{Serialize, Serializer};
use thiserror::Error;

pub mod stub;

pub use stub::{StubFactory, StubKernel};

/// Kernel-level failures.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("model file is not readable: {0}")]
    ModelUnavailable(String),

    #[error("no input image was set before infer")]
    MissingInput,

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Construction parameters for one model instance.
///
/// `variant` selects the accelerator core and is always `model_type % 3`.
#[derive(Debug, Clone)]
pub struct KernelSpec {
    pub path: String,
    pub variant: u32,
    pub model_type: u32,
    pub threshold: f32,
}

impl KernelSpec {
    pub fn new(path: impl Into<String>, model_type: u32, threshold: f32) -> Self {
        Self {
            path: path.into(),
            variant: model_type % 3,
            model_type,
            threshold,
        }
    }
}

/// One cell of a detection row. Rows mix numeric and textual values
/// (class ids, coordinates, labels), so the cell is a tagged variant.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Numeric projection used by the float-only RPC rows. Text cells have
    /// no numeric form and are skipped on that surface.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            CellValue::Int(v) => Some(*v as f32),
            CellValue::Float(v) => Some(*v as f32),
            CellValue::Text(_) => None,
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Int(v) => serializer.serialize_i64(*v),
            // Coordinates and confidences are reported to four decimal places.
            CellValue::Float(v) => serializer.serialize_f64((v * 10_000.0).round() / 10_000.0),
            CellValue::Text(v) => serializer.serialize_str(v),
        }
    }
}

/// Everything a kernel produces for one inference call.
#[derive(Debug, Clone, Default)]
pub struct KernelOutput {
    pub detections: Vec<Vec<CellValue>>,
    pub plates: Vec<String>,
    pub gauge_value: Option<f64>,
}

/// One loaded model instance.
///
/// Call order per checkout window: `set_input` then `infer` then
/// `take_results`. The pool calls `reset` when the instance is returned and
/// `close` when the pool shuts down.
pub trait ModelKernel: Send {
    /// Stage the input image and the gauge range scalars. Non-gauge models
    /// ignore `start_value`/`end_value`.
    fn set_input(&mut self, image: image::DynamicImage, start_value: f64, end_value: f64);

    /// Run the model against the staged input.
    fn infer(&mut self) -> Result<(), KernelError>;

    /// Move the results out of the instance, clearing its internal storage.
    fn take_results(&mut self) -> KernelOutput;

    /// Drop per-call scratch state: staged input and any leftover results.
    fn reset(&mut self);

    /// Release device resources. The instance is unusable afterwards.
    fn close(&mut self);
}

/// Constructs kernels for a pool. One factory serves every pool; the
/// [`KernelSpec`] tells it which model and core to target.
pub trait KernelFactory: Send + Sync {
    fn construct(&self, spec: &KernelSpec) -> Result<Box<dyn ModelKernel>, KernelError>;
}
