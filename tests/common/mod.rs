//! Shared fixtures: scriptable mock kernels, config builders, image
//! payloads.

#![allow(dead_code)]

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;

use vision_gateway::config::{GatewayConfig, ModelDescriptor};
use vision_gateway::kernel::{
    KernelError, KernelFactory, KernelOutput, KernelSpec, ModelKernel,
};

/// Kernel whose behavior is scripted by its factory: canned outputs, an
/// optional inference delay (to hold instances busy) and forced failures.
pub struct MockKernel {
    infer_delay: Duration,
    fail_infer: bool,
    output: KernelOutput,
    input_set: bool,
    results: Option<KernelOutput>,
    closed: Arc<AtomicUsize>,
}

impl ModelKernel for MockKernel {
    fn set_input(&mut self, _image: image::DynamicImage, _start_value: f64, _end_value: f64) {
        self.input_set = true;
    }

    fn infer(&mut self) -> Result<(), KernelError> {
        if !self.input_set {
            return Err(KernelError::MissingInput);
        }
        if !self.infer_delay.is_zero() {
            std::thread::sleep(self.infer_delay);
        }
        if self.fail_infer {
            return Err(KernelError::Inference("scripted failure".into()));
        }
        self.results = Some(self.output.clone());
        Ok(())
    }

    fn take_results(&mut self) -> KernelOutput {
        self.results.take().unwrap_or_default()
    }

    fn reset(&mut self) {
        self.input_set = false;
        self.results = None;
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory producing [`MockKernel`]s and recording construction/close
/// counts.
pub struct MockFactory {
    pub infer_delay: Duration,
    pub fail_infer: bool,
    /// Construction index at which to fail, for rollback scenarios.
    pub fail_at: Option<usize>,
    pub output: KernelOutput,
    constructed: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

impl Default for MockFactory {
    fn default() -> Self {
        Self {
            infer_delay: Duration::ZERO,
            fail_infer: false,
            fail_at: None,
            output: KernelOutput::default(),
            constructed: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockFactory {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            infer_delay: delay,
            ..Self::default()
        }
    }

    pub fn with_output(output: KernelOutput) -> Self {
        Self {
            output,
            ..Self::default()
        }
    }

    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::default()
        }
    }

    pub fn failing_infer() -> Self {
        Self {
            fail_infer: true,
            ..Self::default()
        }
    }

    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl KernelFactory for MockFactory {
    fn construct(&self, _spec: &KernelSpec) -> Result<Box<dyn ModelKernel>, KernelError> {
        let index = self.constructed.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(index) {
            return Err(KernelError::ModelUnavailable(format!(
                "scripted construction failure at {index}"
            )));
        }
        Ok(Box::new(MockKernel {
            infer_delay: self.infer_delay,
            fail_infer: self.fail_infer,
            output: self.output.clone(),
            input_set: false,
            results: None,
            closed: Arc::clone(&self.closed),
        }))
    }
}

/// A file standing in for a model weights blob.
pub fn model_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp model file");
    file.write_all(b"weights").expect("write temp model file");
    file
}

pub fn descriptor(name: &str, path: &str, model_type: i64, thresh: f32) -> ModelDescriptor {
    ModelDescriptor {
        name: name.to_string(),
        model_path: path.to_string(),
        model_type,
        object_thresh: thresh,
    }
}

/// Config with the given descriptors and a small pool size.
pub fn test_config(models: Vec<ModelDescriptor>, pool_size: usize) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.models = models;
    config.general.concurrency.model_pool_size = pool_size;
    config.general.concurrency.model_acquire_timeout_ms = 1_000;
    config
}

pub fn test_image() -> image::DynamicImage {
    image::DynamicImage::new_rgb8(2, 2)
}

/// PNG-encoded bytes of a tiny image, for wire-level tests.
pub fn png_bytes() -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    test_image()
        .write_to(&mut cursor, image::ImageFormat::Png)
        .expect("encode test png");
    cursor.into_inner()
}
