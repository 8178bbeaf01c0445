//! Loopback kernel backend.
//!
//! Used when no accelerator runtime is linked into the binary: construction
//! and the call protocol behave like a real backend (file checks, staged
//! input, moved results) but inference produces empty results. Real
//! backends implement [`ModelKernel`]/[`KernelFactory`] against their
//! device runtime and are wired in at startup.

use std::fs;

use tracing::debug;

use super::{KernelError, KernelFactory, KernelOutput, KernelSpec, ModelKernel};

#[derive(Debug)]
pub struct StubKernel {
    spec: KernelSpec,
    input: Option<StagedInput>,
    results: Option<KernelOutput>,
}

#[derive(Debug)]
struct StagedInput {
    image: image::DynamicImage,
    start_value: f64,
    end_value: f64,
}

impl StubKernel {
    fn construct(spec: &KernelSpec) -> Result<Self, KernelError> {
        fs::metadata(&spec.path)
            .map_err(|e| KernelError::ModelUnavailable(format!("{}: {}", spec.path, e)))?;
        debug!(
            model_type = spec.model_type,
            variant = spec.variant,
            path = %spec.path,
            "constructed stub kernel"
        );
        Ok(Self {
            spec: spec.clone(),
            input: None,
            results: None,
        })
    }
}

impl ModelKernel for StubKernel {
    fn set_input(&mut self, image: image::DynamicImage, start_value: f64, end_value: f64) {
        self.input = Some(StagedInput {
            image,
            start_value,
            end_value,
        });
    }

    fn infer(&mut self) -> Result<(), KernelError> {
        let staged = self.input.as_ref().ok_or(KernelError::MissingInput)?;
        debug!(
            model_type = self.spec.model_type,
            width = staged.image.width(),
            height = staged.image.height(),
            "stub inference"
        );
        // A gauge model reports within the requested range; with no device
        // attached there is nothing to read, so the output stays empty.
        let _ = (staged.start_value, staged.end_value);
        self.results = Some(KernelOutput::default());
        Ok(())
    }

    fn take_results(&mut self) -> KernelOutput {
        self.results.take().unwrap_or_default()
    }

    fn reset(&mut self) {
        self.input = None;
        self.results = None;
    }

    fn close(&mut self) {
        self.reset();
    }
}

/// Factory for [`StubKernel`] instances.
#[derive(Debug, Default)]
pub struct StubFactory;

impl KernelFactory for StubFactory {
    fn construct(&self, spec: &KernelSpec) -> Result<Box<dyn ModelKernel>, KernelError> {
        Ok(Box::new(StubKernel::construct(spec)?))
    }
}
