// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The prediction pipeline: preprocessing, one engine call, postprocessing.
//!
//! A [`PredictionPipeline`] borrows its [`ResourceDescriptor`] and owns one
//! [`EngineSession`]. The session is released when the pipeline is closed
//! or dropped, whichever comes first, so every exit path frees it.

use crate::processing::{apply_steps, preprocess_inputs};
use crate::{
    CancellationToken, Device, EngineSession, InferenceEngine, PredictionConfig, PredictionError,
    PredictionMetrics,
};
use resource_descr::{ResourceDescriptor, WeightFormat, WeightPriority};
use std::time::{Duration, Instant};
use tensor_core::Tensor;

/// How a pipeline picks its weights and device.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Use exactly this format instead of consulting the priority.
    pub weight_format: Option<WeightFormat>,
    /// Devices offered to the engine, in order of preference.
    pub devices: Vec<Device>,
    pub weight_priority: WeightPriority,
    /// Record per-call timings.
    pub enable_profiling: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            weight_format: None,
            devices: vec![Device::Cpu],
            weight_priority: WeightPriority::default(),
            enable_profiling: false,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &PredictionConfig) -> Result<Self, PredictionError> {
        config.pipeline_options()
    }

    /// Pins the weight format.
    pub fn with_weight_format(mut self, format: WeightFormat) -> Self {
        self.weight_format = Some(format);
        self
    }
}

/// A model ready to run on tensors.
pub struct PredictionPipeline<'d> {
    descriptor: &'d ResourceDescriptor,
    session: Box<dyn EngineSession>,
    format: WeightFormat,
    engine_name: String,
    metrics: Option<PredictionMetrics>,
}

impl<'d> PredictionPipeline<'d> {
    /// Selects a weight format, then opens an engine session for it.
    ///
    /// # Errors
    /// An explicit format must be shipped by the package
    /// ([`PredictionError::WeightFormatUnavailable`]) and supported by the
    /// engine ([`PredictionError::UnsupportedFormat`]). Without one, the
    /// first prioritized format the engine supports is used
    /// ([`PredictionError::NoUsableWeights`] if there is none).
    pub fn open(
        descriptor: &'d ResourceDescriptor,
        engine: &dyn InferenceEngine,
        options: &PipelineOptions,
    ) -> Result<Self, PredictionError> {
        let format = select_format(descriptor, engine, options)?;

        let start = Instant::now();
        let session = engine.open(descriptor, format, &options.devices)?;
        let metrics = options
            .enable_profiling
            .then(|| PredictionMetrics::new(start.elapsed()));

        tracing::info!(
            "opened pipeline for '{}' with {} weights on engine '{}'",
            descriptor.name(),
            format,
            engine.name()
        );

        Ok(Self {
            descriptor,
            session,
            format,
            engine_name: engine.name().to_string(),
            metrics,
        })
    }

    pub fn descriptor(&self) -> &'d ResourceDescriptor {
        self.descriptor
    }

    pub fn weight_format(&self) -> WeightFormat {
        self.format
    }

    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    /// Timings recorded so far, when profiling is enabled.
    pub fn metrics(&self) -> Option<&PredictionMetrics> {
        self.metrics.as_ref()
    }

    /// Runs the model on one complete set of inputs.
    ///
    /// Inputs must match the declared tensors exactly: count, axis order and
    /// every axis size. Nothing is reshaped or padded here.
    pub fn apply(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, PredictionError> {
        self.descriptor
            .check_inputs(inputs)
            .map_err(|v| PredictionError::ShapeMismatch(v.to_string()))?;

        let start = Instant::now();
        let prepared = preprocess_inputs(self.descriptor, inputs)?;
        self.infer(&prepared, start.elapsed())
    }

    /// Runs the declared preprocessing without touching the engine.
    ///
    /// Axis sizes are not checked, so a whole image can be normalized once
    /// and then fed window by window to [`Self::apply_preprocessed`].
    pub fn preprocess(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>, PredictionError> {
        preprocess_inputs(self.descriptor, inputs)
    }

    /// Runs the engine and postprocessing on inputs that are already
    /// preprocessed. Shapes are checked as in [`Self::apply`].
    pub fn apply_preprocessed(
        &mut self,
        prepared: &[Tensor],
    ) -> Result<Vec<Tensor>, PredictionError> {
        self.descriptor
            .check_inputs(prepared)
            .map_err(|v| PredictionError::ShapeMismatch(v.to_string()))?;
        self.infer(prepared, Duration::ZERO)
    }

    fn infer(
        &mut self,
        prepared: &[Tensor],
        preprocess: Duration,
    ) -> Result<Vec<Tensor>, PredictionError> {
        let start = Instant::now();
        let mut outputs = self.session.run(prepared)?;
        let inference = start.elapsed();

        let expected = self.descriptor.outputs().len();
        if outputs.len() != expected {
            return Err(PredictionError::ShapeMismatch(format!(
                "engine returned {} outputs, model declares {expected}",
                outputs.len()
            )));
        }

        let start = Instant::now();
        for (spec, tensor) in self.descriptor.outputs().iter().zip(outputs.iter_mut()) {
            apply_steps(&spec.postprocessing, tensor, &spec.name)?;
        }
        let postprocess = start.elapsed();

        if let Some(m) = self.metrics.as_mut() {
            m.record_call(preprocess, inference, postprocess);
        }
        tracing::debug!(
            "applied '{}' in {:.2}ms",
            self.descriptor.name(),
            (preprocess + inference + postprocess).as_secs_f64() * 1000.0
        );
        Ok(outputs)
    }

    /// Applies the pipeline to each sample in turn.
    ///
    /// The token is checked before every sample; on cancellation the results
    /// gathered so far are discarded.
    pub fn predict_batch(
        &mut self,
        samples: &[Vec<Tensor>],
        token: &CancellationToken,
    ) -> Result<Vec<Vec<Tensor>>, PredictionError> {
        let mut results = Vec::with_capacity(samples.len());
        for (i, sample) in samples.iter().enumerate() {
            token.check()?;
            tracing::debug!("predicting sample {}/{}", i + 1, samples.len());
            results.push(self.apply(sample)?);
        }
        Ok(results)
    }

    /// Releases the engine session.
    pub fn close(self) {
        tracing::debug!("closing pipeline for '{}'", self.descriptor.name());
    }
}

impl Drop for PredictionPipeline<'_> {
    fn drop(&mut self) {
        self.session.close();
    }
}

impl std::fmt::Debug for PredictionPipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionPipeline")
            .field("model", &self.descriptor.name())
            .field("format", &self.format)
            .field("engine", &self.engine_name)
            .finish()
    }
}

/// Opens a pipeline, hands it to `f`, and closes it whatever `f` returns.
pub fn with_pipeline<R>(
    descriptor: &ResourceDescriptor,
    engine: &dyn InferenceEngine,
    options: &PipelineOptions,
    f: impl FnOnce(&mut PredictionPipeline<'_>) -> Result<R, PredictionError>,
) -> Result<R, PredictionError> {
    let mut pipeline = PredictionPipeline::open(descriptor, engine, options)?;
    let result = f(&mut pipeline);
    pipeline.close();
    result
}

fn select_format(
    descriptor: &ResourceDescriptor,
    engine: &dyn InferenceEngine,
    options: &PipelineOptions,
) -> Result<WeightFormat, PredictionError> {
    if let Some(format) = options.weight_format {
        if descriptor.weight_entry(format).is_none() {
            return Err(PredictionError::WeightFormatUnavailable { format });
        }
        if !engine.supports(format) {
            return Err(PredictionError::UnsupportedFormat {
                engine: engine.name().to_string(),
                format,
            });
        }
        return Ok(format);
    }

    descriptor
        .select_weights(&options.weight_priority, |f| engine.supports(f))
        .ok_or_else(|| PredictionError::NoUsableWeights {
            engine: engine.name().to_string(),
            available: descriptor
                .weights()
                .keys()
                .map(|f| f.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
}
