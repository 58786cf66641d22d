// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shared fixtures: a convolution model package written to a temp dir, and
//! an engine wrapper that records what it was asked to do.

#![allow(dead_code)]

use ndarray::{ArrayD, IxDyn};
use prediction::{ConvolutionEngine, Device, EngineSession, InferenceEngine, PredictionError};
use resource_descr::{ResourceDescriptor, WeightFormat};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tensor_core::io::write_npy_tensor;
use tensor_core::{AxisId, Tensor};
use weight_converter::native::{write_safetensors, TensorMap, TypedArray};

/// A package on disk plus its loaded descriptor.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub descriptor: ResourceDescriptor,
}

/// Options for [`conv_package`].
pub struct PackageOptions {
    pub kernel_size: usize,
    pub halo: usize,
    pub min: usize,
    pub step: usize,
    /// Adds a scale_linear preprocessing and sigmoid postprocessing step.
    pub with_processing: bool,
    /// Replaces the input preprocessing when set.
    pub preprocessing: Option<serde_json::Value>,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            kernel_size: 5,
            halo: 2,
            min: 16,
            step: 16,
            with_processing: true,
            preprocessing: None,
        }
    }
}

/// Deterministic kernel values in [-0.5, 0.5].
pub fn kernel(k: usize) -> ArrayD<f32> {
    ArrayD::from_shape_fn(IxDyn(&[1, 1, k, k]), |i| {
        ((i[2] * 7 + i[3] * 13) % 11) as f32 / 10.0 - 0.5
    })
}

/// A non-periodic ramp with a bright corner, so statistics of any window
/// differ from those of the whole image.
pub fn gradient(h: usize, w: usize) -> Tensor {
    Tensor::from_fn(AxisId::parse_compact("bcyx"), &[1, 1, h, w], |i| {
        let (y, x) = (i[2] as f32, i[3] as f32);
        y * 0.5 + x * x / w as f32 + if y > 200.0 && x > 200.0 { 80.0 } else { 0.0 }
    })
    .unwrap()
}

/// A smooth-ish test image in bcyx layout.
pub fn image(h: usize, w: usize) -> Tensor {
    Tensor::from_fn(AxisId::parse_compact("bcyx"), &[1, 1, h, w], |i| {
        ((i[2] * 31 + i[3] * 17) % 97) as f32 / 97.0
    })
    .unwrap()
}

pub fn conv_package(options: PackageOptions) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), &options);
    let descriptor = ResourceDescriptor::load(dir.path()).unwrap();
    Fixture { dir, descriptor }
}

pub fn write_package(root: &Path, options: &PackageOptions) {
    let mut tensors = TensorMap::new();
    tensors.insert("kernel".into(), TypedArray::F32(kernel(options.kernel_size)));
    write_safetensors(&tensors, &root.join("weights.safetensors")).unwrap();
    std::fs::write(root.join("weights.pt"), b"opaque state dict").unwrap();

    // An all-zero input maps to zero before postprocessing.
    let n = options.min;
    let input = Tensor::zeros(AxisId::parse_compact("bcyx"), &[1, 1, n, n]).unwrap();
    let fill = if options.with_processing { 0.5 } else { 0.0 };
    let output = Tensor::from_fn(AxisId::parse_compact("bcyx"), &[1, 1, n, n], |_| fill).unwrap();
    write_npy_tensor(&root.join("test_input_0.npy"), &input).unwrap();
    write_npy_tensor(&root.join("test_output_0.npy"), &output).unwrap();

    let (mut pre, post) = if options.with_processing {
        (
            serde_json::json!([{ "name": "scale_linear", "kwargs": { "gain": 2.0, "offset": 0.0 } }]),
            serde_json::json!([{ "name": "sigmoid" }]),
        )
    } else {
        (serde_json::json!([]), serde_json::json!([]))
    };
    if let Some(steps) = &options.preprocessing {
        pre = steps.clone();
    }
    let spatial = serde_json::json!({ "min": options.min, "step": options.step });
    let manifest = serde_json::json!({
        "name": "conv-fixture",
        "description": "single convolution layer",
        "authors": [{ "name": "Fixture" }],
        "license": "MIT",
        "inputs": [{
            "name": "raw",
            "axes": [
                { "id": "b", "type": "batch", "size": 1 },
                { "id": "c", "type": "channel", "size": 1 },
                { "id": "y", "type": "space", "size": spatial },
                { "id": "x", "type": "space", "size": spatial }
            ],
            "preprocessing": pre
        }],
        "outputs": [{
            "name": "out",
            "axes": [
                { "id": "b", "type": "batch", "size": 1 },
                { "id": "c", "type": "channel", "size": 1 },
                { "id": "y", "type": "space", "size": { "tensor": "raw", "axis": "y" }, "halo": options.halo },
                { "id": "x", "type": "space", "size": { "tensor": "raw", "axis": "x" }, "halo": options.halo }
            ],
            "postprocessing": post
        }],
        "weights": {
            "safetensors": { "source": "weights.safetensors" },
            "pytorch_state_dict": { "source": "weights.pt" }
        },
        "test_inputs": ["test_input_0.npy"],
        "test_outputs": ["test_output_0.npy"]
    });
    std::fs::write(
        root.join("manifest.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
}

/// Wraps [`ConvolutionEngine`] and counts sessions, runs and closes.
#[derive(Default, Clone)]
pub struct RecordingEngine {
    inner: ConvolutionEngine,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub run_dims: Arc<Mutex<Vec<Vec<usize>>>>,
}

impl RecordingEngine {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> Vec<Vec<usize>> {
        self.run_dims.lock().unwrap().clone()
    }
}

impl InferenceEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    fn supports(&self, format: WeightFormat) -> bool {
        self.inner.supports(format)
    }

    fn open(
        &self,
        descriptor: &ResourceDescriptor,
        format: WeightFormat,
        devices: &[Device],
    ) -> Result<Box<dyn EngineSession>, PredictionError> {
        let inner = self.inner.open(descriptor, format, devices)?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingSession {
            inner,
            engine: self.clone(),
        }))
    }
}

struct RecordingSession {
    inner: Box<dyn EngineSession>,
    engine: RecordingEngine,
}

impl EngineSession for RecordingSession {
    fn run(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, PredictionError> {
        self.engine
            .run_dims
            .lock()
            .unwrap()
            .push(inputs[0].dims().to_vec());
        self.inner.run(inputs)
    }

    fn close(&mut self) {
        self.engine.closed.fetch_add(1, Ordering::SeqCst);
        self.inner.close();
    }
}
