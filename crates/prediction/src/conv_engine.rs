// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A CPU reference backend: one 2-D convolution layer.
//!
//! Weights hold a `kernel` tensor shaped `[out_c, in_c, kh, kw]` (odd `kh`
//! and `kw`) and an optional `bias` of length `out_c`. The convolution is
//! zero-padded "same", so each output pixel depends on a `kh / 2` by `kw / 2`
//! neighbourhood, the halo a tiled run needs.

use crate::{Device, EngineSession, InferenceEngine, PredictionError};
use ndarray::{s, Array4, ArrayD, Ix4};
use resource_descr::{ResourceDescriptor, WeightFormat};
use tensor_core::{AxisId, FillMode, Tensor};
use weight_converter::native::{self, TensorMap, TypedArray};

const ENGINE_NAME: &str = "convolution";

/// Executes SafeTensors and NumPy-archive convolution weights on the CPU.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvolutionEngine;

impl ConvolutionEngine {
    pub fn new() -> Self {
        Self
    }
}

impl InferenceEngine for ConvolutionEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn supports(&self, format: WeightFormat) -> bool {
        matches!(format, WeightFormat::SafeTensors | WeightFormat::NumpyArchive)
    }

    fn open(
        &self,
        descriptor: &ResourceDescriptor,
        format: WeightFormat,
        devices: &[Device],
    ) -> Result<Box<dyn EngineSession>, PredictionError> {
        if !self.supports(format) {
            return Err(PredictionError::UnsupportedFormat {
                engine: ENGINE_NAME.into(),
                format,
            });
        }
        if !devices.is_empty() && !devices.contains(&Device::Cpu) {
            return Err(engine_error(format!(
                "no usable device among {}",
                devices.iter().map(Device::to_string).collect::<Vec<_>>().join(", ")
            )));
        }
        if descriptor.inputs().len() != 1 || descriptor.outputs().len() != 1 {
            return Err(engine_error(format!(
                "expected one input and one output, model has {} and {}",
                descriptor.inputs().len(),
                descriptor.outputs().len()
            )));
        }

        let path = descriptor
            .weight_path(format)
            .ok_or(PredictionError::WeightFormatUnavailable { format })?;
        let tensors = match format {
            WeightFormat::SafeTensors => native::read_safetensors(path),
            _ => native::read_npz(path),
        }
        .map_err(|e| engine_error(e.to_string()))?;

        let session = ConvolutionSession::from_tensors(
            &tensors,
            descriptor.outputs()[0].axis_ids(),
        )?;
        tracing::debug!(
            "opened {} session: {} -> {} channels, {}x{} kernel",
            ENGINE_NAME,
            session.kernel.shape()[1],
            session.kernel.shape()[0],
            session.kernel.shape()[2],
            session.kernel.shape()[3]
        );
        Ok(Box::new(session))
    }
}

/// A loaded convolution layer.
#[derive(Debug)]
pub struct ConvolutionSession {
    kernel: Array4<f32>,
    bias: Vec<f32>,
    output_axes: Vec<AxisId>,
}

impl ConvolutionSession {
    fn from_tensors(tensors: &TensorMap, output_axes: Vec<AxisId>) -> Result<Self, PredictionError> {
        let kernel = tensors
            .get("kernel")
            .ok_or_else(|| engine_error("weights have no 'kernel' tensor".into()))
            .and_then(|k| as_f32(k, "kernel"))?
            .into_dimensionality::<Ix4>()
            .map_err(|e| engine_error(format!("kernel must be [out_c, in_c, kh, kw]: {e}")))?;

        let (out_c, kh, kw) = (kernel.shape()[0], kernel.shape()[2], kernel.shape()[3]);
        if kh % 2 == 0 || kw % 2 == 0 {
            return Err(engine_error(format!("kernel size {kh}x{kw} must be odd")));
        }

        let bias = match tensors.get("bias") {
            Some(b) => {
                let b = as_f32(b, "bias")?;
                if b.len() != out_c {
                    return Err(engine_error(format!(
                        "bias has {} values for {out_c} output channels",
                        b.len()
                    )));
                }
                b.iter().copied().collect()
            }
            None => vec![0.0; out_c],
        };

        Ok(Self {
            kernel,
            bias,
            output_axes,
        })
    }

    /// Half the kernel extent along y and x.
    pub fn receptive_radius(&self) -> (usize, usize) {
        (self.kernel.shape()[2] / 2, self.kernel.shape()[3] / 2)
    }
}

impl EngineSession for ConvolutionSession {
    fn run(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, PredictionError> {
        let [input] = inputs else {
            return Err(engine_error(format!("expected 1 input, got {}", inputs.len())));
        };
        let bcyx = AxisId::parse_compact("bcyx");
        let x = input.conform_to(&bcyx)?;
        let (batch, in_c, h, w) = (x.dims()[0], x.dims()[1], x.dims()[2], x.dims()[3]);
        let (out_c, k_in) = (self.kernel.shape()[0], self.kernel.shape()[1]);
        if in_c != k_in {
            return Err(engine_error(format!(
                "input has {in_c} channels, kernel expects {k_in}"
            )));
        }

        let (ry, rx) = self.receptive_radius();
        let padded = x.pad(&[(0, 0), (0, 0), (ry, ry), (rx, rx)], FillMode::Zero)?;
        let src = padded
            .data()
            .view()
            .into_dimensionality::<Ix4>()
            .map_err(|e| engine_error(e.to_string()))?;

        let mut out = Array4::<f32>::zeros((batch, out_c, h, w));
        for b in 0..batch {
            for oc in 0..out_c {
                let mut plane = out.slice_mut(s![b, oc, .., ..]);
                plane.fill(self.bias[oc]);
                for ic in 0..in_c {
                    for ky in 0..2 * ry + 1 {
                        for kx in 0..2 * rx + 1 {
                            let k = self.kernel[[oc, ic, ky, kx]];
                            if k == 0.0 {
                                continue;
                            }
                            let window = src.slice(s![b, ic, ky..ky + h, kx..kx + w]);
                            plane.scaled_add(k, &window);
                        }
                    }
                }
            }
        }

        let y = Tensor::new(bcyx, out.into_dyn())?.conform_to(&self.output_axes)?;
        Ok(vec![y])
    }
}

fn as_f32(array: &TypedArray, name: &str) -> Result<ArrayD<f32>, PredictionError> {
    match array {
        TypedArray::F32(a) => Ok(a.clone()),
        TypedArray::F64(a) => Ok(a.mapv(|v| v as f32)),
        other => Err(engine_error(format!(
            "'{name}' must be float32 or float64, got {:?}",
            other.dtype()
        ))),
    }
}

fn engine_error(detail: String) -> PredictionError {
    PredictionError::Engine {
        engine: ENGINE_NAME.into(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn session(kernel: Vec<f32>, k: usize, bias: Option<f32>) -> ConvolutionSession {
        let mut tensors = TensorMap::new();
        tensors.insert(
            "kernel".into(),
            TypedArray::F32(ArrayD::from_shape_vec(IxDyn(&[1, 1, k, k]), kernel).unwrap()),
        );
        if let Some(b) = bias {
            tensors.insert(
                "bias".into(),
                TypedArray::F64(ArrayD::from_shape_vec(IxDyn(&[1]), vec![b as f64]).unwrap()),
            );
        }
        ConvolutionSession::from_tensors(&tensors, AxisId::parse_compact("bcyx")).unwrap()
    }

    fn image(h: usize, w: usize) -> Tensor {
        Tensor::from_fn(AxisId::parse_compact("bcyx"), &[1, 1, h, w], |i| (i[2] * w + i[3]) as f32)
            .unwrap()
    }

    #[test]
    fn test_identity_kernel() {
        let mut s = session(vec![0., 0., 0., 0., 1., 0., 0., 0., 0.], 3, None);
        let x = image(4, 5);
        let y = s.run(&[x.clone()]).unwrap();
        assert_eq!(y[0].max_abs_diff(&x).unwrap(), 0.0);
    }

    #[test]
    fn test_box_kernel_zero_padded() {
        let mut s = session(vec![1.0; 9], 3, Some(0.5));
        let x = Tensor::from_f32(AxisId::parse_compact("bcyx"), vec![1, 1, 3, 3].into(), &[1.0; 9])
            .unwrap();
        let y = s.run(&[x]).unwrap();
        let d = y[0].data();
        assert_eq!(d[[0, 0, 0, 0]], 4.5);
        assert_eq!(d[[0, 0, 0, 1]], 6.5);
        assert_eq!(d[[0, 0, 1, 1]], 9.5);
    }

    #[test]
    fn test_yx_input_is_conformed() {
        let mut s = session(vec![2.0], 1, None);
        let x = Tensor::from_fn(AxisId::parse_compact("yx"), &[2, 2], |i| (i[0] + i[1]) as f32)
            .unwrap();
        let y = s.run(&[x]).unwrap();
        assert_eq!(y[0].dims(), &[1, 1, 2, 2]);
        assert_eq!(y[0].data()[[0, 0, 1, 1]], 4.0);
    }

    #[test]
    fn test_even_kernel_rejected() {
        let mut tensors = TensorMap::new();
        tensors.insert(
            "kernel".into(),
            TypedArray::F32(ArrayD::zeros(IxDyn(&[1, 1, 2, 2]))),
        );
        assert!(ConvolutionSession::from_tensors(&tensors, AxisId::parse_compact("bcyx")).is_err());
    }

    #[test]
    fn test_channel_mismatch() {
        let mut s = session(vec![1.0], 1, None);
        let x = Tensor::zeros(AxisId::parse_compact("bcyx"), &[1, 2, 2, 2]).unwrap();
        assert!(matches!(s.run(&[x]), Err(PredictionError::Engine { .. })));
    }
}
