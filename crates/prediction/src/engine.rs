// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The seam between pipelines and concrete inference backends.
//!
//! An [`InferenceEngine`] knows which weight formats it can execute and opens
//! an [`EngineSession`] for one of them. A session holds whatever the backend
//! loaded (weights, compiled graph, device buffers) and is released when it
//! is dropped or closed.

use crate::PredictionError;
use resource_descr::{ResourceDescriptor, WeightFormat};
use std::fmt;
use std::str::FromStr;
use tensor_core::Tensor;

/// A compute device a session may run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Cpu,
    Cuda(usize),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(i) => write!(f, "cuda:{i}"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda(0)),
            _ => s
                .strip_prefix("cuda:")
                .and_then(|i| i.parse().ok())
                .map(Self::Cuda)
                .ok_or_else(|| format!("unknown device '{s}' (expected cpu, cuda or cuda:N)")),
        }
    }
}

impl serde::Serialize for Device {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Device {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A backend able to execute model weights.
pub trait InferenceEngine: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Whether this backend can execute weights in `format`.
    fn supports(&self, format: WeightFormat) -> bool;

    /// Loads the `format` weights of `descriptor` onto one of `devices`.
    ///
    /// An empty device list lets the backend choose.
    fn open(
        &self,
        descriptor: &ResourceDescriptor,
        format: WeightFormat,
        devices: &[Device],
    ) -> Result<Box<dyn EngineSession>, PredictionError>;
}

/// An opened model. Sessions are not reentrant; each caller owns one.
pub trait EngineSession: Send {
    /// Runs the model once on a complete set of inputs.
    fn run(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, PredictionError>;

    /// Releases backend resources early. Called at most once.
    fn close(&mut self) {}
}
