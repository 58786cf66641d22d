// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Weight formats, per-format manifest entries and selection priority.

use std::fmt;
use std::str::FromStr;

/// A serialization format of model weights.
///
/// The set is closed; every conversion and engine capability is expressed
/// in terms of these tags.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum WeightFormat {
    #[serde(rename = "pytorch_state_dict")]
    PytorchStateDict,
    #[serde(rename = "torchscript")]
    Torchscript,
    #[serde(rename = "onnx")]
    Onnx,
    #[serde(rename = "tensorflow_saved_model_bundle")]
    TensorflowSavedModelBundle,
    #[serde(rename = "keras_hdf5")]
    KerasHdf5,
    #[serde(rename = "safetensors")]
    SafeTensors,
    #[serde(rename = "numpy_archive")]
    NumpyArchive,
}

impl WeightFormat {
    pub const ALL: [WeightFormat; 7] = [
        Self::PytorchStateDict,
        Self::Torchscript,
        Self::Onnx,
        Self::TensorflowSavedModelBundle,
        Self::KerasHdf5,
        Self::SafeTensors,
        Self::NumpyArchive,
    ];

    /// The manifest tag of this format.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PytorchStateDict => "pytorch_state_dict",
            Self::Torchscript => "torchscript",
            Self::Onnx => "onnx",
            Self::TensorflowSavedModelBundle => "tensorflow_saved_model_bundle",
            Self::KerasHdf5 => "keras_hdf5",
            Self::SafeTensors => "safetensors",
            Self::NumpyArchive => "numpy_archive",
        }
    }

    /// Parses a format tag, accepting common short aliases
    /// (`"pytorch"`, `"ts"`, `"tf"`, `"keras"`, `"npz"`).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "pytorch_state_dict" | "pytorch" | "pt" | "state_dict" => Some(Self::PytorchStateDict),
            "torchscript" | "ts" | "pytorch_script" => Some(Self::Torchscript),
            "onnx" => Some(Self::Onnx),
            "tensorflow_saved_model_bundle" | "tensorflow" | "tf" | "saved_model" => {
                Some(Self::TensorflowSavedModelBundle)
            }
            "keras_hdf5" | "keras" | "hdf5" | "h5" => Some(Self::KerasHdf5),
            "safetensors" | "safe_tensors" => Some(Self::SafeTensors),
            "numpy_archive" | "numpy" | "npz" => Some(Self::NumpyArchive),
            _ => None,
        }
    }

    /// Conventional file name for weights of this format inside a package.
    pub fn default_file_name(self) -> &'static str {
        match self {
            Self::PytorchStateDict => "weights.pt",
            Self::Torchscript => "weights_torchscript.pt",
            Self::Onnx => "weights.onnx",
            Self::TensorflowSavedModelBundle => "tf_saved_model",
            Self::KerasHdf5 => "weights.h5",
            Self::SafeTensors => "weights.safetensors",
            Self::NumpyArchive => "weights.npz",
        }
    }
}

impl fmt::Display for WeightFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeightFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_loose(s).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(|f| f.as_str()).collect();
            format!("unknown weight format '{s}' (expected one of {})", known.join(", "))
        })
    }
}

/// The manifest record of one weight format.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightEntry {
    /// File reference, relative to the package root.
    pub source: String,
    /// Hex SHA-256 of the referenced file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// The format this entry was converted from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<WeightFormat>,
    /// Version of the framework that produced the weights.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_count: Option<u64>,
}

impl WeightEntry {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            sha256: None,
            parent: None,
            version: None,
            parameter_count: None,
        }
    }
}

/// Ordered preference between weight formats.
///
/// Only listed formats are ever selected. Callers that need a different
/// order for one call pass their own table instead of the default.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct WeightPriority(Vec<WeightFormat>);

impl Default for WeightPriority {
    fn default() -> Self {
        Self(vec![
            WeightFormat::PytorchStateDict,
            WeightFormat::TensorflowSavedModelBundle,
            WeightFormat::Torchscript,
            WeightFormat::Onnx,
            WeightFormat::KerasHdf5,
            WeightFormat::SafeTensors,
            WeightFormat::NumpyArchive,
        ])
    }
}

impl WeightPriority {
    pub fn new(order: Vec<WeightFormat>) -> Self {
        Self(order)
    }

    pub fn formats(&self) -> &[WeightFormat] {
        &self.0
    }

    /// Returns the first format in priority order that is `available` and
    /// accepted by `accept` (e.g. "an engine for it exists").
    pub fn select<'a>(
        &self,
        available: impl IntoIterator<Item = &'a WeightFormat>,
        accept: impl Fn(WeightFormat) -> bool,
    ) -> Option<WeightFormat> {
        let available: Vec<WeightFormat> = available.into_iter().copied().collect();
        self.0
            .iter()
            .copied()
            .find(|f| available.contains(f) && accept(*f))
    }
}
