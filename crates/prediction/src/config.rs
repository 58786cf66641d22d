// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Prediction configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! weight_priority = ["torchscript", "onnx", "safetensors"]
//! devices = ["cuda:0", "cpu"]
//! tile = 128
//! halo = 16
//! num_workers = 4
//! parallel_tiles = true
//! fill = "edge"
//! tolerance_decimals = 4
//! enable_profiling = true
//! ```

use crate::{Device, PipelineOptions, PredictionError, TileSpec, Tolerance};
use resource_descr::WeightPriority;
use std::path::Path;
use tensor_core::{AxisId, FillMode};

/// Configuration for prediction runs.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictionConfig {
    /// Weight formats in order of preference.
    #[serde(default)]
    pub weight_priority: WeightPriority,
    /// Devices handed to the engine, e.g. `"cpu"` or `"cuda:0"`.
    #[serde(default = "default_devices")]
    pub devices: Vec<String>,
    /// Default tile size for spatial axes (no tiling when absent).
    pub tile: Option<usize>,
    /// Default halo for spatial axes; defaults to the model's declared halo.
    pub halo: Option<usize>,
    /// Tile worker count (defaults to the number of online CPU cores).
    pub num_workers: Option<usize>,
    /// Whether tiles run on a worker pool.
    #[serde(default)]
    pub parallel_tiles: bool,
    /// Fill used by padding.
    #[serde(default)]
    pub fill: FillMode,
    /// Decimal places output reproduction must agree to.
    #[serde(default = "default_decimals")]
    pub tolerance_decimals: u32,
    /// Whether to record per-call timing metrics.
    #[serde(default = "default_true")]
    pub enable_profiling: bool,
}

fn default_devices() -> Vec<String> {
    vec!["cpu".to_string()]
}

fn default_decimals() -> u32 {
    Tolerance::default().decimals
}

fn default_true() -> bool {
    true
}

impl PredictionConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, PredictionError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PredictionError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, PredictionError> {
        toml::from_str(toml_str)
            .map_err(|e| PredictionError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, PredictionError> {
        toml::to_string_pretty(self)
            .map_err(|e| PredictionError::Config(format!("TOML serialise error: {e}")))
    }

    /// Parses the device strings.
    pub fn parse_devices(&self) -> Result<Vec<Device>, PredictionError> {
        self.devices
            .iter()
            .map(|d| d.parse::<Device>().map_err(PredictionError::Config))
            .collect()
    }

    /// Resolves the number of tile workers.
    pub fn resolve_workers(&self) -> usize {
        self.num_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.tolerance_decimals)
    }

    /// Pipeline options using this configuration's devices and priority.
    pub fn pipeline_options(&self) -> Result<PipelineOptions, PredictionError> {
        Ok(PipelineOptions {
            weight_format: None,
            devices: self.parse_devices()?,
            weight_priority: self.weight_priority.clone(),
            enable_profiling: self.enable_profiling,
        })
    }

    /// A uniform tile specification over `axes`, if a tile size is set.
    ///
    /// Axes without an explicit halo use `declared_halo(axis)`.
    pub fn tile_spec(
        &self,
        axes: &[AxisId],
        declared_halo: impl Fn(&AxisId) -> usize,
    ) -> Option<TileSpec> {
        let tile = self.tile?;
        Some(axes.iter().fold(TileSpec::new(), |spec, axis| {
            let halo = self.halo.unwrap_or_else(|| declared_halo(axis));
            spec.with_axis(axis.clone(), tile, halo)
        }))
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            weight_priority: WeightPriority::default(),
            devices: default_devices(),
            tile: None,
            halo: None,
            num_workers: None,
            parallel_tiles: false,
            fill: FillMode::Zero,
            tolerance_decimals: default_decimals(),
            enable_profiling: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_descr::WeightFormat;

    #[test]
    fn test_default() {
        let c = PredictionConfig::default();
        assert_eq!(c.devices, vec!["cpu"]);
        assert_eq!(c.tolerance().decimals, 4);
        assert_eq!(c.fill, FillMode::Zero);
        assert!(c.enable_profiling);
        assert!(c.tile_spec(&AxisId::parse_compact("yx"), |_| 0).is_none());
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
weight_priority = ["numpy_archive", "safetensors"]
devices = ["cuda:1", "cpu"]
tile = 128
halo = 16
num_workers = 2
parallel_tiles = true
fill = "edge"
tolerance_decimals = 6
enable_profiling = false
"#;
        let c = PredictionConfig::from_toml(toml).unwrap();
        assert_eq!(
            c.weight_priority.formats(),
            &[WeightFormat::NumpyArchive, WeightFormat::SafeTensors]
        );
        assert_eq!(c.parse_devices().unwrap(), vec![Device::Cuda(1), Device::Cpu]);
        assert_eq!(c.resolve_workers(), 2);
        assert!(c.parallel_tiles);
        assert_eq!(c.fill, FillMode::Edge);
        assert_eq!(c.tolerance().decimals, 6);
        assert!(!c.enable_profiling);

        let spec = c.tile_spec(&AxisId::parse_compact("yx"), |_| 4).unwrap();
        assert_eq!(spec.tile.get(&AxisId::from("y")), Some(&128));
        assert_eq!(spec.halo.get(&AxisId::from("x")), Some(&16));
    }

    #[test]
    fn test_declared_halo_is_the_fallback() {
        let c = PredictionConfig {
            tile: Some(64),
            ..Default::default()
        };
        let spec = c.tile_spec(&AxisId::parse_compact("yx"), |_| 4).unwrap();
        assert_eq!(spec.halo.get(&AxisId::from("y")), Some(&4));
    }

    #[test]
    fn test_unknown_key_and_bad_device_rejected() {
        assert!(PredictionConfig::from_toml("strategy = \"greedy\"").is_err());
        let c = PredictionConfig {
            devices: vec!["tpu".into()],
            ..Default::default()
        };
        assert!(c.parse_devices().is_err());
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = PredictionConfig {
            tile: Some(256),
            fill: FillMode::Edge,
            ..Default::default()
        };
        let back = PredictionConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_resolve_workers() {
        let c = PredictionConfig::default();
        assert!(c.resolve_workers() >= 1);
    }
}
