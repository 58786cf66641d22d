// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Certification of hand-written packages.

use model_tester::{
    CheckStatus, ModelTester, TestReport, MANIFEST_VALIDATION, PACKAGE_LOAD,
    PIPELINE_CONSTRUCTION, REPRODUCE_OUTPUTS, SHAPE_FIT, WEIGHT_HASH,
};
use ndarray::{ArrayD, IxDyn};
use prediction::{ConvolutionEngine, Tolerance};
use resource_descr::hash::sha256_path;
use resource_descr::{ResourceDescriptor, WeightFormat};
use std::path::Path;
use tensor_core::io::write_npy_tensor;
use tensor_core::{AxisId, Tensor};
use weight_converter::native::{write_npz, write_safetensors, TensorMap, TypedArray};

const GAIN: f32 = 3.0;

fn input() -> Tensor {
    Tensor::from_fn(AxisId::parse_compact("bcyx"), &[1, 1, 16, 16], |i| {
        (i[2] * 16 + i[3]) as f32 / 256.0
    })
    .unwrap()
}

/// A 1x1 convolution package multiplying by [`GAIN`], shipped as
/// safetensors and npz. `perturb` is added to the stored test output.
fn write_package(root: &Path, perturb: f32) {
    let mut tensors = TensorMap::new();
    tensors.insert(
        "kernel".into(),
        TypedArray::F32(ArrayD::from_shape_vec(IxDyn(&[1, 1, 1, 1]), vec![GAIN]).unwrap()),
    );
    write_safetensors(&tensors, &root.join("weights.safetensors")).unwrap();
    write_npz(&tensors, &root.join("weights.npz")).unwrap();
    let hash = sha256_path(&root.join("weights.safetensors")).unwrap();

    let x = input();
    let mut y = x.clone();
    y.map_inplace(|v| v * GAIN + perturb);
    write_npy_tensor(&root.join("test_input_0.npy"), &x).unwrap();
    write_npy_tensor(&root.join("test_output_0.npy"), &y).unwrap();

    let spatial = serde_json::json!({ "min": 8, "step": 8 });
    let manifest = serde_json::json!({
        "name": "gain-fixture",
        "description": "pixelwise gain",
        "authors": [{ "name": "Fixture" }],
        "license": "MIT",
        "inputs": [{
            "name": "raw",
            "axes": [
                { "id": "b", "type": "batch", "size": 1 },
                { "id": "c", "type": "channel", "size": 1 },
                { "id": "y", "type": "space", "size": spatial },
                { "id": "x", "type": "space", "size": spatial }
            ]
        }],
        "outputs": [{
            "name": "scaled",
            "axes": [
                { "id": "b", "type": "batch", "size": 1 },
                { "id": "c", "type": "channel", "size": 1 },
                { "id": "y", "type": "space", "size": { "tensor": "raw", "axis": "y" } },
                { "id": "x", "type": "space", "size": { "tensor": "raw", "axis": "x" } }
            ]
        }],
        "weights": {
            "safetensors": { "source": "weights.safetensors", "sha256": hash },
            "numpy_archive": { "source": "weights.npz" }
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

fn package(perturb: f32) -> (tempfile::TempDir, ResourceDescriptor) {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), perturb);
    let descriptor = ResourceDescriptor::load(dir.path()).unwrap();
    (dir, descriptor)
}

fn status(report: &TestReport, name: &str, format: WeightFormat) -> CheckStatus {
    report
        .checks
        .iter()
        .find(|c| c.name == name && c.weight_format == Some(format))
        .unwrap_or_else(|| panic!("no '{name}' check for {format}"))
        .status
}

#[test]
fn test_exact_package_passes_every_check() {
    let (_dir, descriptor) = package(0.0);
    let engine = ConvolutionEngine::default();
    let report = ModelTester::new(&engine).test(&descriptor, None, Tolerance::new(4));

    assert!(report.passed(), "{}", report.summary());
    // Validation plus four checks for each of the two formats.
    assert_eq!(report.checks.len(), 9);
    assert_eq!(report.checks[0].name, MANIFEST_VALIDATION);
    assert_eq!(report.package, "gain-fixture");
}

#[test]
fn test_missing_hash_passes_with_detail() {
    let (_dir, descriptor) = package(0.0);
    let engine = ConvolutionEngine::default();
    let report = ModelTester::new(&engine).test(
        &descriptor,
        Some(&[WeightFormat::NumpyArchive]),
        Tolerance::default(),
    );
    let check = report.checks.iter().find(|c| c.name == WEIGHT_HASH).unwrap();
    assert_eq!(check.status, CheckStatus::Passed);
    assert!(check.detail.as_deref().unwrap_or("").contains("no hash"));
}

#[test]
fn test_small_perturbation_depends_on_decimals() {
    let (_dir, descriptor) = package(1e-3);
    let engine = ConvolutionEngine::default();
    let tester = ModelTester::new(&engine);
    let formats = [WeightFormat::SafeTensors];

    let strict = tester.test(&descriptor, Some(&formats), Tolerance::new(6));
    assert!(!strict.passed());
    let check = strict.checks.iter().find(|c| c.name == REPRODUCE_OUTPUTS).unwrap();
    assert_eq!(check.status, CheckStatus::Failed);
    let deviation = check.deviation.unwrap();
    assert!(deviation >= 0.9e-3 && deviation < 1.1e-3, "{deviation}");
    assert_eq!(strict.problems().count(), 1);

    let loose = tester.test(&descriptor, Some(&formats), Tolerance::new(2));
    assert!(loose.passed(), "{}", loose.summary());
}

#[test]
fn test_tampered_weights_fail_hash_but_other_checks_run() {
    let (dir, descriptor) = package(0.0);
    std::fs::write(dir.path().join("weights.safetensors"), b"not a tensor file").unwrap();

    let engine = ConvolutionEngine::default();
    let report = ModelTester::new(&engine).test(
        &descriptor,
        Some(&[WeightFormat::SafeTensors]),
        Tolerance::default(),
    );
    let format = WeightFormat::SafeTensors;
    assert_eq!(status(&report, WEIGHT_HASH, format), CheckStatus::Failed);
    assert_eq!(status(&report, PIPELINE_CONSTRUCTION, format), CheckStatus::Failed);
    assert_eq!(status(&report, SHAPE_FIT, format), CheckStatus::Errored);
    assert_eq!(status(&report, REPRODUCE_OUTPUTS, format), CheckStatus::Errored);
    assert_eq!(report.checks.len(), 5);
}

#[test]
fn test_format_not_in_package_errors() {
    let (_dir, descriptor) = package(0.0);
    let engine = ConvolutionEngine::default();
    let report = ModelTester::new(&engine).test(
        &descriptor,
        Some(&[WeightFormat::Onnx]),
        Tolerance::default(),
    );
    assert_eq!(status(&report, WEIGHT_HASH, WeightFormat::Onnx), CheckStatus::Errored);
    assert_eq!(
        status(&report, PIPELINE_CONSTRUCTION, WeightFormat::Onnx),
        CheckStatus::Failed
    );
    assert!(!report.passed());
}

#[test]
fn test_unloadable_package_reports_load_failure() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("manifest.json"), "{ not json").unwrap();

    let engine = ConvolutionEngine::default();
    let report = ModelTester::new(&engine).test_path(dir.path(), None, Tolerance::default());
    assert_eq!(report.checks.len(), 1);
    assert_eq!(report.checks[0].name, PACKAGE_LOAD);
    assert_eq!(report.checks[0].status, CheckStatus::Failed);
    assert!(!report.passed());
}

#[test]
fn test_invalid_manifest_fails_validation_check() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), 0.0);
    let path = dir.path().join("manifest.json");
    let mut manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    manifest["weights"] = serde_json::json!({});
    std::fs::write(&path, manifest.to_string()).unwrap();

    let engine = ConvolutionEngine::default();
    let report = ModelTester::new(&engine).test_path(dir.path(), None, Tolerance::default());
    assert_eq!(report.checks.len(), 1);
    assert_eq!(report.checks[0].name, MANIFEST_VALIDATION);
    assert_eq!(report.checks[0].status, CheckStatus::Failed);
    assert!(report.checks[0].detail.as_deref().unwrap().contains("weight"));
}

#[test]
fn test_tampered_before_load_still_checks_hashes() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), 0.0);
    std::fs::write(dir.path().join("weights.safetensors"), b"not a tensor file").unwrap();

    let engine = ConvolutionEngine::default();
    let report = ModelTester::new(&engine).test_path(dir.path(), None, Tolerance::default());

    assert_eq!(report.checks[0].name, MANIFEST_VALIDATION);
    assert_eq!(report.checks[0].status, CheckStatus::Passed);
    assert_eq!(report.checks[1].name, PACKAGE_LOAD);
    assert_eq!(report.checks[1].status, CheckStatus::Failed);

    let safetensors = WeightFormat::SafeTensors;
    assert_eq!(status(&report, WEIGHT_HASH, safetensors), CheckStatus::Failed);
    assert_eq!(status(&report, WEIGHT_HASH, WeightFormat::NumpyArchive), CheckStatus::Passed);
    for format in [safetensors, WeightFormat::NumpyArchive] {
        assert_eq!(status(&report, PIPELINE_CONSTRUCTION, format), CheckStatus::Errored);
        assert_eq!(status(&report, REPRODUCE_OUTPUTS, format), CheckStatus::Errored);
    }
    assert_eq!(report.checks.len(), 2 + 2 * 4);
    assert!(!report.passed());
}

#[test]
fn test_path_on_valid_package_passes() {
    let dir = tempfile::tempdir().unwrap();
    write_package(dir.path(), 0.0);
    let engine = ConvolutionEngine::default();
    let report = ModelTester::new(&engine).test_path(dir.path(), None, Tolerance::default());
    assert!(report.passed(), "{}", report.summary());
    assert!(report.checks.iter().all(|c| c.name != PACKAGE_LOAD));
}

#[test]
fn test_report_serializes() {
    let (_dir, descriptor) = package(0.0);
    let engine = ConvolutionEngine::default();
    let report = ModelTester::new(&engine).test(&descriptor, None, Tolerance::default());
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["package"], "gain-fixture");
    assert_eq!(json["checks"][0]["status"], "passed");
}
