// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Padding and tiling against a real convolution model.

mod common;

use common::{conv_package, gradient, image, PackageOptions, RecordingEngine};
use prediction::{
    predict_with_padding, tile_apply, tile_apply_parallel, CancellationToken, ConvolutionEngine,
    PaddingSpec, PipelineOptions, PredictionError, PredictionPipeline, TileSpec,
};
use tensor_core::{AxisId, FillMode};

fn yx() -> Vec<AxisId> {
    AxisId::parse_compact("yx")
}

#[test]
fn test_padded_prediction_restores_extent() {
    let fx = conv_package(PackageOptions::default());
    let engine = RecordingEngine::default();
    let mut pipeline =
        PredictionPipeline::open(&fx.descriptor, &engine, &PipelineOptions::default()).unwrap();

    let x = image(100, 100);
    let spec = PaddingSpec::for_input(&fx.descriptor.inputs()[0], &x, FillMode::Zero).unwrap();
    let out = predict_with_padding(&mut pipeline, &x, &spec).unwrap();

    assert_eq!(engine.runs(), vec![vec![1, 1, 112, 112]]);
    assert_eq!(out[0].dims(), &[1, 1, 100, 100]);
}

#[test]
fn test_padding_fill_stays_out_of_sample_statistics() {
    let normalizing = conv_package(PackageOptions {
        with_processing: false,
        preprocessing: Some(serde_json::json!([
            { "name": "zero_mean_unit_variance", "kwargs": {} }
        ])),
        ..Default::default()
    });
    let plain = conv_package(PackageOptions {
        with_processing: false,
        ..Default::default()
    });
    let engine = ConvolutionEngine::new();
    let options = PipelineOptions::default();

    let x = gradient(100, 100);
    let spec = PaddingSpec::for_input(&normalizing.descriptor.inputs()[0], &x, FillMode::Zero)
        .unwrap();
    let mut pipeline = PredictionPipeline::open(&normalizing.descriptor, &engine, &options).unwrap();
    let out = predict_with_padding(&mut pipeline, &x, &spec).unwrap().remove(0);

    let mut normalized = x.clone();
    tensor_core::ops::zero_mean_unit_variance(&mut normalized, None, 1e-6).unwrap();
    let mut reference = PredictionPipeline::open(&plain.descriptor, &engine, &options).unwrap();
    let expected = predict_with_padding(&mut reference, &normalized, &spec)
        .unwrap()
        .remove(0);

    assert!(out.max_abs_diff(&expected).unwrap() < 1e-5);
}

#[test]
fn test_four_tiles_for_256_image() {
    let fx = conv_package(PackageOptions::default());
    let engine = RecordingEngine::default();
    let mut pipeline =
        PredictionPipeline::open(&fx.descriptor, &engine, &PipelineOptions::default()).unwrap();

    let spec = TileSpec::uniform(&yx(), 128, 16);
    let out = tile_apply(&mut pipeline, &image(256, 256), Some(&spec), &CancellationToken::new())
        .unwrap();

    assert_eq!(out.dims(), &[1, 1, 256, 256]);
    assert_eq!(engine.runs(), vec![vec![1, 1, 160, 160]; 4]);
}

#[test]
fn test_tiled_matches_full_image() {
    let fx = conv_package(PackageOptions::default());
    let engine = ConvolutionEngine::new();
    let mut pipeline =
        PredictionPipeline::open(&fx.descriptor, &engine, &PipelineOptions::default()).unwrap();

    let x = image(256, 256);
    let full = pipeline.apply(&[x.clone()]).unwrap().remove(0);
    let spec = TileSpec::uniform(&yx(), 64, 8);
    let tiled = tile_apply(&mut pipeline, &x, Some(&spec), &CancellationToken::new()).unwrap();

    assert!(tiled.max_abs_diff(&full).unwrap() < 1e-5);
}

#[test]
fn test_tiled_matches_full_image_with_sample_statistics() {
    let steps = [
        serde_json::json!([{ "name": "zero_mean_unit_variance", "kwargs": {} }]),
        serde_json::json!([{
            "name": "scale_range",
            "kwargs": { "min_percentile": 1.0, "max_percentile": 99.0 }
        }]),
    ];
    for preprocessing in steps {
        let fx = conv_package(PackageOptions {
            preprocessing: Some(preprocessing.clone()),
            ..Default::default()
        });
        let engine = ConvolutionEngine::new();
        let options = PipelineOptions::default();
        let mut pipeline = PredictionPipeline::open(&fx.descriptor, &engine, &options).unwrap();

        let x = gradient(256, 256);
        let full = pipeline.apply(&[x.clone()]).unwrap().remove(0);
        let spec = TileSpec::uniform(&yx(), 64, 8);
        let token = CancellationToken::new();
        let tiled = tile_apply(&mut pipeline, &x, Some(&spec), &token).unwrap();
        let parallel =
            tile_apply_parallel(&fx.descriptor, &engine, &options, &x, Some(&spec), &token, 2)
                .unwrap();

        let diff = tiled.max_abs_diff(&full).unwrap();
        assert!(diff < 1e-5, "{preprocessing}: tiled deviates by {diff}");
        assert_eq!(parallel.max_abs_diff(&tiled).unwrap(), 0.0);
    }
}

#[test]
fn test_preprocess_then_apply_preprocessed_equals_apply() {
    let fx = conv_package(PackageOptions {
        preprocessing: Some(serde_json::json!([
            { "name": "zero_mean_unit_variance", "kwargs": {} }
        ])),
        ..Default::default()
    });
    let engine = ConvolutionEngine::new();
    let mut pipeline =
        PredictionPipeline::open(&fx.descriptor, &engine, &PipelineOptions::default()).unwrap();

    let x = gradient(64, 48);
    let full = pipeline.apply(&[x.clone()]).unwrap().remove(0);
    let prepared = pipeline.preprocess(&[x]).unwrap();
    let split = pipeline.apply_preprocessed(&prepared).unwrap().remove(0);
    assert_eq!(split.max_abs_diff(&full).unwrap(), 0.0);
}

#[test]
fn test_small_halo_differs_from_full_image() {
    let fx = conv_package(PackageOptions::default());
    let engine = ConvolutionEngine::new();
    let mut pipeline =
        PredictionPipeline::open(&fx.descriptor, &engine, &PipelineOptions::default()).unwrap();

    let x = image(128, 128);
    let full = pipeline.apply(&[x.clone()]).unwrap().remove(0);
    // 64 + 2 * 0 is a valid window, but a 5x5 kernel needs a halo of 2.
    let spec = TileSpec::uniform(&yx(), 64, 0);
    let tiled = tile_apply(&mut pipeline, &x, Some(&spec), &CancellationToken::new()).unwrap();

    assert!(tiled.max_abs_diff(&full).unwrap() > 1e-3);
}

#[test]
fn test_parallel_equals_sequential() {
    let fx = conv_package(PackageOptions::default());
    let engine = RecordingEngine::default();
    let options = PipelineOptions::default();
    let x = image(200, 136);
    let spec = TileSpec::uniform(&yx(), 48, 8);
    let token = CancellationToken::new();

    let sequential = {
        let mut pipeline = PredictionPipeline::open(&fx.descriptor, &engine, &options).unwrap();
        tile_apply(&mut pipeline, &x, Some(&spec), &token).unwrap()
    };
    let parallel =
        tile_apply_parallel(&fx.descriptor, &engine, &options, &x, Some(&spec), &token, 3).unwrap();

    assert_eq!(parallel.dims(), &[1, 1, 200, 136]);
    assert_eq!(parallel.max_abs_diff(&sequential).unwrap(), 0.0);
    assert_eq!(engine.opened(), engine.closed());
}

#[test]
fn test_short_axes_are_prepadded() {
    let fx = conv_package(PackageOptions::default());
    let engine = RecordingEngine::default();
    let mut pipeline =
        PredictionPipeline::open(&fx.descriptor, &engine, &PipelineOptions::default()).unwrap();

    // Window 48 + 2 * 8 = 64 exceeds the 40-pixel axes.
    let spec = TileSpec::uniform(&yx(), 48, 8);
    let out = tile_apply(&mut pipeline, &image(40, 40), Some(&spec), &CancellationToken::new())
        .unwrap();

    assert_eq!(out.dims(), &[1, 1, 40, 40]);
    assert_eq!(engine.runs(), vec![vec![1, 1, 64, 64]]);
}

#[test]
fn test_derived_tiling() {
    let fx = conv_package(PackageOptions::default());
    let engine = RecordingEngine::default();
    let mut pipeline =
        PredictionPipeline::open(&fx.descriptor, &engine, &PipelineOptions::default()).unwrap();

    let x = image(320, 96);
    let spec = TileSpec::for_model(&fx.descriptor, &x).unwrap();
    assert_eq!(spec.window_of(&"y".into()), Some(256));
    assert_eq!(spec.window_of(&"x".into()), Some(96));
    assert_eq!(spec.halo_of(&"y".into()), 2);

    let out = tile_apply(&mut pipeline, &x, None, &CancellationToken::new()).unwrap();
    assert_eq!(out.dims(), &[1, 1, 320, 96]);
    assert_eq!(engine.runs().len(), 2);
}

#[test]
fn test_invalid_window_size() {
    let fx = conv_package(PackageOptions::default());
    let engine = ConvolutionEngine::new();
    let mut pipeline =
        PredictionPipeline::open(&fx.descriptor, &engine, &PipelineOptions::default()).unwrap();

    // 100 + 2 * 3 is not a multiple of 16.
    let spec = TileSpec::uniform(&yx(), 100, 3);
    assert!(matches!(
        tile_apply(&mut pipeline, &image(256, 256), Some(&spec), &CancellationToken::new()),
        Err(PredictionError::InvalidTiling(_))
    ));

    let spec = TileSpec::new().with_axis("c", 16, 0);
    assert!(matches!(
        tile_apply(&mut pipeline, &image(64, 64), Some(&spec), &CancellationToken::new()),
        Err(PredictionError::InvalidTiling(_))
    ));
}

#[test]
fn test_cancelled_tiling_discards_output() {
    let fx = conv_package(PackageOptions::default());
    let engine = RecordingEngine::default();
    let mut pipeline =
        PredictionPipeline::open(&fx.descriptor, &engine, &PipelineOptions::default()).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let spec = TileSpec::uniform(&yx(), 128, 16);
    assert!(matches!(
        tile_apply(&mut pipeline, &image(256, 256), Some(&spec), &token),
        Err(PredictionError::Cancelled)
    ));
    assert!(engine.runs().is_empty());

    assert!(matches!(
        tile_apply_parallel(
            &fx.descriptor,
            &engine,
            &PipelineOptions::default(),
            &image(256, 256),
            Some(&spec),
            &token,
            2
        ),
        Err(PredictionError::Cancelled)
    ));
}
