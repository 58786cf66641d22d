// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for full-image, tiled and parallel tiled prediction.

#[path = "../tests/common/mod.rs"]
mod common;

use common::{conv_package, image, PackageOptions};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use prediction::{
    tile_apply, tile_apply_parallel, CancellationToken, ConvolutionEngine, PipelineOptions,
    PredictionPipeline, TileSpec,
};
use tensor_core::AxisId;

fn bench_plan_axis(c: &mut Criterion) {
    c.bench_function("plan_axis_4096", |b| {
        b.iter(|| prediction::plan_axis(black_box(4096), 112, 8).unwrap())
    });
}

fn bench_tiled_prediction(c: &mut Criterion) {
    let fx = conv_package(PackageOptions {
        kernel_size: 3,
        halo: 1,
        ..Default::default()
    });
    let engine = ConvolutionEngine::new();
    let options = PipelineOptions::default();
    let token = CancellationToken::new();
    let x = image(512, 512);
    let spec = TileSpec::uniform(&AxisId::parse_compact("yx"), 112, 8);

    let mut group = c.benchmark_group("predict_512");
    group.sample_size(20);

    group.bench_function("full", |b| {
        let mut pipeline = PredictionPipeline::open(&fx.descriptor, &engine, &options).unwrap();
        b.iter(|| pipeline.apply(black_box(std::slice::from_ref(&x))).unwrap())
    });

    group.bench_function("tiled", |b| {
        let mut pipeline = PredictionPipeline::open(&fx.descriptor, &engine, &options).unwrap();
        b.iter(|| tile_apply(&mut pipeline, black_box(&x), Some(&spec), &token).unwrap())
    });

    for workers in [2usize, 4] {
        group.bench_with_input(BenchmarkId::new("parallel", workers), &workers, |b, &w| {
            b.iter(|| {
                tile_apply_parallel(&fx.descriptor, &engine, &options, black_box(&x), Some(&spec), &token, w)
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_plan_axis, bench_tiled_prediction);
criterion_main!(benches);
