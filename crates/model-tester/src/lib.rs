// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-tester
//!
//! Certifies a model package: validates its manifest and, per weight
//! format, checks the weight hash, builds a prediction pipeline, sanity
//! checks shapes and reproduces the stored test outputs within a decimal
//! tolerance. Results are collected into a [`TestReport`].

mod report;
mod tester;

pub use report::{CheckResult, CheckStatus, TestReport};
pub use tester::{
    ModelTester, MANIFEST_VALIDATION, PACKAGE_LOAD, PIPELINE_CONSTRUCTION, REPRODUCE_OUTPUTS,
    SHAPE_FIT, WEIGHT_HASH,
};
