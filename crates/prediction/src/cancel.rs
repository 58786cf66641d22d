// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Cooperative cancellation.

use crate::PredictionError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag checked between tiles and between batch items.
///
/// Clones observe the same flag. Cancelling never interrupts a running
/// engine call; the current item finishes and its result is discarded.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns [`PredictionError::Cancelled`] once cancelled.
    pub fn check(&self) -> Result<(), PredictionError> {
        if self.is_cancelled() {
            Err(PredictionError::Cancelled)
        } else {
            Ok(())
        }
    }
}
