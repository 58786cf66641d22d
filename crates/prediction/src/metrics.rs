// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Prediction profiling metrics.
//!
//! [`PredictionMetrics`] collects per-call timings of a pipeline: how long
//! preprocessing, the engine call and postprocessing took. Tiled runs record
//! one call per tile.

use std::time::Duration;

/// Metrics for a single `apply` call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CallMetrics {
    pub preprocess_duration: Duration,
    pub inference_duration: Duration,
    pub postprocess_duration: Duration,
}

impl CallMetrics {
    pub fn total(&self) -> Duration {
        self.preprocess_duration + self.inference_duration + self.postprocess_duration
    }
}

/// Aggregate metrics for a pipeline's lifetime.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PredictionMetrics {
    /// Time spent opening the engine session.
    pub open_duration: Duration,
    pub total_preprocess_duration: Duration,
    pub total_inference_duration: Duration,
    pub total_postprocess_duration: Duration,
    /// Per-call metrics, in call order.
    pub calls: Vec<CallMetrics>,
}

impl PredictionMetrics {
    pub fn new(open_duration: Duration) -> Self {
        Self {
            open_duration,
            ..Default::default()
        }
    }

    /// Records metrics for a single call.
    pub fn record_call(&mut self, preprocess: Duration, inference: Duration, postprocess: Duration) {
        self.total_preprocess_duration += preprocess;
        self.total_inference_duration += inference;
        self.total_postprocess_duration += postprocess;
        self.calls.push(CallMetrics {
            preprocess_duration: preprocess,
            inference_duration: inference,
            postprocess_duration: postprocess,
        });
    }

    /// Mean wall-clock time per call.
    pub fn mean_call_duration(&self) -> Duration {
        if self.calls.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.calls.iter().map(CallMetrics::total).sum();
        total / self.calls.len() as u32
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let total = self.total_preprocess_duration
            + self.total_inference_duration
            + self.total_postprocess_duration;
        let infer_pct = if total.as_secs_f64() > 0.0 {
            self.total_inference_duration.as_secs_f64() / total.as_secs_f64() * 100.0
        } else {
            0.0
        };

        format!(
            "Prediction: {} calls, {:.2}ms open, {:.2}ms preprocess, \
             {:.2}ms inference ({:.0}%), {:.2}ms postprocess, {:.2}ms/call",
            self.calls.len(),
            self.open_duration.as_secs_f64() * 1000.0,
            self.total_preprocess_duration.as_secs_f64() * 1000.0,
            self.total_inference_duration.as_secs_f64() * 1000.0,
            infer_pct,
            self.total_postprocess_duration.as_secs_f64() * 1000.0,
            self.mean_call_duration().as_secs_f64() * 1000.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metrics() {
        let m = PredictionMetrics::new(Duration::from_millis(3));
        assert_eq!(m.mean_call_duration(), Duration::ZERO);
        assert!(m.summary().contains("0 calls"));
    }

    #[test]
    fn test_record_calls() {
        let mut m = PredictionMetrics::default();
        m.record_call(Duration::from_millis(1), Duration::from_millis(10), Duration::from_millis(1));
        m.record_call(Duration::from_millis(3), Duration::from_millis(6), Duration::from_millis(3));

        assert_eq!(m.calls.len(), 2);
        assert_eq!(m.total_inference_duration, Duration::from_millis(16));
        assert_eq!(m.mean_call_duration(), Duration::from_millis(12));
        let s = m.summary();
        assert!(s.contains("Prediction:"));
        assert!(s.contains("2 calls"));
    }
}
