// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Check results and the test report.

use resource_descr::WeightFormat;
use std::fmt;

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// The check ran and found nothing wrong.
    Passed,
    /// The check ran and found a problem.
    Failed,
    /// The check could not run.
    Errored,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Passed => "PASS",
            Self::Failed => "FAIL",
            Self::Errored => "ERROR",
        };
        f.pad(s)
    }
}

/// One named check, optionally scoped to a weight format.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CheckResult {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_format: Option<WeightFormat>,
    pub status: CheckStatus,
    /// Largest absolute output deviation, for numeric checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckResult {
    fn with_status(name: &str, format: Option<WeightFormat>, status: CheckStatus) -> Self {
        Self {
            name: name.to_string(),
            weight_format: format,
            status,
            deviation: None,
            detail: None,
        }
    }

    pub fn passed(name: &str, format: Option<WeightFormat>) -> Self {
        Self::with_status(name, format, CheckStatus::Passed)
    }

    pub fn failed(name: &str, format: Option<WeightFormat>, detail: impl Into<String>) -> Self {
        Self::with_status(name, format, CheckStatus::Failed).with_detail(detail)
    }

    pub fn errored(name: &str, format: Option<WeightFormat>, detail: impl Into<String>) -> Self {
        Self::with_status(name, format, CheckStatus::Errored).with_detail(detail)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_deviation(mut self, deviation: f64) -> Self {
        self.deviation = Some(deviation);
        self
    }

    pub fn is_passed(&self) -> bool {
        self.status == CheckStatus::Passed
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>5}] {}", self.status, self.name)?;
        if let Some(format) = self.weight_format {
            write!(f, " ({format})")?;
        }
        if let Some(d) = self.deviation {
            write!(f, ", max deviation {d:e}")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

/// All checks run against one package.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TestReport {
    pub package: String,
    /// Decimal places the numeric checks used.
    pub decimals: u32,
    pub checks: Vec<CheckResult>,
}

impl TestReport {
    /// Whether every check passed.
    pub fn passed(&self) -> bool {
        !self.checks.is_empty() && self.checks.iter().all(CheckResult::is_passed)
    }

    /// Checks that did not pass.
    pub fn problems(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.is_passed())
    }

    pub fn summary(&self) -> String {
        let mut s = format!("Test report for '{}':\n", self.package);
        for check in &self.checks {
            s.push_str(&format!("  {check}\n"));
        }
        let failed = self.problems().count();
        s.push_str(&format!(
            "{} of {} checks passed{}",
            self.checks.len() - failed,
            self.checks.len(),
            if self.passed() { "" } else { " (FAILED)" }
        ));
        s
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
