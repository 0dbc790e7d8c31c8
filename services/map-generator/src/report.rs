//! Batch run summary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use map_common::{LightingVariant, MapError, Resolution};
use serde::Serialize;

/// Outcome of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Ok,
    /// Rendered, but from a grid with nothing in it.
    Degraded,
    Failed,
}

/// A unit that produced no artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    pub variant: LightingVariant,
    pub resolution: Resolution,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductReport {
    pub name: String,
    pub status: ProductStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub artifacts: Vec<PathBuf>,
    pub failed_units: Vec<UnitFailure>,
    /// Units never run because the product was aborted.
    pub skipped_units: usize,
}

impl ProductReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ProductStatus::Ok,
            error: None,
            artifacts: Vec::new(),
            failed_units: Vec::new(),
            skipped_units: 0,
        }
    }

    /// A product that failed before any unit ran.
    pub fn failed(name: impl Into<String>, error: &MapError) -> Self {
        let mut report = Self::new(name);
        report.abort(error);
        report
    }

    /// Mark the product failed. The first fatal error is kept.
    pub fn abort(&mut self, error: &MapError) {
        self.status = ProductStatus::Failed;
        self.error.get_or_insert_with(|| error.to_string());
    }

    pub fn record_failure(&mut self, variant: LightingVariant, resolution: Resolution, error: &MapError) {
        self.failed_units.push(UnitFailure {
            variant,
            resolution,
            error: error.to_string(),
        });
    }

    /// Settle the final status once every unit has reported.
    pub fn conclude(&mut self, quiet: bool) {
        if self.status == ProductStatus::Failed {
            return;
        }
        if self.artifacts.is_empty() {
            self.status = ProductStatus::Failed;
            self.error = Some("no unit produced an artifact".into());
        } else if quiet {
            self.status = ProductStatus::Degraded;
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub products: Vec<ProductReport>,
}

impl Default for BatchReport {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchReport {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            products: Vec::new(),
        }
    }

    pub fn push(&mut self, product: ProductReport) {
        self.products.push(product);
    }

    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    pub fn product(&self, name: &str) -> Option<&ProductReport> {
        self.products.iter().find(|p| p.name == name)
    }

    /// True unless some product failed outright. Skipped units alone do not count.
    pub fn is_success(&self) -> bool {
        self.products.iter().all(|p| p.status != ProductStatus::Failed)
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn artifact_count(&self) -> usize {
        self.products.iter().map(|p| p.artifacts.len()).sum()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res() -> Resolution {
        Resolution::new(660, 330)
    }

    #[test]
    fn test_unit_failures_do_not_fail_the_batch() {
        let mut product = ProductReport::new("Aurora");
        product.artifacts.push(PathBuf::from("map-D-660x330-Aurora.bmp"));
        product.record_failure(
            LightingVariant::Day,
            Resolution::new(8000, 4000),
            &MapError::Rasterizer("canvas too large".into()),
        );
        product.conclude(false);

        let mut report = BatchReport::new();
        report.push(product);
        assert_eq!(report.product("Aurora").unwrap().status, ProductStatus::Ok);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_quiet_product_is_degraded() {
        let mut product = ProductReport::new("DRAP");
        product.artifacts.push(PathBuf::from("map-N-660x330-DRAP.bmp"));
        product.conclude(true);
        assert_eq!(product.status, ProductStatus::Degraded);

        let mut report = BatchReport::new();
        report.push(product);
        assert!(report.is_success());
    }

    #[test]
    fn test_fatal_error_sets_exit_code() {
        let mut report = BatchReport::new();
        report.push(ProductReport::failed("MUF", &MapError::EmptyDataset("MUF".into())));
        assert_eq!(report.exit_code(), 1);
        assert!(report.products[0].error.as_ref().unwrap().contains("no usable samples"));
    }

    #[test]
    fn test_no_artifacts_is_failure() {
        let mut product = ProductReport::new("Aurora");
        product.record_failure(LightingVariant::Night, res(), &MapError::Io("disk full".into()));
        product.conclude(false);
        assert_eq!(product.status, ProductStatus::Failed);
    }

    #[test]
    fn test_first_abort_is_kept() {
        let mut product = ProductReport::new("Aurora");
        product.abort(&MapError::InvalidRamp("first".into()));
        product.abort(&MapError::InvalidRamp("second".into()));
        product.conclude(false);
        assert!(product.error.as_ref().unwrap().contains("first"));
    }

    #[test]
    fn test_json_shape() {
        let mut product = ProductReport::new("Aurora");
        product.artifacts.push(PathBuf::from("out/map-D-660x330-Aurora.bmp"));
        product.record_failure(LightingVariant::Day, res(), &MapError::Io("x".into()));
        product.conclude(false);
        let mut report = BatchReport::new();
        report.push(product);
        report.finish();

        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        let p = &json["products"][0];
        assert_eq!(p["status"], "ok");
        assert_eq!(p["failed_units"][0]["variant"], "day");
        assert_eq!(p["failed_units"][0]["resolution"], "660x330");
        assert!(p.get("error").is_none());
        assert!(json["started_at"].as_str().unwrap().ends_with('Z'));
    }
}
