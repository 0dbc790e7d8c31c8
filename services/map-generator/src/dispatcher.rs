//! Variant dispatcher.
//!
//! Each product is prepared once, then every (variant, resolution) unit runs
//! on a bounded pool. A unit-scoped failure skips that unit only. A
//! batch-scoped failure stops the product from scheduling further units.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use map_common::{ErrorScope, LightingVariant, MapError, MapResult, Resolution};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use crate::config::{GeneratorConfig, ProductConfig};
use crate::output::write_artifacts;
use crate::product::PreparedProduct;
use crate::rasterizer::{CommandRasterizer, Rasterizer};
use crate::report::{BatchReport, ProductReport};
use crate::scratch::ScratchContext;

/// Run blocking work off the async workers.
pub(crate) async fn run_blocking<T, F>(f: F) -> MapResult<T>
where
    F: FnOnce() -> MapResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MapError::Worker(e.to_string()))?
}

/// Drives a whole batch run.
pub struct Dispatcher {
    config: Arc<GeneratorConfig>,
    rasterizer: Option<Arc<dyn Rasterizer>>,
}

impl Dispatcher {
    /// Dispatcher using the configured external rasterizer, if any.
    pub fn new(config: GeneratorConfig) -> Self {
        let rasterizer = config
            .rasterizer
            .clone()
            .map(|c| Arc::new(CommandRasterizer::new(c)) as Arc<dyn Rasterizer>);
        Self {
            config: Arc::new(config),
            rasterizer,
        }
    }

    /// Replace the rasterizer.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Render every configured product.
    pub async fn run(&self) -> BatchReport {
        let mut report = BatchReport::new();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));

        info!(
            products = self.config.products.len(),
            variants = self.config.variants.len(),
            resolutions = self.config.resolutions.len(),
            concurrency = self.config.concurrency,
            "Starting batch"
        );

        for product in &self.config.products {
            report.push(self.run_product(product, semaphore.clone()).await);
        }

        report.finish();
        info!(
            artifacts = report.artifact_count(),
            success = report.is_success(),
            "Batch finished"
        );
        report
    }

    #[instrument(skip(self, config, semaphore), fields(product = %config.name))]
    async fn run_product(&self, config: &ProductConfig, semaphore: Arc<Semaphore>) -> ProductReport {
        let owned = config.clone();
        let prepared = match run_blocking(move || PreparedProduct::prepare(&owned)).await {
            Ok(prepared) => Arc::new(prepared),
            Err(e) => {
                error!(error = %e, "Product preparation failed, skipping all units");
                return ProductReport::failed(&config.name, &e);
            }
        };

        let abort = Arc::new(AtomicBool::new(false));
        let mut units = JoinSet::new();

        for &variant in &self.config.variants {
            for &resolution in &self.config.resolutions {
                let unit = Unit {
                    product: prepared.clone(),
                    variant,
                    resolution,
                    output_dir: self.config.output_dir.clone(),
                    scratch_root: self.config.scratch_dir.clone(),
                    rasterizer: self.rasterizer.clone(),
                };
                let semaphore = semaphore.clone();
                let abort = abort.clone();

                units.spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return (variant, resolution, UnitOutcome::Skipped);
                    };
                    if abort.load(Ordering::Acquire) {
                        return (variant, resolution, UnitOutcome::Skipped);
                    }
                    let result = unit.run().await;
                    if let Err(e) = &result {
                        if e.scope() == ErrorScope::Batch {
                            abort.store(true, Ordering::Release);
                        }
                    }
                    (variant, resolution, UnitOutcome::Finished(result))
                });
            }
        }

        let mut report = ProductReport::new(prepared.name());
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((variant, resolution, UnitOutcome::Finished(Ok(paths)))) => {
                    info!(variant = %variant, resolution = %resolution, "Unit complete");
                    report.artifacts.extend(paths);
                }
                Ok((variant, resolution, UnitOutcome::Finished(Err(e)))) => {
                    report.record_failure(variant, resolution, &e);
                    match e.scope() {
                        ErrorScope::Unit => {
                            warn!(
                                variant = %variant,
                                resolution = %resolution,
                                error = %e,
                                "Unit failed, continuing with the rest"
                            );
                        }
                        ErrorScope::Batch => {
                            error!(
                                variant = %variant,
                                resolution = %resolution,
                                error = %e,
                                "Unit hit a fatal error, aborting product"
                            );
                            report.abort(&e);
                        }
                    }
                }
                Ok((_, _, UnitOutcome::Skipped)) => report.skipped_units += 1,
                Err(e) => {
                    error!(error = %e, "Unit task panicked");
                    report.abort(&MapError::Worker(e.to_string()));
                }
            }
        }

        report.artifacts.sort();
        report.conclude(prepared.is_quiet());
        info!(
            status = ?report.status,
            artifacts = report.artifacts.len(),
            failed = report.failed_units.len(),
            skipped = report.skipped_units,
            "Product finished"
        );
        report
    }
}

enum UnitOutcome {
    Finished(MapResult<Vec<PathBuf>>),
    Skipped,
}

/// One (product, variant, resolution) job.
struct Unit {
    product: Arc<PreparedProduct>,
    variant: LightingVariant,
    resolution: Resolution,
    output_dir: PathBuf,
    scratch_root: PathBuf,
    rasterizer: Option<Arc<dyn Rasterizer>>,
}

impl Unit {
    #[instrument(skip(self), fields(
        product = %self.product.name(),
        variant = %self.variant,
        resolution = %self.resolution
    ))]
    async fn run(self) -> MapResult<Vec<PathBuf>> {
        let scratch = ScratchContext::new(
            &self.scratch_root,
            self.product.name(),
            self.variant,
            self.resolution,
        )?;
        let layers = self
            .product
            .load_layers(self.variant, self.resolution, &scratch, self.rasterizer.as_deref())
            .await?;

        let Unit {
            product,
            variant,
            resolution,
            output_dir,
            ..
        } = self;
        let paths = run_blocking(move || {
            let bitmap = product.render(variant, resolution, layers)?;
            write_artifacts(&output_dir, variant, resolution, product.name(), &bitmap)
        })
        .await?;

        drop(scratch);
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_blocking_returns_value() {
        let value = run_blocking(|| Ok(21 * 2)).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_run_blocking_panic_is_worker_error() {
        let err = run_blocking::<(), _>(|| panic!("boom")).await.unwrap_err();
        assert!(matches!(err, MapError::Worker(_)));
        assert_eq!(err.scope(), ErrorScope::Unit);
    }
}
