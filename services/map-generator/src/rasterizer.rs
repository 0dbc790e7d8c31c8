//! External rasterization of base maps and linework.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use map_common::{LightingVariant, MapError, MapResult, Resolution};
use renderer::{Canvas, LayerKind};
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::config::RasterizerConfig;
use crate::scratch::ScratchContext;

/// One image requested from a rasterizer.
#[derive(Debug, Clone, Copy)]
pub struct RasterRequest<'a> {
    pub product: &'a str,
    pub layer: LayerKind,
    pub variant: LightingVariant,
    pub resolution: Resolution,
    pub scratch: &'a ScratchContext,
}

/// Draws a full-canvas layer image at the requested size.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, request: RasterRequest<'_>) -> MapResult<Canvas>;
}

/// Substitute `{variant}`, `{width}` and `{height}` in a path or argument.
pub fn expand_template(template: &str, variant: LightingVariant, resolution: Resolution) -> String {
    template
        .replace("{variant}", variant.name())
        .replace("{width}", &resolution.width.to_string())
        .replace("{height}", &resolution.height.to_string())
}

/// Runs a configured command that writes raw RGB888 pixels to `{output}`.
#[derive(Debug, Clone)]
pub struct CommandRasterizer {
    config: RasterizerConfig,
}

impl CommandRasterizer {
    pub fn new(config: RasterizerConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    fn args(&self, request: &RasterRequest<'_>, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.config
            .args
            .iter()
            .map(|arg| {
                expand_template(arg, request.variant, request.resolution)
                    .replace("{layer}", request.layer.name())
                    .replace("{output}", &output)
            })
            .collect()
    }
}

#[async_trait]
impl Rasterizer for CommandRasterizer {
    #[instrument(skip(self, request), fields(
        product = %request.product,
        layer = request.layer.name(),
        variant = %request.variant,
        resolution = %request.resolution
    ))]
    async fn rasterize(&self, request: RasterRequest<'_>) -> MapResult<Canvas> {
        let output = request.scratch.file(&format!("{}.rgb", request.layer.name()));
        let args = self.args(&request, &output);
        debug!(command = %self.config.command, ?args, "Running rasterizer");

        let mut command = Command::new(&self.config.command);
        command
            .args(&args)
            .current_dir(request.scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let timeout = self.timeout();
        let result = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| MapError::RasterizerTimeout(timeout))?
            .map_err(|e| {
                MapError::Rasterizer(format!("failed to start {}: {}", self.config.command, e))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(MapError::Rasterizer(format!(
                "{} exited with {}: {}",
                self.config.command,
                result.status,
                stderr.trim()
            )));
        }

        let pixels = tokio::fs::read(&output).await.map_err(|e| {
            MapError::Rasterizer(format!("no output at {}: {}", output.display(), e))
        })?;
        Canvas::from_raw(request.resolution.width, request.resolution.height, pixels)
    }
}
