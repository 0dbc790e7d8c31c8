//! Per-product preparation and the per-unit render.
//!
//! Preparation (grid and ramp) happens once per product. Every
//! (variant, resolution) unit then reads the shared result and produces one
//! device bitmap.

use std::path::Path;

use gridding::project_to_canvas;
use map_common::{Grid, LightingVariant, MapError, MapResult, Resolution, SampleSet};
use renderer::{
    colorize, decode_bmp_v4, encode_bmp_v4, read_artifact, Canvas, ColorRamp, CompositeLayer,
    KeyColor, LayerKind, LayerStack,
};
use tracing::{debug, info, instrument};

use crate::config::{InputFormat, LayerSource, ProductConfig};
use crate::dispatcher::run_blocking;
use crate::rasterizer::{expand_template, RasterRequest, Rasterizer};
use crate::scratch::ScratchContext;

/// Resolution-dependent images fetched for one unit.
#[derive(Debug, Clone)]
pub struct UnitLayers {
    pub base: Canvas,
    pub linework: Option<Canvas>,
}

/// A product whose grid and ramp are ready to render.
#[derive(Debug, Clone)]
pub struct PreparedProduct {
    config: ProductConfig,
    grid: Grid,
    ramp: ColorRamp,
    quiet: bool,
}

impl PreparedProduct {
    /// Read the input, build the grid and load the ramp.
    #[instrument(skip(config), fields(product = %config.name))]
    pub fn prepare(config: &ProductConfig) -> MapResult<Self> {
        let builder = config.grid_builder()?;
        let reference = match &config.calibration {
            Some(calibration) => SampleSet::from_file(&calibration.reference)?.values(),
            None => Vec::new(),
        };

        let built = match config.input_format {
            InputFormat::Samples => {
                let samples = SampleSet::from_file(&config.input)?;
                debug!(samples = samples.len(), "Read samples");
                builder.build(&config.name, &samples, &reference)?
            }
            InputFormat::UnsignedGrid => {
                let (values, cols, rows) = read_value_rows(&config.input)?;
                debug!(cols, rows, "Read source grid");
                builder.build_from_unsigned_rows(&config.name, &values, cols, rows, &reference)?
            }
        };

        let mut ramp = config.ramp.load()?;
        if let Some(dynamic) = config.dynamic_ramp {
            ramp = ramp.scaled_to_max(built.observed_max, dynamic.floor);
        }

        info!(
            valid = built.grid.valid_count(),
            quiet = built.quiet,
            max = ?built.observed_max,
            "Product prepared"
        );

        Ok(Self {
            config: config.clone(),
            grid: built.grid,
            ramp,
            quiet: built.quiet,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ProductConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn ramp(&self) -> &ColorRamp {
        &self.ramp
    }

    /// True when the grid holds no data and maps show only the background.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Fetch the base and linework images for one unit.
    pub async fn load_layers(
        &self,
        variant: LightingVariant,
        resolution: Resolution,
        scratch: &ScratchContext,
        rasterizer: Option<&dyn Rasterizer>,
    ) -> MapResult<UnitLayers> {
        let base = self
            .load_source(&self.config.base, LayerKind::Base, variant, resolution, scratch, rasterizer)
            .await?;
        let linework = match &self.config.linework {
            Some(linework) => Some(
                self.load_source(
                    &linework.source,
                    LayerKind::Linework,
                    variant,
                    resolution,
                    scratch,
                    rasterizer,
                )
                .await?,
            ),
            None => None,
        };
        Ok(UnitLayers { base, linework })
    }

    async fn load_source(
        &self,
        source: &LayerSource,
        layer: LayerKind,
        variant: LightingVariant,
        resolution: Resolution,
        scratch: &ScratchContext,
        rasterizer: Option<&dyn Rasterizer>,
    ) -> MapResult<Canvas> {
        match source {
            LayerSource::Color { color } => Ok(Canvas::for_resolution(resolution, *color)),
            LayerSource::Bitmap { path } => {
                let path = expand_template(path, variant, resolution);
                run_blocking(move || load_bitmap(Path::new(&path))).await
            }
            LayerSource::Rasterizer => {
                let rasterizer = rasterizer.ok_or_else(|| {
                    MapError::Config(format!("{} layer needs a rasterizer", layer.name()))
                })?;
                rasterizer
                    .rasterize(RasterRequest {
                        product: self.name(),
                        layer,
                        variant,
                        resolution,
                        scratch,
                    })
                    .await
            }
        }
    }

    /// Project, colorize, composite and encode one unit.
    pub fn render(
        &self,
        variant: LightingVariant,
        resolution: Resolution,
        layers: UnitLayers,
    ) -> MapResult<Vec<u8>> {
        let (width, height) = (resolution.width, resolution.height);
        let values = project_to_canvas(&self.grid, width, height);
        let data = colorize(&values, width, height, &self.ramp)?;

        let mut stack = LayerStack::new(width, height)
            .with(CompositeLayer::new(LayerKind::Base, layers.base))
            .with(
                CompositeLayer::new(LayerKind::Data, data)
                    .with_opacity(self.config.data_opacity)
                    .with_key(KeyColor::exact(self.ramp.no_data())),
            );

        if variant == LightingVariant::Day {
            if let Some(haze) = &self.config.haze {
                stack.push(CompositeLayer::haze(width, height, haze.color, haze.opacity));
            }
        }

        if let (Some(image), Some(linework)) = (layers.linework, &self.config.linework) {
            stack.push(CompositeLayer::linework(
                image,
                KeyColor::new(linework.key_color, linework.tolerance),
                linework.invert,
            ));
        }

        let canvas = stack.render()?;
        encode_bmp_v4(&canvas)
    }
}

/// Load a device bitmap (`.bmp` or `.bmp.z`) as a canvas.
pub fn load_bitmap(path: &Path) -> MapResult<Canvas> {
    let bytes = read_artifact(path)?;
    decode_bmp_v4(&bytes)
        .map_err(|e| MapError::InvalidBitmap(format!("{}: {}", path.display(), e)))?
        .to_canvas()
}

fn read_value_rows(path: &Path) -> MapResult<(Vec<f32>, usize, usize)> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| MapError::Io(format!("reading grid {}: {}", path.display(), e)))?;
    parse_value_rows(&text)
}

/// Parse whitespace-separated rows of numbers into a flat row-major buffer.
///
/// Returns `(values, cols, rows)`. Every row must have the same width.
pub fn parse_value_rows(text: &str) -> MapResult<(Vec<f32>, usize, usize)> {
    let mut values = Vec::new();
    let mut cols = 0;
    let mut rows = 0;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let before = values.len();
        for field in line.split_whitespace() {
            let value = field.parse::<f32>().map_err(|_| MapError::InvalidSample {
                line: idx + 1,
                message: format!("'{}' is not a number", field),
            })?;
            values.push(value);
        }
        let width = values.len() - before;
        if rows == 0 {
            cols = width;
        } else if width != cols {
            return Err(MapError::InvalidGrid(format!(
                "row on line {} has {} values, expected {}",
                idx + 1,
                width,
                cols
            )));
        }
        rows += 1;
    }

    Ok((values, cols, rows))
}
