//! YAML configuration with environment variable substitution.
//!
//! `${VAR}` and `${VAR:-default}` are expanded in the raw text before it is
//! parsed, so paths and colors can come from the deployment environment.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gridding::{Calibration, GridBuilder, Interpolation, LongitudeConvention, Smoothing};
use map_common::{BoundingBox, GridSpec, LightingVariant, Resolution};
use renderer::{ColorRamp, ColorStop, Rgb};
use serde::{Deserialize, Serialize};

/// Default configuration path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/map-generator/config.yaml";

/// Top-level generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Where finished artifacts are written.
    pub output_dir: PathBuf,

    /// Root for per-unit scratch directories.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    pub resolutions: Vec<Resolution>,

    #[serde(default = "default_variants")]
    pub variants: Vec<LightingVariant>,

    /// Upper bound on units rendered at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub rasterizer: Option<RasterizerConfig>,

    pub products: Vec<ProductConfig>,
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_variants() -> Vec<LightingVariant> {
    LightingVariant::ALL.to_vec()
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// External command that draws base maps and linework.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterizerConfig {
    pub command: String,

    /// Arguments; `{layer}`, `{variant}`, `{width}`, `{height}` and `{output}`
    /// are substituted per call.
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

/// How the product's input file is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// `lon lat value` per line.
    #[default]
    Samples,
    /// Whitespace-separated rows of a regular global grid starting at 0°E,
    /// north row first.
    UnsignedGrid,
}

/// Target grid geometry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridConfig {
    pub step: f64,
    #[serde(default)]
    pub bbox: BoundingBox,
}

/// Percentile stretch against a reference sample file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub reference: PathBuf,
    pub floor: f32,
    pub ceiling: f32,
}

/// Ramp from a text file, or given inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RampConfig {
    File {
        file: PathBuf,
    },
    Inline {
        stops: Vec<ColorStop>,
        #[serde(default)]
        no_data: Option<Rgb>,
    },
}

impl RampConfig {
    /// Load and validate the ramp.
    pub fn load(&self) -> map_common::MapResult<ColorRamp> {
        match self {
            RampConfig::File { file } => ColorRamp::from_file(file),
            RampConfig::Inline { stops, no_data } => {
                ColorRamp::new(stops.clone(), no_data.unwrap_or(Rgb::BLACK))
            }
        }
    }
}

/// Rescale the ramp to each run's observed maximum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DynamicRampConfig {
    pub floor: f32,
}

/// Translucent veil drawn on day maps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HazeConfig {
    pub color: Rgb,
    pub opacity: f32,
}

/// Where a base or linework image comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayerSource {
    /// One flat color.
    Color { color: Rgb },
    /// A `.bmp` or `.bmp.z` file; `{variant}`, `{width}` and `{height}` in the
    /// path are substituted per unit.
    Bitmap { path: String },
    /// Drawn by the configured external rasterizer.
    Rasterizer,
}

impl Default for LayerSource {
    fn default() -> Self {
        LayerSource::Color { color: Rgb::BLACK }
    }
}

/// Line art overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineworkConfig {
    pub source: LayerSource,
    #[serde(default = "default_key_color")]
    pub key_color: Rgb,
    #[serde(default)]
    pub tolerance: u8,
    /// Turn ink-on-white art into light-on-dark before keying.
    #[serde(default)]
    pub invert: bool,
}

fn default_key_color() -> Rgb {
    Rgb::BLACK
}

/// One map product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    pub name: String,
    pub input: PathBuf,

    #[serde(default)]
    pub input_format: InputFormat,

    #[serde(default)]
    pub longitudes: LongitudeConvention,

    pub grid: GridConfig,

    #[serde(default)]
    pub interpolation: Interpolation,

    #[serde(default)]
    pub smoothing: Smoothing,

    /// Values below this become no-data.
    #[serde(default)]
    pub threshold: Option<f32>,

    /// Render an all-background map instead of failing on an empty input.
    #[serde(default)]
    pub quiet_fallback: bool,

    #[serde(default)]
    pub calibration: Option<CalibrationConfig>,

    pub ramp: RampConfig,

    #[serde(default)]
    pub dynamic_ramp: Option<DynamicRampConfig>,

    #[serde(default = "default_opacity")]
    pub data_opacity: f32,

    #[serde(default)]
    pub haze: Option<HazeConfig>,

    #[serde(default)]
    pub base: LayerSource,

    #[serde(default)]
    pub linework: Option<LineworkConfig>,
}

fn default_opacity() -> f32 {
    1.0
}

impl ProductConfig {
    /// Grid pipeline for this product.
    pub fn grid_builder(&self) -> map_common::MapResult<GridBuilder> {
        let spec = GridSpec::new(self.grid.bbox, self.grid.step)?;
        Ok(GridBuilder::new(spec)
            .with_convention(self.longitudes)
            .with_interpolation(self.interpolation)
            .with_smoothing(self.smoothing)
            .with_threshold(self.threshold)
            .with_calibration(
                self.calibration
                    .as_ref()
                    .map(|c| Calibration::new(c.floor, c.ceiling)),
            )
            .with_quiet_fallback(self.quiet_fallback))
    }

    fn uses_rasterizer(&self) -> bool {
        self.base == LayerSource::Rasterizer
            || self
                .linework
                .as_ref()
                .is_some_and(|l| l.source == LayerSource::Rasterizer)
    }
}

/// Command-line selections applied on top of the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub products: Vec<String>,
    pub resolutions: Vec<Resolution>,
    pub variant: Option<LightingVariant>,
    pub concurrency: Option<usize>,
}

impl GeneratorConfig {
    /// Read, expand, parse and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config from {:?}", path.as_ref()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid config in {:?}", path.as_ref()))
    }

    /// Parse and validate configuration text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: GeneratorConfig =
            serde_yaml::from_str(&expanded).with_context(|| "Failed to parse config YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Narrow or replace what the file asks for.
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<()> {
        if !overrides.products.is_empty() {
            for name in &overrides.products {
                anyhow::ensure!(
                    self.products.iter().any(|p| &p.name == name),
                    "Unknown product: {}",
                    name
                );
            }
            self.products.retain(|p| overrides.products.contains(&p.name));
        }
        if !overrides.resolutions.is_empty() {
            self.resolutions = overrides.resolutions.clone();
        }
        if let Some(variant) = overrides.variant {
            self.variants = vec![variant];
        }
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency;
        }
        self.validate()
    }

    /// Look up a product by name.
    pub fn product(&self, name: &str) -> Option<&ProductConfig> {
        self.products.iter().find(|p| p.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.products.is_empty(), "At least one product must be configured");
        anyhow::ensure!(!self.resolutions.is_empty(), "At least one resolution must be configured");
        anyhow::ensure!(!self.variants.is_empty(), "At least one variant must be configured");
        anyhow::ensure!(self.concurrency > 0, "Concurrency must be greater than 0");

        for res in &self.resolutions {
            anyhow::ensure!(
                res.width > 0 && res.height > 0,
                "Resolution {} has a zero dimension",
                res
            );
            renderer::check_encodable(res.width, res.height)
                .with_context(|| format!("Resolution {} cannot be rendered", res))?;
        }

        if let Some(rasterizer) = &self.rasterizer {
            anyhow::ensure!(!rasterizer.command.is_empty(), "Rasterizer command cannot be empty");
            anyhow::ensure!(rasterizer.timeout_secs > 0, "Rasterizer timeout must be greater than 0");
        }

        let mut names = HashSet::new();
        for product in &self.products {
            anyhow::ensure!(!product.name.is_empty(), "Product name cannot be empty");
            anyhow::ensure!(
                !product.name.contains(['/', '\\']),
                "Product name '{}' cannot contain path separators",
                product.name
            );
            anyhow::ensure!(
                names.insert(product.name.as_str()),
                "Duplicate product name: {}",
                product.name
            );
            validate_product(product)
                .with_context(|| format!("Invalid product '{}'", product.name))?;
            anyhow::ensure!(
                !product.uses_rasterizer() || self.rasterizer.is_some(),
                "Product '{}' uses the rasterizer but none is configured",
                product.name
            );
        }

        Ok(())
    }
}

fn validate_product(product: &ProductConfig) -> Result<()> {
    anyhow::ensure!(
        product.grid.step.is_finite() && product.grid.step > 0.0,
        "Grid step must be positive, got {}",
        product.grid.step
    );
    product.grid_builder()?;

    if let Interpolation::Nearest { radius } = product.interpolation {
        anyhow::ensure!(radius > 0.0, "Nearest radius must be positive, got {}", radius);
    }

    if let Some(calibration) = &product.calibration {
        anyhow::ensure!(
            calibration.floor < calibration.ceiling,
            "Calibration floor {} must be below ceiling {}",
            calibration.floor,
            calibration.ceiling
        );
    }

    // Inline ramps are checked here; ramp files are read when the product is prepared
    if let RampConfig::Inline { .. } = product.ramp {
        product.ramp.load()?;
    }

    if let Some(dynamic) = product.dynamic_ramp {
        anyhow::ensure!(dynamic.floor > 0.0, "Dynamic ramp floor must be positive");
    }

    anyhow::ensure!(
        (0.0..=1.0).contains(&product.data_opacity),
        "Data opacity must be within 0..1, got {}",
        product.data_opacity
    );
    if let Some(haze) = &product.haze {
        anyhow::ensure!(
            (0.0..=1.0).contains(&haze.opacity),
            "Haze opacity must be within 0..1, got {}",
            haze.opacity
        );
    }

    if let Some(linework) = &product.linework {
        anyhow::ensure!(
            !matches!(linework.source, LayerSource::Color { .. }),
            "Linework must come from a bitmap or the rasterizer"
        );
    }

    Ok(())
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand `${VAR}` and `${VAR:-default}` references.
pub fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_expr = String::new();
            let mut brace_count = 1;

            while brace_count > 0 {
                match chars.next() {
                    Some('{') => {
                        brace_count += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        brace_count -= 1;
                        if brace_count > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Resolve `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim())
            .with_context(|| format!("Environment variable {} not set", expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r##"
output_dir: /tmp/maps
resolutions: ["660x330", "1320x660"]
products:
  - name: Aurora
    input: /tmp/aurora.txt
    grid:
      step: 1.0
    ramp:
      stops:
        - { value: 0.0, color: "#000000" }
        - { value: 10.0, color: "#00FF00" }
"##;

    #[test]
    fn test_minimal_config_defaults() {
        let config = GeneratorConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.resolutions, vec![Resolution::new(660, 330), Resolution::new(1320, 660)]);
        assert_eq!(config.variants, LightingVariant::ALL.to_vec());
        assert!(config.concurrency >= 1);

        let product = config.product("Aurora").unwrap();
        assert_eq!(product.input_format, InputFormat::Samples);
        assert_eq!(product.longitudes, LongitudeConvention::Signed);
        assert_eq!(product.base, LayerSource::Color { color: Rgb::BLACK });
        assert_eq!(product.data_opacity, 1.0);
        assert!(product.haze.is_none() && product.linework.is_none());
        assert_eq!(product.grid.bbox, BoundingBox::global());
    }

    #[test]
    fn test_full_product_parses() {
        let yaml = r##"
output_dir: /tmp/maps
resolutions: ["660x330"]
variants: [night]
concurrency: 3
rasterizer:
  command: xplanet
  args: ["-geometry", "{width}x{height}", "-output", "{output}"]
products:
  - name: DRAP
    input: /tmp/drap.txt
    input_format: unsigned_grid
    longitudes: unsigned
    grid: { step: 4.0 }
    interpolation: { method: linear }
    smoothing: { passes: 2, kernel: cross }
    threshold: 0.5
    quiet_fallback: true
    ramp: { file: /etc/map-generator/drap.ramp }
    dynamic_ramp: { floor: 4.0 }
    data_opacity: 0.8
    haze: { color: "#646464", opacity: 0.4 }
    base: { kind: rasterizer }
    linework:
      source: { kind: bitmap, path: "/maps/grid-{width}x{height}.bmp.z" }
      key_color: "255/255/255"
      tolerance: 8
      invert: true
"##;
        let config = GeneratorConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.variants, vec![LightingVariant::Night]);
        assert_eq!(config.rasterizer.as_ref().unwrap().timeout_secs, 60);

        let p = &config.products[0];
        assert_eq!(p.input_format, InputFormat::UnsignedGrid);
        assert_eq!(p.interpolation, Interpolation::Linear);
        assert_eq!(p.smoothing.passes, 2);
        assert!(matches!(p.ramp, RampConfig::File { .. }));
        assert_eq!(p.base, LayerSource::Rasterizer);
        let linework = p.linework.as_ref().unwrap();
        assert_eq!(linework.key_color, Rgb::WHITE);
        assert_eq!(linework.tolerance, 8);
        assert!(linework.invert);
    }

    #[test]
    fn test_rasterizer_required_when_used() {
        let yaml = MINIMAL.replace("    grid:", "    base: { kind: rasterizer }\n    grid:");
        let err = GeneratorConfig::from_yaml(&yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("rasterizer"));
    }

    #[test]
    fn test_rejects_decreasing_ramp() {
        let yaml = MINIMAL.replace("value: 10.0", "value: -1.0");
        let err = GeneratorConfig::from_yaml(&yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("strictly"));
    }

    #[test]
    fn test_rejects_opacity_out_of_range() {
        let yaml = MINIMAL.replace("    grid:", "    data_opacity: 1.5\n    grid:");
        assert!(GeneratorConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_rejects_bad_resolution() {
        let yaml = MINIMAL.replace("\"1320x660\"", "\"1320by660\"");
        assert!(GeneratorConfig::from_yaml(&yaml).is_err());

        let yaml = MINIMAL.replace("\"1320x660\"", "\"65536x32768\"");
        let err = GeneratorConfig::from_yaml(&yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("65536x32768 cannot be rendered"));
    }

    #[test]
    fn test_rejects_duplicate_products() {
        let duplicate = r##"
  - name: Aurora
    input: /tmp/other.txt
    grid: { step: 2.0 }
    ramp: { stops: [{ value: 0.0, color: "#FFFFFF" }] }
"##;
        let yaml = format!("{}{}", MINIMAL, duplicate);
        let err = GeneratorConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_overrides_narrow_selection() {
        let mut config = GeneratorConfig::from_yaml(MINIMAL).unwrap();
        config
            .apply_overrides(&Overrides {
                products: vec!["Aurora".into()],
                resolutions: vec![Resolution::new(100, 50)],
                variant: Some(LightingVariant::Day),
                concurrency: Some(2),
            })
            .unwrap();
        assert_eq!(config.resolutions, vec![Resolution::new(100, 50)]);
        assert_eq!(config.variants, vec![LightingVariant::Day]);
        assert_eq!(config.concurrency, 2);

        let unknown = Overrides {
            products: vec!["MUF".into()],
            ..Default::default()
        };
        assert!(config.apply_overrides(&unknown).is_err());
    }

    #[test]
    fn test_expand_env_vars_simple() {
        std::env::set_var("MAPGEN_TEST_DIR", "/srv/maps");
        let result = expand_env_vars("output_dir: ${MAPGEN_TEST_DIR}/out").unwrap();
        assert_eq!(result, "output_dir: /srv/maps/out");
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        std::env::remove_var("MAPGEN_UNSET_VAR");
        let result = expand_env_vars("step: ${MAPGEN_UNSET_VAR:-2.0}").unwrap();
        assert_eq!(result, "step: 2.0");
    }

    #[test]
    fn test_expand_env_vars_missing_required() {
        std::env::remove_var("MAPGEN_REQUIRED_VAR");
        assert!(expand_env_vars("${MAPGEN_REQUIRED_VAR}").is_err());
        assert!(expand_env_vars("${UNCLOSED").is_err());
    }

    #[test]
    fn test_resolve_var_expr_override_default() {
        std::env::set_var("MAPGEN_SET_VAR", "custom");
        assert_eq!(resolve_var_expr("MAPGEN_SET_VAR:-default").unwrap(), "custom");
    }
}
