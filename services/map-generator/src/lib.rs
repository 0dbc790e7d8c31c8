//! Batch generator of day/night device maps.
//!
//! Reads scattered geophysical samples per product, grids and colorizes them,
//! composites them over base maps and linework, and writes RGB565 V4 bitmaps
//! plus zlib-compressed siblings for every configured variant and resolution.

pub mod config;
pub mod dispatcher;
pub mod output;
pub mod product;
pub mod rasterizer;
pub mod report;
pub mod scratch;

pub use config::{GeneratorConfig, Overrides, ProductConfig};
pub use dispatcher::Dispatcher;
pub use product::{PreparedProduct, UnitLayers};
pub use rasterizer::{CommandRasterizer, RasterRequest, Rasterizer};
pub use report::{BatchReport, ProductReport, ProductStatus};
pub use scratch::ScratchContext;
