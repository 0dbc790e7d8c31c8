//! Rendering for device map bitmaps.
//!
//! Implements the stages after gridding:
//! - Color ramps (piecewise linear, with a reserved no-data color)
//! - Colorizing projected grid values onto an RGB888 canvas
//! - Layer compositing with a fixed z-order and key-color transparency
//! - RGB565 V4 bitmap encoding and decoding
//! - zlib transport compression

pub mod bmp;
pub mod canvas;
pub mod colorize;
pub mod composite;
pub mod compress;
pub mod ramp;

pub use bmp::{
    check_encodable, decode_bmp_v4, encode_bmp_v4, encode_raw_rgb888, encoded_len, pack_rgb565, rgb565_to_rgb888,
    DecodedBitmap,
};
pub use canvas::Canvas;
pub use colorize::colorize;
pub use composite::{CompositeLayer, KeyColor, LayerKind, LayerStack};
pub use compress::{compress, decompress, read_artifact};
pub use ramp::{ColorRamp, ColorStop, Rgb};
