//! 16-bit device bitmaps.
//!
//! The client decodes exactly one format: a BMP with a 108-byte V4 info
//! header, RGB565 pixels under explicit bit-field masks, and top-down rows
//! (signalled by a negative height). Layout, little-endian throughout:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0   | 2  | `BM` |
//! | 2   | 4  | file size (`122 + W*H*2`) |
//! | 6   | 4  | reserved, zero |
//! | 10  | 4  | pixel offset (122) |
//! | 14  | 4  | info header size (108) |
//! | 18  | 4  | width |
//! | 22  | 4  | `-height` |
//! | 26  | 2  | planes (1) |
//! | 28  | 2  | bits per pixel (16) |
//! | 30  | 4  | compression (3, bit fields) |
//! | 34  | 4  | image size (`W*H*2`) |
//! | 38  | 16 | resolution and palette counts, zero |
//! | 54  | 16 | R/G/B/A masks `F800 07E0 001F 0000` |
//! | 70  | 4  | color space `sRGB` |
//! | 74  | 48 | endpoints and gamma, zero |
//! | 122 | `W*H*2` | pixels |

use map_common::{MapError, MapResult};
use rayon::prelude::*;

use crate::canvas::{Canvas, PARALLEL_THRESHOLD};

pub const FILE_HEADER_LEN: usize = 14;
pub const INFO_HEADER_LEN: usize = 108;
/// Offset of the first pixel, also the total header length.
pub const PIXEL_OFFSET: usize = FILE_HEADER_LEN + INFO_HEADER_LEN;

const BI_BITFIELDS: u32 = 3;
/// `LCS_sRGB`, the ASCII tag "sRGB".
const LCS_SRGB: u32 = 0x7352_4742;

pub const RED_MASK: u32 = 0xF800;
pub const GREEN_MASK: u32 = 0x07E0;
pub const BLUE_MASK: u32 = 0x001F;
pub const ALPHA_MASK: u32 = 0x0000;

/// Encoded length of a `width x height` bitmap.
pub fn encoded_len(width: u32, height: u32) -> usize {
    PIXEL_OFFSET + width as usize * height as usize * 2
}

/// Truncate an 8-bit color to RGB565.
#[inline(always)]
pub fn pack_rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

/// Expand RGB565 back to 8 bits per channel, rounding to the nearest level.
#[inline(always)]
pub fn rgb565_to_rgb888(v: u16) -> [u8; 3] {
    let r = ((v >> 11) & 0x1F) as u32;
    let g = ((v >> 5) & 0x3F) as u32;
    let b = (v & 0x1F) as u32;
    [
        ((r * 255 + 15) / 31) as u8,
        ((g * 255 + 31) / 63) as u8,
        ((b * 255 + 15) / 31) as u8,
    ]
}

/// Encode a canvas as a device bitmap.
pub fn encode_bmp_v4(canvas: &Canvas) -> MapResult<Vec<u8>> {
    encode_raw_rgb888(canvas.pixels(), canvas.width(), canvas.height())
}

/// Encode packed RGB888 bytes as a device bitmap.
///
/// The buffer must hold exactly `width * height * 3` bytes; anything else is
/// rejected rather than truncated or padded.
pub fn encode_raw_rgb888(rgb: &[u8], width: u32, height: u32) -> MapResult<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(MapError::InvalidBitmap(format!(
            "cannot encode a {}x{} bitmap",
            width, height
        )));
    }
    let header = HeaderSizes::new(width, height)?;
    let pixel_count = width as usize * height as usize;
    if rgb.len() != pixel_count * 3 {
        return Err(MapError::PixelBufferLength {
            expected: pixel_count * 3,
            actual: rgb.len(),
        });
    }

    let total = encoded_len(width, height);
    let mut out = Vec::with_capacity(total);
    write_headers(&mut out, header);
    out.resize(total, 0);

    let pack = |(dst, src): (&mut [u8], &[u8])| {
        dst.copy_from_slice(&pack_rgb565(src[0], src[1], src[2]).to_le_bytes());
    };
    let pixels = &mut out[PIXEL_OFFSET..];
    if pixel_count >= PARALLEL_THRESHOLD {
        pixels.par_chunks_mut(2).zip(rgb.par_chunks(3)).for_each(pack);
    } else {
        pixels.chunks_mut(2).zip(rgb.chunks(3)).for_each(pack);
    }

    debug_assert_eq!(out.len(), total);
    Ok(out)
}

/// Header fields that depend on the image size, checked to fit their slots.
#[derive(Debug, Clone, Copy)]
struct HeaderSizes {
    file_size: u32,
    image_size: u32,
    width: i32,
    height: i32,
}

impl HeaderSizes {
    fn new(width: u32, height: u32) -> MapResult<Self> {
        let too_large = || {
            MapError::InvalidBitmap(format!("{}x{} does not fit a BMP header", width, height))
        };
        let image_size = (width as u64)
            .checked_mul(height as u64)
            .and_then(|n| n.checked_mul(2))
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(too_large)?;
        let file_size = image_size
            .checked_add(PIXEL_OFFSET as u32)
            .ok_or_else(too_large)?;
        Ok(Self {
            file_size,
            image_size,
            width: i32::try_from(width).map_err(|_| too_large())?,
            height: i32::try_from(height).map_err(|_| too_large())?,
        })
    }
}

/// Check that a `width x height` bitmap can be encoded at all.
pub fn check_encodable(width: u32, height: u32) -> MapResult<()> {
    HeaderSizes::new(width, height).map(|_| ())
}

fn write_headers(out: &mut Vec<u8>, sizes: HeaderSizes) {
    let HeaderSizes {
        file_size,
        image_size,
        width,
        height,
    } = sizes;

    // File header
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&file_size.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(PIXEL_OFFSET as u32).to_le_bytes());

    // V4 info header
    out.extend_from_slice(&(INFO_HEADER_LEN as u32).to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&(-height).to_le_bytes()); // top-down
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(&BI_BITFIELDS.to_le_bytes());
    out.extend_from_slice(&image_size.to_le_bytes());
    out.extend_from_slice(&[0u8; 16]); // x/y pixels per meter, colors used, important
    for mask in [RED_MASK, GREEN_MASK, BLUE_MASK, ALPHA_MASK] {
        out.extend_from_slice(&mask.to_le_bytes());
    }
    out.extend_from_slice(&LCS_SRGB.to_le_bytes());
    out.extend_from_slice(&[0u8; 48]); // endpoints (36) + gamma (12)
}

/// Pixels of a decoded device bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBitmap {
    pub width: u32,
    pub height: u32,
    /// RGB565 values, top row first.
    pub pixels: Vec<u16>,
}

impl DecodedBitmap {
    /// Expand to an RGB888 canvas.
    pub fn to_canvas(&self) -> MapResult<Canvas> {
        let rgb = self.pixels.iter().flat_map(|v| rgb565_to_rgb888(*v)).collect();
        Canvas::from_raw(self.width, self.height, rgb)
    }
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    read_u32(bytes, at) as i32
}

/// Decode a device bitmap produced by [`encode_bmp_v4`].
///
/// Only the exact format the client accepts is read: anything else (bottom-up
/// rows, another header version, palette or 24-bit data) is rejected.
pub fn decode_bmp_v4(bytes: &[u8]) -> MapResult<DecodedBitmap> {
    let invalid = |msg: String| Err(MapError::InvalidBitmap(msg));

    if bytes.len() < PIXEL_OFFSET {
        return invalid(format!("{} bytes is shorter than the header", bytes.len()));
    }
    if &bytes[0..2] != b"BM" {
        return invalid("missing BM magic".into());
    }

    let offset = read_u32(bytes, 10) as usize;
    let info_len = read_u32(bytes, 14) as usize;
    let width = read_i32(bytes, 18);
    let height = read_i32(bytes, 22);
    let planes = read_u16(bytes, 26);
    let bpp = read_u16(bytes, 28);
    let compression = read_u32(bytes, 30);

    if offset != PIXEL_OFFSET
        || info_len != INFO_HEADER_LEN
        || planes != 1
        || bpp != 16
        || compression != BI_BITFIELDS
    {
        return invalid(format!(
            "unexpected header off={} dib={} planes={} bpp={} comp={}",
            offset, info_len, planes, bpp, compression
        ));
    }
    if height >= 0 {
        return invalid("expected top-down rows (negative height)".into());
    }
    if width <= 0 {
        return invalid(format!("invalid width {}", width));
    }

    let (width, height) = (width as u32, height.unsigned_abs());
    let data_len = width as usize * height as usize * 2;
    let Some(data) = bytes.get(offset..offset + data_len) else {
        return invalid(format!(
            "truncated pixel data: {} of {} bytes",
            bytes.len() - offset,
            data_len
        ));
    };

    let pixels = data
        .chunks_exact(2)
        .map(|px| u16::from_le_bytes([px[0], px[1]]))
        .collect();

    Ok(DecodedBitmap { width, height, pixels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ramp::Rgb;

    #[test]
    fn test_pack_rgb565_bits() {
        assert_eq!(pack_rgb565(255, 255, 255), 0xFFFF);
        assert_eq!(pack_rgb565(0, 0, 0), 0x0000);
        assert_eq!(pack_rgb565(255, 0, 0), 0xF800);
        assert_eq!(pack_rgb565(0, 255, 0), 0x07E0);
        assert_eq!(pack_rgb565(0, 0, 255), 0x001F);
        assert_eq!(pack_rgb565(0b1010_1111, 0b0110_0111, 0b0000_1111), 0b10101_011001_00001);
    }

    #[test]
    fn test_rgb565_expansion_hits_extremes() {
        assert_eq!(rgb565_to_rgb888(0xFFFF), [255, 255, 255]);
        assert_eq!(rgb565_to_rgb888(0x0000), [0, 0, 0]);
        assert_eq!(rgb565_to_rgb888(0xF800), [255, 0, 0]);
        // 16/31 of full scale rounds to 132
        assert_eq!(rgb565_to_rgb888(16 << 11)[0], 132);
    }

    #[test]
    fn test_header_fields() {
        let bytes = encode_bmp_v4(&Canvas::new(3, 2, Rgb::WHITE)).unwrap();
        assert_eq!(bytes.len(), 122 + 12);
        assert_eq!(&bytes[0..2], b"BM");
        assert_eq!(read_u32(&bytes, 2), 134);
        assert_eq!(read_u32(&bytes, 6), 0);
        assert_eq!(read_u32(&bytes, 10), 122);
        assert_eq!(read_u32(&bytes, 14), 108);
        assert_eq!(read_i32(&bytes, 18), 3);
        assert_eq!(read_i32(&bytes, 22), -2);
        assert_eq!(read_u16(&bytes, 26), 1);
        assert_eq!(read_u16(&bytes, 28), 16);
        assert_eq!(read_u32(&bytes, 30), 3);
        assert_eq!(read_u32(&bytes, 34), 12);
        assert!(bytes[38..54].iter().all(|b| *b == 0));
        assert_eq!(read_u32(&bytes, 54), 0xF800);
        assert_eq!(read_u32(&bytes, 58), 0x07E0);
        assert_eq!(read_u32(&bytes, 62), 0x001F);
        assert_eq!(read_u32(&bytes, 66), 0);
        assert_eq!(&bytes[70..74], b"BGRs");
        assert!(bytes[74..122].iter().all(|b| *b == 0));
        assert!(bytes[122..].iter().all(|b| *b == 0xFF));
    }

    #[test]
    fn test_rows_are_top_down() {
        let mut canvas = Canvas::new(2, 2, Rgb::BLACK);
        canvas.put(0, 0, Rgb::new(255, 0, 0));
        let bytes = encode_bmp_v4(&canvas).unwrap();
        // First pixel in the file is the top-left one, little-endian 0xF800
        assert_eq!(&bytes[122..124], &[0x00, 0xF8]);
        assert_eq!(&bytes[126..128], &[0x00, 0x00]);
    }

    #[test]
    fn test_raw_length_mismatch_is_rejected() {
        let err = encode_raw_rgb888(&[0u8; 17], 3, 2).unwrap_err();
        assert!(matches!(err, MapError::PixelBufferLength { expected: 18, actual: 17 }));
        assert!(encode_raw_rgb888(&[], 0, 2).is_err());
    }

    #[test]
    fn test_oversized_headers_are_rejected() {
        // 65536 x 32768 x 2 bytes overflows the 32-bit size fields
        let err = encode_raw_rgb888(&[], 65_536, 32_768).unwrap_err();
        assert!(matches!(err, MapError::InvalidBitmap(_)));
        assert!(check_encodable(u32::MAX, 1).is_err());
        assert!(check_encodable(2640, 1320).is_ok());
    }

    #[test]
    fn test_decode_round_trip() {
        let mut canvas = Canvas::new(5, 4, Rgb::new(0, 0, 255));
        canvas.put(4, 3, Rgb::WHITE);
        let decoded = decode_bmp_v4(&encode_bmp_v4(&canvas).unwrap()).unwrap();
        assert_eq!((decoded.width, decoded.height), (5, 4));
        assert_eq!(decoded.pixels[0], 0x001F);
        assert_eq!(decoded.pixels[19], 0xFFFF);
        assert_eq!(decoded.to_canvas().unwrap(), canvas);
    }

    #[test]
    fn test_decode_rejects_bottom_up_and_truncation() {
        let mut bytes = encode_bmp_v4(&Canvas::new(2, 2, Rgb::BLACK)).unwrap();
        let truncated = &bytes[..bytes.len() - 1];
        assert!(decode_bmp_v4(truncated).unwrap_err().to_string().contains("truncated"));

        bytes[22..26].copy_from_slice(&2i32.to_le_bytes());
        assert!(decode_bmp_v4(&bytes).unwrap_err().to_string().contains("top-down"));

        assert!(decode_bmp_v4(b"PK\x03\x04").is_err());
    }
}
