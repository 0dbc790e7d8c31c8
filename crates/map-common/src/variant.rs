//! Lighting variants, target resolutions and output artifact naming.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MapError;

/// Day or night rendering of the same dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightingVariant {
    Day,
    Night,
}

impl LightingVariant {
    pub const ALL: [LightingVariant; 2] = [LightingVariant::Day, LightingVariant::Night];

    /// Single-letter tag used in artifact names.
    pub fn tag(&self) -> char {
        match self {
            LightingVariant::Day => 'D',
            LightingVariant::Night => 'N',
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LightingVariant::Day => "day",
            LightingVariant::Night => "night",
        }
    }
}

impl fmt::Display for LightingVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LightingVariant {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" | "d" => Ok(LightingVariant::Day),
            "night" | "n" => Ok(LightingVariant::Night),
            other => Err(MapError::Config(format!("unknown lighting variant '{}'", other))),
        }
    }
}

/// Target pixel size of one rendered map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MapError::InvalidResolution(s.to_string());
        let (w, h) = s.trim().split_once(|c: char| c == 'x' || c == 'X').ok_or_else(invalid)?;
        let width: u32 = w.parse().map_err(|_| invalid())?;
        let height: u32 = h.parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for Resolution {
    type Error = MapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

/// `map-<D|N>-<W>x<H>-<Product>.bmp`
pub fn bitmap_name(variant: LightingVariant, resolution: Resolution, product: &str) -> String {
    format!("map-{}-{}-{}.bmp", variant.tag(), resolution, product)
}

/// Sibling of [`bitmap_name`] holding the compressed bitmap.
pub fn compressed_name(variant: LightingVariant, resolution: Resolution, product: &str) -> String {
    format!("{}.z", bitmap_name(variant, resolution, product))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        let res: Resolution = "660x330".parse().unwrap();
        assert_eq!(res, Resolution::new(660, 330));
        assert_eq!(res.to_string(), "660x330");
        assert!("660".parse::<Resolution>().is_err());
        assert!("0x330".parse::<Resolution>().is_err());
        assert!("axb".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_artifact_names() {
        let res = Resolution::new(1320, 660);
        assert_eq!(
            bitmap_name(LightingVariant::Day, res, "Aurora"),
            "map-D-1320x660-Aurora.bmp"
        );
        assert_eq!(
            compressed_name(LightingVariant::Night, res, "DRAP-S"),
            "map-N-1320x660-DRAP-S.bmp.z"
        );
    }

    #[test]
    fn test_variant_from_str() {
        assert_eq!("D".parse::<LightingVariant>().unwrap(), LightingVariant::Day);
        assert_eq!("night".parse::<LightingVariant>().unwrap(), LightingVariant::Night);
        assert!("dusk".parse::<LightingVariant>().is_err());
    }
}
