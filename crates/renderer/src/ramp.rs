//! Piecewise-linear color ramps.
//!
//! A ramp is an ordered list of `(threshold, color)` breakpoints plus a
//! reserved no-data color. Lookups interpolate R, G and B independently
//! between the two bracketing breakpoints and clamp outside the ramp.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use map_common::{is_no_data, MapError, MapResult};
use serde::{Deserialize, Serialize};

/// 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Parse `#RRGGBB`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::new(r, g, b))
    }

    /// Parse the ramp-file form `R/G/B`.
    pub fn from_slashed(s: &str) -> Option<Self> {
        let mut parts = s.split('/').map(|p| p.trim().parse::<u8>());
        let rgb = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(r)), Some(Ok(g)), Some(Ok(b)), None) => Self::new(r, g, b),
            _ => return None,
        };
        Some(rgb)
    }

    /// Linear interpolation, rounded to the nearest channel value.
    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    /// Every channel within `tolerance` of `other`.
    pub fn within(self, other: Rgb, tolerance: u8) -> bool {
        self.r.abs_diff(other.r) <= tolerance
            && self.g.abs_diff(other.g) <= tolerance
            && self.b.abs_diff(other.b) <= tolerance
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = MapError;

    /// Accepts `#RRGGBB` or `R/G/B`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Rgb::from_hex(s)
            .or_else(|| Rgb::from_slashed(s))
            .ok_or_else(|| MapError::InvalidRamp(format!("invalid color '{}'", s)))
    }
}

impl TryFrom<String> for Rgb {
    type Error = MapError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Rgb> for String {
    fn from(rgb: Rgb) -> String {
        rgb.to_string()
    }
}

/// One ramp breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub value: f32,
    pub color: Rgb,
}

impl ColorStop {
    pub fn new(value: f32, color: Rgb) -> Self {
        Self { value, color }
    }
}

/// Validated color ramp.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    stops: Vec<ColorStop>,
    no_data: Rgb,
}

impl ColorRamp {
    /// Build a ramp, requiring at least one stop and strictly increasing finite thresholds.
    pub fn new(stops: Vec<ColorStop>, no_data: Rgb) -> MapResult<Self> {
        if stops.is_empty() {
            return Err(MapError::InvalidRamp("ramp has no stops".into()));
        }
        if let Some(bad) = stops.iter().find(|s| !s.value.is_finite()) {
            return Err(MapError::InvalidRamp(format!("non-finite threshold {}", bad.value)));
        }
        if let Some(pair) = stops.windows(2).find(|w| w[1].value <= w[0].value) {
            return Err(MapError::InvalidRamp(format!(
                "thresholds must increase strictly, got {} then {}",
                pair[0].value, pair[1].value
            )));
        }
        Ok(Self { stops, no_data })
    }

    /// Parse the segment text format.
    ///
    /// ```text
    /// # comment
    /// 0   0/0/0     5  255/0/0
    /// 5   255/0/0   10 255/255/0
    /// N   0/0/0
    /// ```
    ///
    /// Each segment must start where the previous one ended, with the same
    /// color. `B` and `F` (below/above range) lines are accepted and ignored,
    /// since lookups clamp to the end colors. A ramp without an `N` line uses
    /// black for no-data.
    pub fn parse(text: &str) -> MapResult<Self> {
        let mut stops: Vec<ColorStop> = Vec::new();
        let mut no_data = Rgb::BLACK;

        for (idx, line) in text.lines().enumerate() {
            let lineno = idx + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();

            match fields.as_slice() {
                ["N", color] => no_data = parse_color(color, lineno)?,
                ["B", _] | ["F", _] => {}
                [v0, c0, v1, c1] => {
                    let start = ColorStop::new(parse_value(v0, lineno)?, parse_color(c0, lineno)?);
                    let end = ColorStop::new(parse_value(v1, lineno)?, parse_color(c1, lineno)?);
                    match stops.last() {
                        None => stops.push(start),
                        Some(prev) if prev.value == start.value && prev.color == start.color => {}
                        Some(prev) => {
                            return Err(MapError::InvalidRamp(format!(
                                "line {}: segment starts at {} {} but previous ended at {} {}",
                                lineno, start.value, start.color, prev.value, prev.color
                            )));
                        }
                    }
                    stops.push(end);
                }
                _ => {
                    return Err(MapError::InvalidRamp(format!(
                        "line {}: expected 'v0 R/G/B v1 R/G/B' or 'N R/G/B'",
                        lineno
                    )));
                }
            }
        }

        Self::new(stops, no_data)
    }

    pub fn from_file(path: impl AsRef<Path>) -> MapResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MapError::Io(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    pub fn no_data(&self) -> Rgb {
        self.no_data
    }

    /// Color for `value`. No-data always maps to the reserved color.
    pub fn color_of(&self, value: f32) -> Rgb {
        if is_no_data(value) {
            return self.no_data;
        }
        let first = self.stops[0];
        let last = self.stops[self.stops.len() - 1];
        if value <= first.value {
            return first.color;
        }
        if value >= last.value {
            return last.color;
        }

        // First stop strictly above value; 1..len because of the clamps above
        let hi = self.stops.partition_point(|s| s.value <= value);
        let a = self.stops[hi - 1];
        let b = self.stops[hi];
        let t = (value - a.value) / (b.value - a.value);
        a.color.lerp(b.color, t)
    }

    /// Ramp with every threshold scaled so the last one sits at
    /// `max(observed_max, floor)`.
    ///
    /// Used for products whose scale follows the day's activity. The floor
    /// keeps a quiet day from stretching noise across the whole ramp.
    pub fn scaled_to_max(&self, observed_max: Option<f32>, floor: f32) -> ColorRamp {
        let top = self.stops[self.stops.len() - 1].value;
        let target = observed_max.filter(|m| m.is_finite()).unwrap_or(floor).max(floor);
        if top <= 0.0 || target <= 0.0 {
            return self.clone();
        }
        let factor = target / top;
        let stops = self
            .stops
            .iter()
            .map(|s| ColorStop::new(s.value * factor, s.color))
            .collect();
        ColorRamp {
            stops,
            no_data: self.no_data,
        }
    }
}

fn parse_value(field: &str, lineno: usize) -> MapResult<f32> {
    field
        .parse::<f32>()
        .map_err(|_| MapError::InvalidRamp(format!("line {}: invalid threshold '{}'", lineno, field)))
}

fn parse_color(field: &str, lineno: usize) -> MapResult<Rgb> {
    Rgb::from_slashed(field)
        .ok_or_else(|| MapError::InvalidRamp(format!("line {}: invalid color '{}'", lineno, field)))
}
