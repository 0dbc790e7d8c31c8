//! Scattered measurement samples.
//!
//! The upstream feeds hand over samples as whitespace-delimited text, one
//! sample per line: `longitude latitude value`. There is no header row and
//! no missing-value rows; a location that is absent simply wasn't interesting.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MapError, MapResult};

/// One measurement at a geographic point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub lon: f64,
    pub lat: f64,
    pub value: f32,
}

impl Sample {
    pub fn new(lon: f64, lat: f64, value: f32) -> Self {
        Self { lon, lat, value }
    }
}

/// Ordered collection of samples for one dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    samples: Vec<Sample>,
}

impl SampleSet {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Parse the `lon lat value` text format.
    ///
    /// Blank lines and lines starting with `#` are skipped. Any other line that
    /// doesn't hold exactly three finite numbers, or whose latitude is off the
    /// globe, is rejected with its 1-based line number.
    pub fn parse(text: &str) -> MapResult<Self> {
        let mut samples = Vec::new();

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 3 {
                return Err(MapError::InvalidSample {
                    line: lineno + 1,
                    message: format!("expected 3 fields, found {}", fields.len()),
                });
            }

            let lon = parse_field(fields[0], lineno)?;
            let lat = parse_field(fields[1], lineno)?;
            let value = parse_field(fields[2], lineno)? as f32;

            if !(-90.0..=90.0).contains(&lat) {
                return Err(MapError::InvalidSample {
                    line: lineno + 1,
                    message: format!("latitude {} outside -90..90", lat),
                });
            }

            samples.push(Sample { lon, lat, value });
        }

        Ok(Self { samples })
    }

    /// Read and parse a sample file.
    pub fn from_file(path: impl AsRef<Path>) -> MapResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            MapError::Io(format!("reading samples {}: {}", path.as_ref().display(), e))
        })?;
        Self::parse(&text)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// All sample values, in input order.
    pub fn values(&self) -> Vec<f32> {
        self.samples.iter().map(|s| s.value).collect()
    }
}

impl FromIterator<Sample> for SampleSet {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

fn parse_field(field: &str, lineno: usize) -> MapResult<f64> {
    let value: f64 = field.parse().map_err(|_| MapError::InvalidSample {
        line: lineno + 1,
        message: format!("'{}' is not a number", field),
    })?;
    if !value.is_finite() {
        return Err(MapError::InvalidSample {
            line: lineno + 1,
            message: format!("'{}' is not finite", field),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let set = SampleSet::parse("-120.5 45.0 3.2\n\n10 -5 0.5\n").unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.samples()[0], Sample::new(-120.5, 45.0, 3.2));
    }

    #[test]
    fn test_parse_reports_line_number() {
        let err = SampleSet::parse("0 0 1\n0 0\n").unwrap_err();
        match err {
            MapError::InvalidSample { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_bad_latitude() {
        assert!(SampleSet::parse("0 91 1\n").is_err());
        assert!(SampleSet::parse("0 abc 1\n").is_err());
        assert!(SampleSet::parse("0 0 nan\n").is_err());
    }
}
