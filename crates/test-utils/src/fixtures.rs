//! Common test fixtures.

/// Device resolutions as they appear in configuration.
pub mod resolutions {
    /// Smallest size polled by the client.
    pub const SMALL: &str = "660x330";

    /// The five sizes of a typical batch, smallest first.
    pub const STANDARD: [&str; 5] = ["660x330", "1320x660", "1980x990", "2640x1320", "3960x1980"];
}

/// Colour ramps in the `v0 R/G/B v1 R/G/B` text format.
pub mod ramps {
    /// Black to red to yellow over 0..10, no-data rendered black.
    pub const AURORA: &str = "\
0 0/0/0 5 255/0/0
5 255/0/0 10 255/255/0
N 0/0/0
";

    /// Blue to white over 960..1040 hPa, no-data grey.
    pub const PRESSURE: &str = "\
960 0/0/255 1000 128/128/255
1000 128/128/255 1040 255/255/255
N 128/128/128
";
}

/// Device bitmap constants.
pub mod bitmap {
    /// File header plus V4 info header.
    pub const HEADER_LEN: usize = 122;

    /// Length of a `width x height` device bitmap.
    pub const fn expected_len(width: usize, height: usize) -> usize {
        HEADER_LEN + width * height * 2
    }
}
