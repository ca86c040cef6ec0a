// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to parse filenames.
//!
//! ALMA-IMF imaging products encode their provenance in the filename, e.g.
//! `W51-E_B6_spw0_12M_robust0_selfcal4_finaliter.image.tt0.fits` carries the
//! region, band, array configuration, robust parameter and self-calibration
//! iteration. [ProductName] is the struct to be used here; parsing is
//! infallible, with sentinel defaults for missing tokens.

use std::fmt;
use std::path::Path;

use regex::Regex;

lazy_static::lazy_static! {
    static ref RE_SELFCAL: Regex = Regex::new(r"^selfcal(\d+)").unwrap();
    static ref RE_ROBUST: Regex = Regex::new(r"^robust(-?\d+(\.\d+)?)").unwrap();
}

/// Array configurations used for ALMA-IMF imaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayConfig {
    /// 12-m array only.
    TwelveM,

    /// Combined 7-m + 12-m data.
    SevenMTwelveM,

    /// Neither token was present in the filename.
    Unknown,
}

impl fmt::Display for ArrayConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArrayConfig::TwelveM => write!(f, "12M"),
            ArrayConfig::SevenMTwelveM => write!(f, "7M12M"),
            ArrayConfig::Unknown => write!(f, "????"),
        }
    }
}

/// Metadata derived from an imaging product's filename.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductName {
    pub region: String,
    pub band: String,
    pub array: ArrayConfig,

    /// Self-calibration iteration; 0 for pre-selfcal products.
    pub selfcal_iter: u8,

    /// Briggs robust weighting parameter; 999.0 when the filename doesn't
    /// carry a robust token.
    pub robust: f64,

    /// The final underscore-separated token.
    pub suffix: String,
}

impl ProductName {
    /// Parse a product filename. `ditch_suffix`, when given, strips everything
    /// from its first occurrence onwards before tokenising (e.g.
    /// `".image.tt"` to ignore the `.image.tt0.fits` trailer).
    pub fn parse<P: AsRef<Path>>(path: P, ditch_suffix: Option<&str>) -> ProductName {
        let basename = path
            .as_ref()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let basename = match ditch_suffix {
            Some(d) => basename.split(d).next().unwrap_or("").to_string(),
            None => basename,
        };

        let split: Vec<&str> = basename.split('_').collect();

        let mut selfcal_iter = 0;
        let mut robust = 999.0;
        let mut array = ArrayConfig::Unknown;
        for entry in &split {
            if let Some(caps) = RE_SELFCAL.captures(entry) {
                // "preselfcal" doesn't start with "selfcal", so it can't
                // reach here; it keeps the iteration-0 default.
                if let Ok(n) = caps[1].parse() {
                    selfcal_iter = n;
                }
            }
            if let Some(caps) = RE_ROBUST.captures(entry) {
                if let Ok(r) = caps[1].parse() {
                    robust = r;
                }
            }
            match *entry {
                "12M" => array = ArrayConfig::TwelveM,
                "7M12M" => array = ArrayConfig::SevenMTwelveM,
                _ => (),
            }
        }

        ProductName {
            region: split.first().unwrap_or(&"").to_string(),
            band: split.get(1).unwrap_or(&"").to_string(),
            array,
            selfcal_iter,
            robust,
            suffix: split.last().unwrap_or(&"").to_string(),
        }
    }
}

/// The digit immediately following "selfcal" in a filename, or 0 when there
/// isn't one. Used by the comparison loop to rank candidate images.
pub fn get_selfcal_number(filename: &str) -> u8 {
    filename
        .split("selfcal")
        .nth(1)
        .and_then(|rest| rest.chars().next())
        .and_then(|c| c.to_digit(10))
        .map(|d| d as u8)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_name() {
        let name = ProductName::parse(
            "W51-E_B6_spw0_12M_robust0_selfcal4_finaliter.image.tt0.fits",
            Some(".image.tt"),
        );
        assert_eq!(name.region, "W51-E");
        assert_eq!(name.band, "B6");
        assert_eq!(name.array, ArrayConfig::TwelveM);
        assert_eq!(name.selfcal_iter, 4);
        assert_eq!(name.robust, 0.0);
        assert_eq!(name.suffix, "finaliter");
    }

    #[test]
    fn parse_preselfcal_is_iteration_zero() {
        let name = ProductName::parse(
            "G333.60_B3_spw1_7M12M_robust-2_preselfcal.image.tt0.fits",
            Some(".image.tt"),
        );
        assert_eq!(name.array, ArrayConfig::SevenMTwelveM);
        assert_eq!(name.selfcal_iter, 0);
        assert_eq!(name.robust, -2.0);
        assert_eq!(name.suffix, "preselfcal");
    }

    #[test]
    fn parse_missing_tokens_use_sentinels() {
        let name = ProductName::parse("G010.62_B3.fits", None);
        assert_eq!(name.region, "G010.62");
        assert_eq!(name.array, ArrayConfig::Unknown);
        assert_eq!(name.selfcal_iter, 0);
        assert_eq!(name.robust, 999.0);
    }

    #[test]
    fn parse_fractional_robust() {
        let name = ProductName::parse("X_B6_12M_robust0.5_selfcal2_final.fits", None);
        assert_eq!(name.robust, 0.5);
        assert_eq!(name.selfcal_iter, 2);
    }

    #[test]
    fn parse_path_ignores_directories() {
        let name = ProductName::parse(
            "/data/W43-MM1/B6/W43-MM1_B6_spw2_12M_robust0_selfcal1.image.tt0.fits",
            Some(".image.tt"),
        );
        assert_eq!(name.region, "W43-MM1");
        assert_eq!(name.selfcal_iter, 1);
    }

    #[test]
    fn selfcal_number_extraction() {
        assert_eq!(get_selfcal_number("a_selfcal3.image.tt0.fits"), 3);
        assert_eq!(get_selfcal_number("a_selfcalX.image.tt0.fits"), 0);
        assert_eq!(get_selfcal_number("a.image.tt0.fits"), 0);
    }
}
