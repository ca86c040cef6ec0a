// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The restoring ("clean") beam: an elliptical Gaussian described by its
//! full-width-half-maximum major and minor axes and a position angle.

use serde::{Deserialize, Serialize};

/// 2 sqrt(2 ln 2); converts a Gaussian FWHM to sigma when divided by.
pub(crate) const FWHM_TO_SIGMA: f64 = 2.354820045030949;

const ARCSEC_TO_RAD: f64 = std::f64::consts::PI / 180.0 / 3600.0;

/// A clean-beam descriptor. Axes are FWHM in arcseconds; the position angle
/// is in degrees, east from north per the FITS convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    /// Major-axis FWHM \[arcsec\].
    pub major: f64,

    /// Minor-axis FWHM \[arcsec\].
    pub minor: f64,

    /// Position angle \[degrees\].
    pub pa: f64,
}

impl Beam {
    /// Construct a beam from FITS header keywords (BMAJ/BMIN/BPA, degrees).
    pub(crate) fn from_header_degrees(bmaj_deg: f64, bmin_deg: f64, bpa_deg: f64) -> Beam {
        Beam {
            major: bmaj_deg * 3600.0,
            minor: bmin_deg * 3600.0,
            pa: bpa_deg,
        }
    }

    /// The BMAJ/BMIN/BPA header keywords this beam corresponds to (axes in
    /// degrees).
    pub(crate) fn to_header_keywords(self) -> [(&'static str, f64); 3] {
        [
            ("BMAJ", self.major / 3600.0),
            ("BMIN", self.minor / 3600.0),
            ("BPA", self.pa),
        ]
    }

    /// The beam solid angle \[sr\].
    pub fn sr(self) -> f64 {
        std::f64::consts::PI / (4.0 * std::f64::consts::LN_2)
            * (self.major * ARCSEC_TO_RAD)
            * (self.minor * ARCSEC_TO_RAD)
    }

    /// The number of pixels per beam, given a square pixel scale in degrees.
    pub fn pixels_per_beam(self, pix_scale_deg: f64) -> f64 {
        let omega_pix = (pix_scale_deg.abs() * 3600.0 * ARCSEC_TO_RAD).powi(2);
        self.sr() / omega_pix
    }

    /// Does this beam (treated as an ellipse) enclose `other`? When the
    /// position angles differ by more than a tolerance, the test is
    /// conservative: only a minor axis at least as large as the other beam's
    /// major axis guarantees enclosure at any orientation.
    fn encloses(self, other: Beam) -> bool {
        const AXIS_TOL: f64 = 1e-9;
        let pa_diff = {
            let d = (self.pa - other.pa).rem_euclid(180.0);
            d.min(180.0 - d)
        };
        if pa_diff < 1e-3 {
            self.major + AXIS_TOL >= other.major && self.minor + AXIS_TOL >= other.minor
        } else {
            self.minor + AXIS_TOL >= other.major
        }
    }

    /// The smallest beam in `beams` that encloses every other beam. When no
    /// channel beam encloses all others, fall back to the circular beam
    /// whose diameter is the largest major axis.
    pub fn common_beam(beams: &[Beam]) -> Option<Beam> {
        let candidate = beams
            .iter()
            .copied()
            .max_by(|a, b| a.sr().total_cmp(&b.sr()))?;
        if beams.iter().all(|b| candidate.encloses(*b)) {
            Some(candidate)
        } else {
            let max_major = beams
                .iter()
                .map(|b| b.major)
                .fold(f64::NEG_INFINITY, f64::max);
            Some(Beam {
                major: max_major,
                minor: max_major,
                pa: 0.0,
            })
        }
    }
}

impl std::fmt::Display for Beam {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{:.4}\" x {:.4}\" (PA {:.1} deg)",
            self.major, self.minor, self.pa
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn header_round_trip() {
        let beam = Beam::from_header_degrees(2.5e-4, 2.0e-4, 80.0);
        assert_abs_diff_eq!(beam.major, 0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(beam.minor, 0.72, epsilon = 1e-12);
        let keys = beam.to_header_keywords();
        assert_eq!(keys[0].0, "BMAJ");
        assert_abs_diff_eq!(keys[0].1, 2.5e-4, epsilon = 1e-15);
        assert_abs_diff_eq!(keys[1].1, 2.0e-4, epsilon = 1e-15);
        assert_abs_diff_eq!(keys[2].1, 80.0);
    }

    #[test]
    fn pixels_per_beam_matches_analytic() {
        // A circular 1" beam on 0.1" pixels: pi/(4 ln 2) * (1/0.1)^2.
        let beam = Beam {
            major: 1.0,
            minor: 1.0,
            pa: 0.0,
        };
        let expected = std::f64::consts::PI / (4.0 * std::f64::consts::LN_2) * 100.0;
        assert_abs_diff_eq!(beam.pixels_per_beam(0.1 / 3600.0), expected, epsilon = 1e-9);
    }

    #[test]
    fn common_beam_identical_beams() {
        let beam = Beam {
            major: 1.0,
            minor: 0.8,
            pa: 45.0,
        };
        let common = Beam::common_beam(&[beam, beam, beam]).unwrap();
        assert_eq!(common, beam);
    }

    #[test]
    fn common_beam_nested_beams() {
        let small = Beam {
            major: 0.9,
            minor: 0.7,
            pa: 10.0,
        };
        let big = Beam {
            major: 1.0,
            minor: 0.8,
            pa: 10.0,
        };
        let common = Beam::common_beam(&[small, big]).unwrap();
        assert_eq!(common, big);
    }

    #[test]
    fn common_beam_crossed_beams_falls_back_to_circle() {
        let a = Beam {
            major: 1.0,
            minor: 0.5,
            pa: 0.0,
        };
        let b = Beam {
            major: 1.0,
            minor: 0.5,
            pa: 90.0,
        };
        let common = Beam::common_beam(&[a, b]).unwrap();
        assert_abs_diff_eq!(common.major, 1.0);
        assert_abs_diff_eq!(common.minor, 1.0);
    }

    #[test]
    fn common_beam_empty() {
        assert!(Beam::common_beam(&[]).is_none());
    }
}
