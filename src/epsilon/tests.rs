// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use approx::assert_abs_diff_eq;
use ndarray::prelude::*;

use super::*;
use crate::beam::FWHM_TO_SIGMA;

/// A synthetic dirty beam: a circular Gaussian core of the given sigma
/// (pixels) plus an optional low-level ring at radius 10, which gives the
/// radial profile a first null like a real PSF.
fn synthetic_psf(sigma_px: f64, with_sidelobe: bool) -> ImageCube {
    let size = 101;
    let centre = (size / 2) as f64;
    let mut data = Array3::<f32>::zeros((1, size, size));
    for ((_, y, x), v) in data.indexed_iter_mut() {
        let r = ((y as f64 - centre).powi(2) + (x as f64 - centre).powi(2)).sqrt();
        let mut val = (-0.5 * (r / sigma_px).powi(2)).exp();
        if with_sidelobe {
            val += 0.05 * (-0.5 * (r - 10.0).powi(2)).exp();
        }
        *v = val as f32;
    }

    // A clean beam exactly matching the Gaussian core, on 1" pixels.
    let fwhm_arcsec = FWHM_TO_SIGMA * sigma_px;
    ImageCube {
        path: PathBuf::from("synthetic.psf.fits"),
        data,
        pix_scale_deg: Some(1.0 / 3600.0),
        unit: None,
        beam: Some(Beam {
            major: fwhm_arcsec,
            minor: fwhm_arcsec,
            pa: 0.0,
        }),
        beams: None,
    }
}

#[test]
fn epsilon_of_gaussian_psf_is_close_to_one() {
    // The dirty beam's core is the clean beam, so integrating it to the
    // first null recovers (nearly) the clean-beam area.
    let psf = synthetic_psf(2.0, true);
    let table = epsilon_from_psf(&psf, 30).unwrap();
    assert_eq!(table.epsilon.len(), 1);
    assert_abs_diff_eq!(table.epsilon[0], 1.0, epsilon = 0.02);
    assert_abs_diff_eq!(table.clean_beam.major, FWHM_TO_SIGMA * 2.0, epsilon = 1e-9);
}

#[test]
fn psf_without_null_is_an_error() {
    let psf = synthetic_psf(2.0, false);
    match epsilon_from_psf(&psf, 30) {
        Err(EpsilonError::NoNull { chan: 0 }) => (),
        other => panic!("Expected NoNull, got {other:?}"),
    }
}

#[test]
fn missing_pixel_scale_is_an_error() {
    let mut psf = synthetic_psf(2.0, true);
    psf.pix_scale_deg = None;
    assert!(matches!(
        epsilon_from_psf(&psf, 30),
        Err(EpsilonError::MissingPixScale(_))
    ));
}

#[test]
fn argmax_skips_nans() {
    let plane = array![[f32::NAN, 1.0], [5.0, 2.0]];
    assert_eq!(argmax(plane.view()), Some((1, 0)));
    let all_nan = array![[f32::NAN, f32::NAN]];
    assert_eq!(argmax(all_nan.view()), None);
}

#[test]
fn first_local_minimum_is_strict() {
    assert_eq!(first_local_minimum(&[3.0, 2.0, 1.0, 2.0, 0.5]), Some(2));
    // A plateau is not a strict minimum.
    assert_eq!(first_local_minimum(&[3.0, 1.0, 1.0, 2.0]), None);
    assert_eq!(first_local_minimum(&[1.0, 2.0, 3.0]), None);
}

#[test]
fn rescale_adds_scaled_residual() {
    let conv_model = Array3::<f32>::from_elem((2, 3, 3), 1.0);
    let residual = ImageCube {
        path: PathBuf::from("synthetic.residual.fits"),
        data: Array3::from_elem((2, 3, 3), 0.5),
        pix_scale_deg: None,
        unit: None,
        beam: None,
        beams: None,
    };
    let restored = rescale(&conv_model, &[2.0, 4.0], &residual).unwrap();
    assert_abs_diff_eq!(restored[(0, 1, 1)], 2.0);
    assert_abs_diff_eq!(restored[(1, 1, 1)], 3.0);
}

#[test]
fn rescale_channel_mismatch_is_an_error() {
    let conv_model = Array3::<f32>::zeros((2, 3, 3));
    let residual = ImageCube {
        path: PathBuf::from("synthetic.residual.fits"),
        data: Array3::zeros((2, 3, 3)),
        pix_scale_deg: None,
        unit: None,
        beam: None,
        beams: None,
    };
    assert!(matches!(
        rescale(&conv_model, &[1.0], &residual),
        Err(EpsilonError::ShapeMismatch { .. })
    ));
}
