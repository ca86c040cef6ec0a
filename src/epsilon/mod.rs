// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The beam-volume correction factor ("epsilon").
//!
//! A CLEANed image is the sum of a model convolved with the clean beam
//! (Jy per clean beam) and a residual left in dirty-beam units. Scaling the
//! residual by epsilon = Omega_clean / Omega_dirty before adding it back
//! puts both terms on the same flux scale. The dirty-beam solid angle is
//! integrated out to the first null of the PSF's radial profile, per channel.

#[cfg(test)]
mod tests;

use log::debug;
use ndarray::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::beam::Beam;
use crate::cube::{CubeError, ImageCube};

/// One epsilon per spectral channel, paired with the common clean beam of
/// the cube they came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpsilonTable {
    pub epsilon: Vec<f64>,
    pub clean_beam: Beam,
}

/// Compute per-channel epsilon factors from a PSF (dirty-beam) cube.
///
/// `max_npix_peak` is the half-width of the window around the PSF peak that
/// is searched for the first null, and also the number of radial bins.
pub fn epsilon_from_psf(psf: &ImageCube, max_npix_peak: usize) -> Result<EpsilonTable, EpsilonError> {
    let pix_scale_deg = psf
        .pix_scale_deg
        .ok_or_else(|| EpsilonError::MissingPixScale(psf.path.clone()))?;
    let beams = psf.channel_beams()?;
    let clean_beam =
        Beam::common_beam(&beams).ok_or_else(|| EpsilonError::NoBeam(psf.path.clone()))?;

    let epsilon = (0..psf.num_chans())
        .into_par_iter()
        .map(|chan| {
            let beam = beams[chan];
            let plane = psf.plane(chan);

            let (cy, cx) = argmax(plane).ok_or(EpsilonError::NoPeak { chan })?;
            let y_range = cy.saturating_sub(max_npix_peak)..(cy + max_npix_peak + 1).min(plane.len_of(Axis(0)));
            let x_range = cx.saturating_sub(max_npix_peak)..(cx + max_npix_peak + 1).min(plane.len_of(Axis(1)));
            let cutout = plane.slice(s![y_range, x_range]);
            let (cy, cx) = argmax(cutout).ok_or(EpsilonError::NoPeak { chan })?;

            // Bin the cutout by integer elliptical radius around the peak.
            let theta = beam.pa.to_radians();
            let (sinth, costh) = theta.sin_cos();
            let rminmaj = beam.minor / beam.major;
            let mut abs_sum = vec![0.0_f64; max_npix_peak];
            let mut signed_sum = vec![0.0_f64; max_npix_peak];
            let mut count = vec![0_usize; max_npix_peak];
            for ((y, x), &v) in cutout.indexed_iter() {
                if v.is_nan() {
                    continue;
                }
                let dy = y as f64 - cy as f64;
                let dx = x as f64 - cx as f64;
                let r = (((dx * costh + dy * sinth) / rminmaj).powi(2)
                    + (dx * sinth - dy * costh).powi(2))
                .sqrt();
                let rbin = r as usize;
                if rbin < max_npix_peak {
                    abs_sum[rbin] += v.abs() as f64;
                    signed_sum[rbin] += v as f64;
                    count[rbin] += 1;
                }
            }

            // The radial profile is the mean absolute value per bin; its
            // first local minimum marks the dirty beam's first null.
            let profile: Vec<f64> = abs_sum
                .iter()
                .zip(count.iter())
                .map(|(s, c)| if *c > 0 { s / *c as f64 } else { f64::NAN })
                .collect();
            let first_null =
                first_local_minimum(&profile).ok_or(EpsilonError::NoNull { chan })?;

            // Dirty-beam area: the signed sum out to the first null.
            let psf_sum: f64 = signed_sum[..first_null].iter().sum();
            let clean_psf_sum = beam.pixels_per_beam(pix_scale_deg);
            let epsilon = clean_psf_sum / psf_sum;

            debug!(
                "Channel {chan}: clean beam area {clean_psf_sum:.3} px, \
                 dirty beam area {psf_sum:.3} px (first null at r = {first_null}), \
                 epsilon = {epsilon:.5}"
            );
            Ok(epsilon)
        })
        .collect::<Result<Vec<_>, EpsilonError>>()?;

    Ok(EpsilonTable {
        epsilon,
        clean_beam,
    })
}

/// Scale a residual cube by per-channel epsilons and add it to a convolved
/// model, giving a rescaled restored image.
pub fn rescale(
    conv_model: &Array3<f32>,
    epsilon: &[f64],
    residual: &ImageCube,
) -> Result<Array3<f32>, EpsilonError> {
    if conv_model.dim() != residual.data.dim() || epsilon.len() != residual.num_chans() {
        return Err(EpsilonError::ShapeMismatch {
            model_chans: conv_model.len_of(Axis(0)),
            residual_chans: residual.num_chans(),
            epsilon_chans: epsilon.len(),
        });
    }

    let mut restored = conv_model.clone();
    for (chan, mut plane) in restored.axis_iter_mut(Axis(0)).enumerate() {
        let eps = epsilon[chan] as f32;
        plane.zip_mut_with(&residual.plane(chan), |m, r| *m += eps * r);
    }
    Ok(restored)
}

/// The index of the largest finite value, or None when everything is NaN.
fn argmax(plane: ArrayView2<f32>) -> Option<(usize, usize)> {
    let mut best: Option<((usize, usize), f32)> = None;
    for (idx, &v) in plane.indexed_iter() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, best_v)) if v <= best_v => (),
            _ => best = Some((idx, v)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// The index of the first strict local minimum, skipping leading NaNs.
fn first_local_minimum(profile: &[f64]) -> Option<usize> {
    for i in 1..profile.len().saturating_sub(1) {
        let (prev, here, next) = (profile[i - 1], profile[i], profile[i + 1]);
        if prev.is_nan() || here.is_nan() || next.is_nan() {
            continue;
        }
        if here < prev && here < next {
            return Some(i);
        }
    }
    None
}

#[derive(Error, Debug)]
pub enum EpsilonError {
    #[error("{0}: no pixel scale (CDELT2) in the header; can't compute beam areas")]
    MissingPixScale(std::path::PathBuf),

    #[error("{0}: no beam information for any channel")]
    NoBeam(std::path::PathBuf),

    #[error("Channel {chan}: all pixels are NaN; no PSF peak")]
    NoPeak { chan: usize },

    #[error("Channel {chan}: the radial profile has no local minimum; \
             is this really a PSF image? (try a larger search window)")]
    NoNull { chan: usize },

    #[error("Shape mismatch: model has {model_chans} channels, residual {residual_chans}, epsilon table {epsilon_chans}")]
    ShapeMismatch {
        model_chans: usize,
        residual_chans: usize,
        epsilon_chans: usize,
    },

    #[error(transparent)]
    Cube(#[from] CubeError),
}
