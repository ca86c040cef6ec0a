// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Convolution of model images with a clean beam.
//!
//! The kernel is a peak-one elliptical Gaussian, so convolving a model in
//! Jy/pixel yields an image in Jy/beam directly (the kernel's sum is the
//! number of pixels per beam).

use std::path::PathBuf;

use log::debug;
use ndarray::parallel::prelude::*;
use ndarray::prelude::*;
use thiserror::Error;

use crate::beam::{Beam, FWHM_TO_SIGMA};
use crate::cube::ImageCube;

/// Render `beam` as a peak-one Gaussian kernel on the given pixel scale. The
/// kernel is truncated at 8 sigma of the major axis.
pub fn beam_kernel(beam: Beam, pix_scale_deg: f64) -> Array2<f32> {
    let pix_arcsec = pix_scale_deg.abs() * 3600.0;
    let sigma_major = beam.major / FWHM_TO_SIGMA / pix_arcsec;
    let sigma_minor = beam.minor / FWHM_TO_SIGMA / pix_arcsec;
    let half = (8.0 * sigma_major).ceil() as usize;
    let size = 2 * half + 1;

    let theta = beam.pa.to_radians();
    let (sinth, costh) = theta.sin_cos();
    let mut kernel = Array2::<f32>::zeros((size, size));
    for ((y, x), v) in kernel.indexed_iter_mut() {
        let dy = y as f64 - half as f64;
        let dx = x as f64 - half as f64;
        // Rotate into the beam frame: u along the minor axis, w along the
        // major axis.
        let u = dx * costh + dy * sinth;
        let w = dx * sinth - dy * costh;
        *v = (-0.5 * ((u / sigma_minor).powi(2) + (w / sigma_major).powi(2))).exp() as f32;
    }
    kernel
}

/// Convolve a single image plane with a kernel. NaN pixels contribute
/// nothing, and pixels beyond the image edge are treated as zero.
pub fn convolve_plane(plane: ArrayView2<f32>, kernel: &Array2<f32>) -> Array2<f32> {
    let (height, width) = plane.dim();
    let (kh, kw) = kernel.dim();
    let (cy, cx) = (kh / 2, kw / 2);

    let mut out = Array2::<f32>::zeros((height, width));
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(y, mut row)| {
            for x in 0..width {
                let mut sum = 0.0_f64;
                for ((ky, kx), &k) in kernel.indexed_iter() {
                    let iy = y as isize + ky as isize - cy as isize;
                    let ix = x as isize + kx as isize - cx as isize;
                    if iy < 0 || ix < 0 || iy >= height as isize || ix >= width as isize {
                        continue;
                    }
                    let v = plane[(iy as usize, ix as usize)];
                    if v.is_nan() || v == 0.0 {
                        continue;
                    }
                    sum += k as f64 * v as f64;
                }
                row[x] = sum as f32;
            }
        });
    out
}

/// Convolve every channel of a model cube with `beam`, giving a cube in
/// Jy/beam.
pub fn convolve_cube(model: &ImageCube, beam: Beam) -> Result<Array3<f32>, ConvolveError> {
    let pix_scale_deg = model
        .pix_scale_deg
        .ok_or_else(|| ConvolveError::MissingPixScale(model.path.clone()))?;
    let kernel = beam_kernel(beam, pix_scale_deg);
    debug!(
        "Convolving {} channels with a {}x{} px kernel ({beam})",
        model.num_chans(),
        kernel.len_of(Axis(0)),
        kernel.len_of(Axis(1)),
    );

    let planes: Vec<Array2<f32>> = (0..model.num_chans())
        .map(|chan| convolve_plane(model.plane(chan), &kernel))
        .collect();
    let mut out = Array3::zeros(model.data.dim());
    for (chan, plane) in planes.into_iter().enumerate() {
        out.index_axis_mut(Axis(0), chan).assign(&plane);
    }
    Ok(out)
}

#[derive(Error, Debug)]
pub enum ConvolveError {
    #[error("{0}: no pixel scale (CDELT2) in the header; can't render the beam kernel")]
    MissingPixScale(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn kernel_peak_is_one_and_sum_matches_beam_area() {
        let beam = Beam {
            major: 1.0,
            minor: 0.6,
            pa: 25.0,
        };
        let pix_scale_deg = 0.1 / 3600.0;
        let kernel = beam_kernel(beam, pix_scale_deg);
        let half = kernel.len_of(Axis(0)) / 2;
        assert_abs_diff_eq!(kernel[(half, half)], 1.0);

        // The integral of a peak-one Gaussian is the beam area in pixels.
        let sum: f64 = kernel.iter().map(|v| *v as f64).sum();
        assert_abs_diff_eq!(
            sum,
            beam.pixels_per_beam(pix_scale_deg),
            epsilon = sum * 1e-3
        );
    }

    #[test]
    fn convolving_a_delta_reproduces_the_kernel() {
        let beam = Beam {
            major: 0.5,
            minor: 0.5,
            pa: 0.0,
        };
        let kernel = beam_kernel(beam, 0.1 / 3600.0);
        let mut plane = Array2::<f32>::zeros((41, 41));
        plane[(20, 20)] = 2.0;

        let out = convolve_plane(plane.view(), &kernel);
        assert_abs_diff_eq!(out[(20, 20)], 2.0);
        let half = kernel.len_of(Axis(0)) / 2;
        assert_abs_diff_eq!(out[(20, 21)], 2.0 * kernel[(half, half + 1)], epsilon = 1e-6);
        assert_abs_diff_eq!(out[(18, 20)], 2.0 * kernel[(half - 2, half)], epsilon = 1e-6);
    }

    #[test]
    fn nans_contribute_nothing() {
        let beam = Beam {
            major: 0.5,
            minor: 0.5,
            pa: 0.0,
        };
        let kernel = beam_kernel(beam, 0.1 / 3600.0);
        let mut plane = Array2::<f32>::zeros((21, 21));
        plane[(10, 10)] = 1.0;
        plane[(10, 11)] = f32::NAN;

        let with_nan = convolve_plane(plane.view(), &kernel);
        plane[(10, 11)] = 0.0;
        let without = convolve_plane(plane.view(), &kernel);
        assert_abs_diff_eq!(with_nan[(10, 10)], without[(10, 10)]);
    }
}
