// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Robust statistics over image and visibility data. All functions ignore
//! NaNs, matching the nan-aware numpy/astropy routines they stand in for.

#[cfg(test)]
mod tests;

/// 1 / Phi^-1(3/4): scales a median absolute deviation to a standard
/// deviation for normally-distributed data.
const MAD_SCALE: f64 = 1.482602218505602;

/// Collect the finite values of a slice, sorted ascending.
fn finite_sorted(data: &[f32]) -> Vec<f64> {
    let mut xs: Vec<f64> = data
        .iter()
        .filter(|v| !v.is_nan())
        .map(|v| *v as f64)
        .collect();
    xs.sort_unstable_by(|a, b| a.total_cmp(b));
    xs
}

fn median_of_sorted(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    let n = xs.len();
    if n % 2 == 1 {
        xs[n / 2]
    } else {
        0.5 * (xs[n / 2 - 1] + xs[n / 2])
    }
}

/// The median, ignoring NaNs.
pub fn nanmedian(data: &[f32]) -> f64 {
    median_of_sorted(&finite_sorted(data))
}

/// The maximum, ignoring NaNs.
pub fn nanmax(data: &[f32]) -> f64 {
    data.iter()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, |acc, &v| {
            if acc.is_nan() || (v as f64) > acc {
                v as f64
            } else {
                acc
            }
        })
}

/// The median-absolute-deviation estimate of the standard deviation,
/// ignoring NaNs (astropy's `mad_std`).
pub fn mad_std(data: &[f32]) -> f64 {
    let xs = finite_sorted(data);
    let med = median_of_sorted(&xs);
    let mut deviations: Vec<f64> = xs.iter().map(|x| (x - med).abs()).collect();
    deviations.sort_unstable_by(|a, b| a.total_cmp(b));
    MAD_SCALE * median_of_sorted(&deviations)
}

/// The `q`th percentile (0..=100) with linear interpolation between order
/// statistics (numpy's default).
pub fn percentile(data: &[f64], q: f64) -> f64 {
    let mut xs: Vec<f64> = data.iter().copied().filter(|v| !v.is_nan()).collect();
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.sort_unstable_by(|a, b| a.total_cmp(b));
    let rank = q / 100.0 * (xs.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        xs[lo]
    } else {
        let frac = rank - lo as f64;
        xs[lo] * (1.0 - frac) + xs[hi] * frac
    }
}

/// The percentile rank of `score`: the percentage of samples at or below it
/// (scipy's `percentileofscore` with its default "mean" of strict and weak
/// ranks reduced to the weak rank for continuous data).
pub fn percentile_of_score(data: &[f64], score: f64) -> f64 {
    let mut below = 0_usize;
    let mut total = 0_usize;
    for &v in data {
        if v.is_nan() {
            continue;
        }
        total += 1;
        if v <= score {
            below += 1;
        }
    }
    if total == 0 {
        return f64::NAN;
    }
    100.0 * below as f64 / total as f64
}

/// The weighted arithmetic mean. NaN when the weights sum to zero.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut weight_sum = 0.0;
    for (&v, &w) in values.iter().zip(weights.iter()) {
        if v.is_nan() || w.is_nan() {
            continue;
        }
        sum += v * w;
        weight_sum += w;
    }
    if weight_sum == 0.0 {
        f64::NAN
    } else {
        sum / weight_sum
    }
}
