// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;

use super::*;

#[test]
fn nanmedian_ignores_nans() {
    assert_abs_diff_eq!(nanmedian(&[1.0, f32::NAN, 3.0, 2.0]), 2.0);
    assert_abs_diff_eq!(nanmedian(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    assert!(nanmedian(&[f32::NAN]).is_nan());
}

#[test]
fn nanmax_ignores_nans() {
    assert_abs_diff_eq!(nanmax(&[1.0, f32::NAN, 3.0, -2.0]), 3.0);
    assert_abs_diff_eq!(nanmax(&[-5.0, -1.0]), -1.0);
    assert!(nanmax(&[]).is_nan());
}

#[test]
fn mad_std_of_symmetric_data() {
    // Deviations from the median 3 are [2, 1, 0, 1, 2]; MAD = 1.
    let data = [1.0, 2.0, 3.0, 4.0, 5.0];
    assert_abs_diff_eq!(mad_std(&data), 1.482602218505602, epsilon = 1e-12);
}

#[test]
fn mad_std_is_nan_robust() {
    let data = [1.0, 2.0, 3.0, 4.0, 5.0, f32::NAN, f32::NAN];
    assert_abs_diff_eq!(mad_std(&data), 1.482602218505602, epsilon = 1e-12);
}

#[test]
fn percentile_interpolates_linearly() {
    let data = [1.0, 2.0, 3.0, 4.0];
    assert_abs_diff_eq!(percentile(&data, 0.0), 1.0);
    assert_abs_diff_eq!(percentile(&data, 100.0), 4.0);
    assert_abs_diff_eq!(percentile(&data, 50.0), 2.5);
    assert_abs_diff_eq!(percentile(&data, 25.0), 1.75);
}

#[test]
fn percentile_of_score_counts_weak_rank() {
    let data = [10.0, 20.0, 30.0, 40.0];
    assert_abs_diff_eq!(percentile_of_score(&data, 25.0), 50.0);
    assert_abs_diff_eq!(percentile_of_score(&data, 40.0), 100.0);
    assert_abs_diff_eq!(percentile_of_score(&data, 5.0), 0.0);
}

#[test]
fn weighted_mean_basic() {
    assert_abs_diff_eq!(weighted_mean(&[1.0, 3.0], &[1.0, 1.0]), 2.0);
    assert_abs_diff_eq!(weighted_mean(&[1.0, 3.0], &[3.0, 1.0]), 1.5);
    assert!(weighted_mean(&[1.0], &[0.0]).is_nan());
}
