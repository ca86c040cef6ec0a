// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to interface with CASA measurement sets.
//!
//! Only the handful of columns the u,v-coverage analysis needs are touched:
//! per-row baseline lengths, weights and flags from the main table, and
//! per-spectral-window channel frequencies from SPECTRAL_WINDOW.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, trace};
use marlu::rubbl_casatables;
use ndarray::prelude::*;
use rubbl_casatables::{Table, TableOpenMode};
use thiserror::Error;

/// Open a measurement set table read only. If `table` is `None`, then open the
/// base table.
fn read_table(ms: &Path, table: Option<&str>) -> Result<Table, MsReadError> {
    let t = Table::open(
        format!("{}/{}", ms.display(), table.unwrap_or("")),
        TableOpenMode::Read,
    )?;
    Ok(t)
}

/// The per-spectral-window arrays needed to histogram u,v coverage.
pub(crate) struct SpwUvData {
    /// Spectral-window index (from the DATA_DESCRIPTION table).
    pub(crate) spw: usize,

    /// Projected baseline length per row, metres (sqrt(u^2 + v^2)).
    pub(crate) uvdist: Vec<f64>,

    /// Weight per row, averaged over polarisation.
    pub(crate) weight: Vec<f64>,

    /// Is the row flagged? A row counts as flagged when any element of its
    /// FLAG cell is set, matching the `flag.any(axis=(0,1))` convention of
    /// the original analysis.
    pub(crate) flagged: Vec<bool>,
}

/// Everything `imgqa uvhist` pulls out of one measurement set.
pub(crate) struct MsUvData {
    pub(crate) ms: PathBuf,

    /// The weighted-mean wavelength of all spectral windows, metres.
    pub(crate) wavelength: f64,

    pub(crate) spws: Vec<SpwUvData>,
}

impl MsUvData {
    /// Read baseline lengths, weights, flags and the mean wavelength from a
    /// measurement set.
    pub(crate) fn read<P: AsRef<Path>>(ms: P) -> Result<MsUvData, MsReadError> {
        fn inner(ms: &Path) -> Result<MsUvData, MsReadError> {
            debug!("Using measurement set: {}", ms.display());
            if !ms.exists() {
                return Err(MsReadError::BadFile(ms.to_path_buf()));
            }

            let mut main_table = read_table(ms, None)?;
            if main_table.n_rows() == 0 {
                return Err(MsReadError::MainTableEmpty);
            }

            // Map DATA_DESC_ID to a spectral-window index.
            let mut dd_table = read_table(ms, Some("DATA_DESCRIPTION"))?;
            let ddid_to_spw: Vec<i32> = dd_table.get_col_as_vec("SPECTRAL_WINDOW_ID")?;

            // The weighted-mean frequency over all spectral windows, using
            // the channel frequencies themselves as weights.
            let mut spw_table = read_table(ms, Some("SPECTRAL_WINDOW"))?;
            let mut freq_sum = 0.0;
            let mut freq_weight_sum = 0.0;
            for i_spw in 0..spw_table.n_rows() {
                let chan_freqs: Vec<f64> = spw_table.get_cell_as_vec("CHAN_FREQ", i_spw)?;
                for f in chan_freqs {
                    freq_sum += f * f;
                    freq_weight_sum += f;
                }
            }
            if freq_weight_sum <= 0.0 {
                return Err(MsReadError::NoChannelFreqs);
            }
            let avg_freq_hz = freq_sum / freq_weight_sum;
            let wavelength = marlu::constants::VEL_C / avg_freq_hz;
            trace!("Mean frequency {avg_freq_hz} Hz, wavelength {wavelength} m");

            // One pass over the main table, binning rows by spectral window.
            let mut per_spw: BTreeMap<usize, SpwUvData> = BTreeMap::new();
            let n_rows = main_table.n_rows();
            main_table.for_each_row_in_range(0..n_rows, |row| {
                let ddid: i32 = row.get_cell("DATA_DESC_ID")?;
                let spw = ddid_to_spw
                    .get(ddid as usize)
                    .map(|i| *i as usize)
                    .unwrap_or(ddid as usize);

                let uvw: Vec<f64> = row.get_cell("UVW")?;
                let weights: Vec<f32> = row.get_cell("WEIGHT")?;
                let flags: Array2<bool> = row.get_cell("FLAG")?;

                let entry = per_spw.entry(spw).or_insert_with(|| SpwUvData {
                    spw,
                    uvdist: vec![],
                    weight: vec![],
                    flagged: vec![],
                });
                entry
                    .uvdist
                    .push((uvw[0] * uvw[0] + uvw[1] * uvw[1]).sqrt());
                entry.weight.push(
                    weights.iter().map(|w| *w as f64).sum::<f64>() / weights.len().max(1) as f64,
                );
                entry.flagged.push(flags.iter().any(|f| *f));
                Ok(())
            })?;

            Ok(MsUvData {
                ms: ms.to_path_buf(),
                wavelength,
                spws: per_spw.into_values().collect(),
            })
        }
        inner(ms.as_ref())
    }

    /// Concatenate unflagged baseline lengths and weights over all spectral
    /// windows.
    pub(crate) fn unflagged(&self) -> (Vec<f64>, Vec<f64>) {
        let mut uvdist = vec![];
        let mut weight = vec![];
        for spw in &self.spws {
            for ((&d, &w), &f) in spw
                .uvdist
                .iter()
                .zip(spw.weight.iter())
                .zip(spw.flagged.iter())
            {
                if !f {
                    uvdist.push(d);
                    weight.push(w);
                }
            }
        }
        (uvdist, weight)
    }
}

#[derive(Error, Debug)]
pub(crate) enum MsReadError {
    #[error("Supplied file path {0} does not exist or is not readable!")]
    BadFile(PathBuf),

    #[error("The main table of the measurement set contains no rows!")]
    MainTableEmpty,

    #[error("The SPECTRAL_WINDOW table contained no channel frequencies")]
    NoChannelFreqs,

    #[error("Error when trying to interface with measurement set: {0}")]
    Table(#[from] rubbl_casatables::TableError),

    #[error("Error from casacore: {0}")]
    Casacore(#[from] rubbl_casatables::CasacoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unflagged_filters_and_concatenates() {
        let data = MsUvData {
            ms: PathBuf::from("test.ms"),
            wavelength: 1.3e-3,
            spws: vec![
                SpwUvData {
                    spw: 0,
                    uvdist: vec![10.0, 20.0, 30.0],
                    weight: vec![1.0, 2.0, 3.0],
                    flagged: vec![false, true, false],
                },
                SpwUvData {
                    spw: 1,
                    uvdist: vec![40.0],
                    weight: vec![4.0],
                    flagged: vec![false],
                },
            ],
        };

        let (uvdist, weight) = data.unflagged();
        assert_eq!(uvdist, &[10.0, 30.0, 40.0]);
        assert_eq!(weight, &[1.0, 3.0, 4.0]);
    }
}
