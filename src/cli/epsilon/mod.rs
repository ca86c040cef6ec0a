// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Beam-volume correction estimation and restoration.

use std::path::PathBuf;

use clap::Parser;
use log::{debug, info};
use thiserror::Error;

use crate::convolve::{convolve_cube, ConvolveError};
use crate::cube::{CubeError, ImageCube};
use crate::epsilon::{epsilon_from_psf, rescale, EpsilonError, EpsilonTable};
use crate::ImgQaError;

#[derive(Parser, Debug)]
pub(super) struct EpsilonArgs {
    /// The PSF (dirty beam) cube.
    #[clap(name = "PSF", parse(from_os_str))]
    psf: PathBuf,

    /// The half-width of the window around the PSF peak searched for the
    /// first null [pixels].
    #[clap(long, default_value = "100")]
    max_npix_peak: usize,

    /// Where to write the epsilon table. Defaults to the PSF path with an
    /// `.epsilon.json` extension.
    #[clap(short, long, parse(from_os_str))]
    output: Option<PathBuf>,
}

impl EpsilonArgs {
    pub(super) fn run(self) -> Result<(), ImgQaError> {
        let EpsilonArgs {
            psf,
            max_npix_peak,
            output,
        } = self;
        let output = output.unwrap_or_else(|| psf.with_extension("epsilon.json"));

        let table = compute_epsilon(&psf, max_npix_peak)?;
        write_epsilon_table(&table, &output)?;
        Ok(())
    }
}

#[derive(Parser, Debug)]
pub(super) struct RestoreArgs {
    /// The model image (Jy/pixel).
    #[clap(name = "MODEL", parse(from_os_str))]
    model: PathBuf,

    /// The residual image (Jy/dirty-beam).
    #[clap(name = "RESIDUAL", parse(from_os_str))]
    residual: PathBuf,

    /// A PSF cube to derive the epsilon factors from. Either this or
    /// `--epsilon` must be given.
    #[clap(long, parse(from_os_str), conflicts_with = "epsilon")]
    psf: Option<PathBuf>,

    /// A previously-written epsilon table (JSON).
    #[clap(long, parse(from_os_str))]
    epsilon: Option<PathBuf>,

    /// See `epsilon --max-npix-peak`; only used with `--psf`.
    #[clap(long, default_value = "100")]
    max_npix_peak: usize,

    /// Where to write the restored image. Defaults to the residual path with
    /// a `.resc_restored.fits` extension.
    #[clap(short, long, parse(from_os_str))]
    output: Option<PathBuf>,
}

impl RestoreArgs {
    pub(super) fn run(self) -> Result<(), ImgQaError> {
        restore(self)?;
        Ok(())
    }
}

fn compute_epsilon(psf: &PathBuf, max_npix_peak: usize) -> Result<EpsilonTable, EpsilonCliError> {
    let psf_cube = ImageCube::read(psf)?;
    info!(
        "Estimating epsilon for {} channels of {}",
        psf_cube.num_chans(),
        psf.display()
    );
    let table = epsilon_from_psf(&psf_cube, max_npix_peak)?;
    info!("Common clean beam: {}", table.clean_beam);
    for (chan, epsilon) in table.epsilon.iter().enumerate() {
        info!("Channel {chan}: epsilon = {epsilon:.5}");
    }
    Ok(table)
}

fn write_epsilon_table(table: &EpsilonTable, output: &PathBuf) -> Result<(), EpsilonCliError> {
    let mut contents = serde_json::to_string_pretty(table)?;
    contents.push('\n');
    std::fs::write(output, contents)?;
    info!("Wrote {}", output.display());
    Ok(())
}

fn restore(args: RestoreArgs) -> Result<(), RestoreError> {
    let RestoreArgs {
        model,
        residual,
        psf,
        epsilon,
        max_npix_peak,
        output,
    } = args;
    let output = output.unwrap_or_else(|| residual.with_extension("resc_restored.fits"));

    let table = match (psf, epsilon) {
        (Some(psf), _) => compute_epsilon(&psf, max_npix_peak)?,
        (None, Some(epsilon)) => {
            debug!("Reading epsilon table {}", epsilon.display());
            let contents = std::fs::read_to_string(epsilon)?;
            serde_json::from_str(&contents)?
        }
        (None, None) => return Err(RestoreError::NoEpsilonSource),
    };

    let model = ImageCube::read(&model)?;
    let residual = ImageCube::read(&residual)?;

    info!("Convolving the model with {}", table.clean_beam);
    let conv_model = convolve_cube(&model, table.clean_beam)?;
    let restored = rescale(&conv_model, &table.epsilon, &residual)?;

    let restored_cube = ImageCube {
        path: output.clone(),
        data: restored,
        pix_scale_deg: residual.pix_scale_deg,
        unit: Some(
            residual
                .unit
                .clone()
                .unwrap_or_else(|| "Jy/beam".to_string()),
        ),
        beam: Some(table.clean_beam),
        beams: None,
    };
    restored_cube.write(&output)?;
    info!("Wrote {}", output.display());
    Ok(())
}

#[derive(Error, Debug)]
pub(super) enum EpsilonCliError {
    #[error(transparent)]
    Epsilon(#[from] EpsilonError),

    #[error(transparent)]
    Cube(#[from] CubeError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

impl From<EpsilonCliError> for RestoreError {
    fn from(e: EpsilonCliError) -> Self {
        match e {
            EpsilonCliError::Epsilon(e) => Self::Epsilon(e),
            EpsilonCliError::Cube(e) => Self::Cube(e),
            EpsilonCliError::Json(e) => Self::Json(e),
            EpsilonCliError::IO(e) => Self::IO(e),
        }
    }
}

#[derive(Error, Debug)]
pub(super) enum RestoreError {
    #[error("One of --psf or --epsilon must be supplied")]
    NoEpsilonSource,

    #[error(transparent)]
    Epsilon(#[from] EpsilonError),

    #[error(transparent)]
    Cube(#[from] CubeError),

    #[error(transparent)]
    Convolve(#[from] ConvolveError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
