// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all imgqa-related errors. This should be the *only* error
//! enum that is publicly visible.

use thiserror::Error;

use super::{
    compare::CompareError,
    epsilon::{EpsilonCliError, RestoreError},
    stats::StatsError,
    uvhist::UvHistError,
};
use crate::{
    convolve::ConvolveError,
    cube::CubeError,
    epsilon::EpsilonError,
    io::{fits::FitsError, ms::MsReadError, GlobError},
};

/// The *only* publicly visible error from imgqa.
#[derive(Error, Debug)]
pub enum ImgQaError {
    /// An error related to the stats subcommand.
    #[error("{0}")]
    Stats(String),

    /// An error related to the compare subcommand.
    #[error("{0}")]
    Compare(String),

    /// An error related to the uvhist subcommand.
    #[error("{0}")]
    UvHist(String),

    /// An error related to the epsilon or restore subcommands.
    #[error("{0}")]
    Epsilon(String),

    /// A cfitsio error. Because these are usually quite spartan, some
    /// suggestions are provided here.
    #[error("cfitsio error: {0}\n\nIf you don't know what this means, try turning up verbosity (-v or -vv) and maybe disabling progress bars.")]
    Cfitsio(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

// Binary sub-command errors.

impl From<StatsError> for ImgQaError {
    fn from(e: StatsError) -> Self {
        let s = e.to_string();
        match e {
            StatsError::NoMatches(_) | StatsError::Table(_) => Self::Stats(s),
            StatsError::Cube(e) => Self::from(e),
            StatsError::Glob(e) => Self::from(e),
            StatsError::IO(e) => Self::from(e),
        }
    }
}

impl From<CompareError> for ImgQaError {
    fn from(e: CompareError) -> Self {
        let s = e.to_string();
        match e {
            #[cfg(not(feature = "plotting"))]
            CompareError::NoPlottingFeature => Self::Compare(s),
            #[cfg(feature = "plotting")]
            CompareError::ShapeMismatch { .. } | CompareError::Draw(_) => Self::Compare(s),
            CompareError::Cube(e) => Self::from(e),
            CompareError::Glob(e) => Self::from(e),
            CompareError::IO(e) => Self::from(e),
        }
    }
}

impl From<UvHistError> for ImgQaError {
    fn from(e: UvHistError) -> Self {
        let s = e.to_string();
        match e {
            UvHistError::NoInputs
            | UvHistError::BadBins
            | UvHistError::NoUnflaggedData(_)
            | UvHistError::Table(_) => Self::UvHist(s),
            #[cfg(feature = "plotting")]
            UvHistError::Draw(_) => Self::UvHist(s),
            UvHistError::Ms(_) => Self::UvHist(s),
            UvHistError::IO(e) => Self::from(e),
        }
    }
}

impl From<EpsilonCliError> for ImgQaError {
    fn from(e: EpsilonCliError) -> Self {
        let s = e.to_string();
        match e {
            EpsilonCliError::Epsilon(e) => Self::from(e),
            EpsilonCliError::Cube(e) => Self::from(e),
            EpsilonCliError::Json(_) => Self::Generic(s),
            EpsilonCliError::IO(e) => Self::from(e),
        }
    }
}

impl From<RestoreError> for ImgQaError {
    fn from(e: RestoreError) -> Self {
        let s = e.to_string();
        match e {
            RestoreError::NoEpsilonSource | RestoreError::Convolve(_) => Self::Epsilon(s),
            RestoreError::Epsilon(e) => Self::from(e),
            RestoreError::Cube(e) => Self::from(e),
            RestoreError::Json(_) => Self::Generic(s),
            RestoreError::IO(e) => Self::from(e),
        }
    }
}

// Library code errors.

impl From<CubeError> for ImgQaError {
    fn from(e: CubeError) -> Self {
        let s = e.to_string();
        match e {
            CubeError::BadDims { .. } | CubeError::NoBeam(_) => Self::Generic(s),
            CubeError::Fits(e) => Self::from(e),
        }
    }
}

impl From<EpsilonError> for ImgQaError {
    fn from(e: EpsilonError) -> Self {
        let s = e.to_string();
        match e {
            EpsilonError::Cube(e) => Self::from(e),
            _ => Self::Epsilon(s),
        }
    }
}

impl From<ConvolveError> for ImgQaError {
    fn from(e: ConvolveError) -> Self {
        Self::Epsilon(e.to_string())
    }
}

impl From<MsReadError> for ImgQaError {
    fn from(e: MsReadError) -> Self {
        Self::UvHist(e.to_string())
    }
}

impl From<FitsError> for ImgQaError {
    fn from(e: FitsError) -> Self {
        Self::Cfitsio(e.to_string())
    }
}

impl From<GlobError> for ImgQaError {
    fn from(e: GlobError) -> Self {
        Self::Generic(e.to_string())
    }
}

impl From<std::io::Error> for ImgQaError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
