// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tabulate beam and noise statistics for a collection of FITS images.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info};
use rayon::prelude::*;
use serde_json::{json, Value};
use thiserror::Error;

use crate::cube::{CubeError, ImageCube};
use crate::filenames::ProductName;
use crate::io::{get_all_matches_from_glob, GlobError};
use crate::stats::{mad_std, nanmax};
use crate::tabulate::{Table, TableFormat, TabulateError};
use crate::{ImgQaError, PROGRESS_BARS};

const COLUMNS: [&str; 12] = [
    "region",
    "band",
    "array",
    "selfcaliter",
    "robust",
    "suffix",
    "bmaj",
    "bmin",
    "bpa",
    "peak",
    "mad",
    "peak/mad",
];

#[derive(Parser, Debug)]
pub(super) struct StatsArgs {
    /// Glob patterns matching the FITS images to analyse.
    #[clap(name = "GLOBS", required = true)]
    globs: Vec<String>,

    /// A filename trailer to strip before parsing product metadata.
    #[clap(long, default_value = ".image.tt")]
    ditch_suffix: String,

    /// The path stem of the output tables; one file is written per format.
    #[clap(short, long, default_value = "imstats")]
    output: PathBuf,

    /// The table formats to write (text, html, latex, json).
    #[clap(long, multiple_values(true), default_values = &["text", "html", "latex", "json"])]
    formats: Vec<String>,
}

impl StatsArgs {
    pub(super) fn run(self) -> Result<(), ImgQaError> {
        stats(self)?;
        Ok(())
    }
}

fn stats(args: StatsArgs) -> Result<(), StatsError> {
    let StatsArgs {
        globs,
        ditch_suffix,
        output,
        formats,
    } = args;

    let formats = formats
        .iter()
        .map(|f| TableFormat::from_str(f))
        .collect::<Result<Vec<_>, _>>()?;

    let mut files: Vec<PathBuf> = vec![];
    for pattern in &globs {
        files.extend(get_all_matches_from_glob(pattern)?);
    }
    files.sort_unstable();
    files.dedup();
    if files.is_empty() {
        return Err(StatsError::NoMatches(globs.join(" ")));
    }
    info!("Computing statistics for {} images", files.len());

    let pb = ProgressBar::new(files.len() as _)
        .with_style(
            ProgressStyle::default_bar()
                .template("{msg:17}: [{wide_bar:.blue}] {pos:4}/{len:4} ({elapsed_precise}<{eta_precise})").unwrap()
                .progress_chars("=> "),
        )
        .with_position(0)
        .with_message("Reading images");
    if !PROGRESS_BARS.load() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    let rows = files
        .par_iter()
        .progress_with(pb)
        .map(|file| image_record(file, &ditch_suffix))
        .collect::<Result<Vec<_>, StatsError>>()?;

    let mut table = Table::new(&COLUMNS);
    for row in rows {
        table.push_row(row)?;
    }

    for format in formats {
        let out = output.with_extension(format.extension());
        std::fs::write(&out, table.render(format))?;
        info!("Wrote {}", out.display());
    }
    Ok(())
}

/// One table row for one image.
fn image_record(file: &PathBuf, ditch_suffix: &str) -> Result<Vec<Value>, StatsError> {
    debug!("Getting stats for {}", file.display());
    let cube = ImageCube::read(file)?;
    let name = ProductName::parse(file, Some(ditch_suffix));

    let data: Vec<f32> = cube.data.iter().copied().collect();
    let peak = nanmax(&data);
    let mad = mad_std(&data);
    let (bmaj, bmin, bpa) = match cube.beam {
        Some(beam) => (json!(beam.major), json!(beam.minor), json!(beam.pa)),
        None => (Value::Null, Value::Null, Value::Null),
    };

    Ok(vec![
        json!(name.region),
        json!(name.band),
        json!(name.array.to_string()),
        json!(name.selfcal_iter),
        json!(name.robust),
        json!(name.suffix),
        bmaj,
        bmin,
        bpa,
        json!(peak),
        json!(mad),
        json!(peak / mad),
    ])
}

#[derive(Error, Debug)]
pub(super) enum StatsError {
    #[error("No FITS images matched '{0}'")]
    NoMatches(String),

    #[error(transparent)]
    Table(#[from] TabulateError),

    #[error(transparent)]
    Cube(#[from] CubeError),

    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
