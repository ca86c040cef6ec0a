// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Baseline-length distributions of measurement sets.
//!
//! For each measurement set, the unflagged projected baseline lengths are
//! histogrammed (raw and weighted) and summarised as percentiles converted to
//! angular scale. The percentile records accumulate into one table across all
//! inputs, plus a per-band box-plot summary figure.

use std::path::PathBuf;

use clap::Parser;
use log::info;
use serde_json::{json, Value};
use thiserror::Error;

use crate::beam::Beam;
use crate::filenames::ProductName;
use crate::io::ms::{MsReadError, MsUvData};
use crate::stats::{percentile, percentile_of_score};
use crate::tabulate::{Table, TableFormat, TabulateError};
use crate::ImgQaError;

/// Radians to arcseconds.
const RAD_TO_ARCSEC: f64 = 3600.0 * 180.0 / std::f64::consts::PI;

/// The baseline-length percentiles that are reported.
const PERCENTILES: [f64; 9] = [1.0, 5.0, 10.0, 25.0, 50.0, 75.0, 90.0, 95.0, 99.0];

#[derive(Parser, Debug)]
pub(super) struct UvHistArgs {
    /// The measurement sets to analyse.
    #[clap(name = "MEASUREMENT_SETS", required = true, parse(from_os_str))]
    ms: Vec<PathBuf>,

    /// The directory to write figures and tables into.
    #[clap(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// The number of histogram bins.
    #[clap(long, default_value = "50")]
    bins: usize,

    /// The major axis of the restoring beam [arcsec], drawn onto the
    /// histograms and ranked against the baseline distribution.
    #[clap(long, requires = "beam-minor")]
    beam_major: Option<f64>,

    /// The minor axis of the restoring beam [arcsec].
    #[clap(long, requires = "beam-major")]
    beam_minor: Option<f64>,
}

impl UvHistArgs {
    pub(super) fn run(self) -> Result<(), ImgQaError> {
        uvhist(self)?;
        Ok(())
    }
}

/// One measurement set's percentile summary.
struct UvRecord {
    ms: String,
    name: ProductName,

    /// Mean wavelength [m].
    wavelength: f64,

    /// λ/L for the baseline-length percentiles in [PERCENTILES] [arcsec].
    angular_scales: [f64; 9],

    beam: Option<Beam>,

    /// Percentile ranks of the beam axes' equivalent baselines.
    beam_major_rank: Option<f64>,
    beam_minor_rank: Option<f64>,
}

fn uvhist(args: UvHistArgs) -> Result<(), UvHistError> {
    let UvHistArgs {
        ms,
        output_dir,
        bins,
        beam_major,
        beam_minor,
    } = args;
    if ms.is_empty() {
        return Err(UvHistError::NoInputs);
    }
    if bins == 0 {
        return Err(UvHistError::BadBins);
    }
    if !output_dir.exists() {
        std::fs::create_dir_all(&output_dir)?;
    }
    let beam = match (beam_major, beam_minor) {
        (Some(major), Some(minor)) => Some(Beam {
            major,
            minor,
            pa: 0.0,
        }),
        _ => None,
    };

    let mut records = vec![];
    for ms in &ms {
        let data = MsUvData::read(ms)?;
        let (uvdist, weight) = data.unflagged();
        if uvdist.is_empty() {
            return Err(UvHistError::NoUnflaggedData(ms.clone()));
        }
        info!(
            "{}: {} unflagged rows over {} spectral windows, wavelength {:.1} um",
            ms.display(),
            uvdist.len(),
            data.spws.len(),
            data.wavelength * 1e6
        );

        let mut angular_scales = [0.0; 9];
        for (scale, q) in angular_scales.iter_mut().zip(PERCENTILES.iter()) {
            *scale = data.wavelength / percentile(&uvdist, *q) * RAD_TO_ARCSEC;
        }

        // The baselines that resolve out the beam axes.
        let (beam_major_rank, beam_minor_rank) = match beam {
            Some(beam) => {
                let major_baseline = data.wavelength / (beam.major / RAD_TO_ARCSEC);
                let minor_baseline = data.wavelength / (beam.minor / RAD_TO_ARCSEC);
                (
                    Some(percentile_of_score(&uvdist, major_baseline)),
                    Some(percentile_of_score(&uvdist, minor_baseline)),
                )
            }
            None => (None, None),
        };

        let record = UvRecord {
            ms: ms
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            name: ProductName::parse(ms, Some(".ms")),
            wavelength: data.wavelength,
            angular_scales,
            beam,
            beam_major_rank,
            beam_minor_rank,
        };

        #[cfg(feature = "plotting")]
        {
            let output = output_dir.join(format!("{}_uvhistogram.png", record.ms));
            plotting::histogram_figure(&uvdist, &weight, &record, bins, &output)?;
            info!("Wrote {}", output.display());
        }
        #[cfg(not(feature = "plotting"))]
        {
            let _ = (&weight, bins);
            log::warn!(
                "Not compiled with the \"plotting\" feature; skipping the histogram figure"
            );
        }

        records.push(record);
    }

    let table = percentile_table(&records)?;
    for format in [TableFormat::Text, TableFormat::Json] {
        let out = output_dir.join(format!("uvhist.{}", format.extension()));
        std::fs::write(&out, table.render(format))?;
        info!("Wrote {}", out.display());
    }

    #[cfg(feature = "plotting")]
    {
        use itertools::Itertools;

        let sorted = records
            .iter()
            .sorted_by(|a, b| a.name.band.cmp(&b.name.band));
        let grouped = sorted.group_by(|r| r.name.band.clone());
        for (band, band_records) in &grouped {
            let band_records: Vec<&UvRecord> = band_records.collect();
            let output = output_dir.join(format!("uvhist_summary_{band}.png"));
            plotting::summary_figure(&band_records, &output)?;
            info!("Wrote {}", output.display());
        }
    }

    Ok(())
}

fn percentile_table(records: &[UvRecord]) -> Result<Table, TabulateError> {
    let mut columns: Vec<String> = vec!["ms".into(), "region".into(), "band".into()];
    columns.extend(PERCENTILES.iter().map(|q| format!("{q}%")));
    columns.extend(
        [
            "wavelength_um",
            "beam_major",
            "beam_minor",
            "beam_major_pctile",
            "beam_minor_pctile",
        ]
        .map(String::from),
    );

    let mut table = Table::new(&columns);
    for record in records {
        let mut row = vec![
            json!(record.ms),
            json!(record.name.region),
            json!(record.name.band),
        ];
        row.extend(
            record
                .angular_scales
                .iter()
                .map(|scale| json!((scale * 1000.0).round() / 1000.0)),
        );
        row.push(json!(record.wavelength * 1e6));
        match record.beam {
            Some(beam) => {
                row.push(json!(beam.major));
                row.push(json!(beam.minor));
            }
            None => row.extend([Value::Null, Value::Null]),
        }
        row.push(record.beam_major_rank.map(|r| json!(r)).unwrap_or(Value::Null));
        row.push(record.beam_minor_rank.map(|r| json!(r)).unwrap_or(Value::Null));
        table.push_row(row)?;
    }
    Ok(table)
}

#[cfg(feature = "plotting")]
mod plotting {
    use plotters::prelude::*;

    use super::*;

    const X_PIXELS: u32 = 1600;
    const Y_PIXELS: u32 = 700;

    /// Histogram the baseline lengths: raw counts and the weight density.
    /// Each density bin is the bin's summed weight over the total weight
    /// times the bin width, so the weighted histogram integrates to one.
    pub(super) fn bin_baselines(
        uvdist: &[f64],
        weight: &[f64],
        bins: usize,
        max_uvdist: f64,
    ) -> (Vec<f64>, Vec<f64>, f64) {
        let bin_width = max_uvdist / bins as f64;
        let mut counts = vec![0.0_f64; bins];
        let mut density = vec![0.0_f64; bins];
        for (&d, &w) in uvdist.iter().zip(weight.iter()) {
            let bin = ((d / bin_width) as usize).min(bins - 1);
            counts[bin] += 1.0;
            density[bin] += w;
        }
        let total_weight: f64 = weight.iter().sum();
        if total_weight > 0.0 {
            for d in density.iter_mut() {
                *d /= total_weight * bin_width;
            }
        }
        (counts, density, bin_width)
    }

    /// Two-panel histogram: counts on the left, the weight-normalised
    /// density on the right, with the interquartile band shaded and the
    /// beam-equivalent baselines marked.
    pub(super) fn histogram_figure(
        uvdist: &[f64],
        weight: &[f64],
        record: &UvRecord,
        bins: usize,
        output: &PathBuf,
    ) -> Result<(), UvHistError> {
        let max_uvdist = uvdist.iter().copied().fold(f64::MIN, f64::max) * 1.05;
        let (counts, density, bin_width) = bin_baselines(uvdist, weight, bins, max_uvdist);

        let q25 = percentile(uvdist, 25.0);
        let q75 = percentile(uvdist, 75.0);
        let beam_baselines = record.beam.map(|beam| {
            (
                record.wavelength / (beam.major / RAD_TO_ARCSEC),
                record.wavelength / (beam.minor / RAD_TO_ARCSEC),
            )
        });

        let root = BitMapBackend::new(output, (X_PIXELS, Y_PIXELS)).into_drawing_area();
        root.fill(&WHITE).map_err(to_draw_error)?;
        let panels = root.split_evenly((1, 2));

        for (panel, (values, y_desc)) in panels.iter().zip([
            (&counts, "Number of visibilities"),
            (&density, "Fractional weight"),
        ]) {
            let y_max = values.iter().copied().fold(f64::MIN, f64::max) * 1.05;
            let mut chart = ChartBuilder::on(panel)
                .margin(20)
                .x_label_area_size(50)
                .y_label_area_size(70)
                .caption(record.ms.as_str(), ("sans-serif", 24))
                .build_cartesian_2d(0.0..max_uvdist, 0.0..y_max)
                .map_err(to_draw_error)?;
            chart
                .configure_mesh()
                .disable_mesh()
                .x_desc("Projected baseline length (m)")
                .y_desc(y_desc)
                .draw()
                .map_err(to_draw_error)?;

            // Interquartile band underneath the histogram.
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(q25, 0.0), (q75, y_max)],
                    YELLOW.mix(0.2).filled(),
                )))
                .map_err(to_draw_error)?;

            chart
                .draw_series(values.iter().enumerate().map(|(i, &v)| {
                    Rectangle::new(
                        [(i as f64 * bin_width, 0.0), ((i + 1) as f64 * bin_width, v)],
                        BLUE.mix(0.6).filled(),
                    )
                }))
                .map_err(to_draw_error)?;

            if let Some((major_baseline, minor_baseline)) = beam_baselines {
                for baseline in [major_baseline, minor_baseline] {
                    chart
                        .draw_series(std::iter::once(PathElement::new(
                            vec![(baseline, 0.0), (baseline, y_max)],
                            RED.stroke_width(2),
                        )))
                        .map_err(to_draw_error)?;
                }
            }
        }
        root.present().map_err(to_draw_error)?;
        Ok(())
    }

    /// A box plot of angular scales per region: quartile box, median line,
    /// 10th/90th-percentile whiskers.
    pub(super) fn summary_figure(
        records: &[&UvRecord],
        output: &PathBuf,
    ) -> Result<(), UvHistError> {
        // The first entry is the 1st-percentile baseline, i.e. the largest
        // angular scale.
        let x_max = records
            .iter()
            .map(|r| r.angular_scales[0])
            .fold(f64::MIN, f64::max)
            * 1.1;
        let height = 150 + 60 * records.len() as u32;

        let root = BitMapBackend::new(output, (X_PIXELS, height)).into_drawing_area();
        root.fill(&WHITE).map_err(to_draw_error)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(150)
            .build_cartesian_2d(0.0..x_max, 0.0..records.len() as f64)
            .map_err(to_draw_error)?;
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(records.len())
            .y_label_formatter(&|y| {
                records
                    .get(*y as usize)
                    .map(|r| r.name.region.clone())
                    .unwrap_or_default()
            })
            .x_desc("Angular scale (arcsec)")
            .draw()
            .map_err(to_draw_error)?;

        for (i, record) in records.iter().enumerate() {
            let y = i as f64 + 0.5;
            let [whisker_lo, box_lo, median, box_hi, whisker_hi] =
                box_edges(&record.angular_scales);

            chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![(whisker_lo, y), (whisker_hi, y)],
                    BLACK.stroke_width(1),
                )))
                .map_err(to_draw_error)?;
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(box_lo, y - 0.3), (box_hi, y + 0.3)],
                    BLUE.mix(0.4).filled(),
                )))
                .map_err(to_draw_error)?;
            chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![(median, y - 0.3), (median, y + 0.3)],
                    BLACK.stroke_width(2),
                )))
                .map_err(to_draw_error)?;
        }
        root.present().map_err(to_draw_error)?;
        Ok(())
    }

    /// Box-plot edges in ascending order (10th-percentile whisker, box
    /// bottom, median, box top, 90th-percentile whisker). The scales come in
    /// descending order because long baselines are small angular scales, so
    /// the 75th-percentile baseline is the short-scale box edge.
    pub(super) fn box_edges(scales: &[f64; 9]) -> [f64; 5] {
        [scales[6], scales[5], scales[4], scales[3], scales[2]]
    }

    fn to_draw_error<E: std::error::Error>(e: E) -> UvHistError {
        UvHistError::Draw(e.to_string())
    }
}

#[derive(Error, Debug)]
pub(super) enum UvHistError {
    #[error("No measurement sets supplied!")]
    NoInputs,

    #[error("--bins must be at least 1")]
    BadBins,

    #[error("{0}: every row is flagged; nothing to histogram")]
    NoUnflaggedData(PathBuf),

    #[error(transparent)]
    Ms(#[from] MsReadError),

    #[error(transparent)]
    Table(#[from] TabulateError),

    #[cfg(feature = "plotting")]
    #[error("Error from the plotters library: {0}")]
    Draw(String),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
