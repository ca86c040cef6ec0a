// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Before/after self-calibration comparison figures.
//!
//! For every region, band and array configuration, find the highest
//! self-calibration iteration among the robust-0 images, pair it with the
//! matching pre-selfcal image and render the two planes and their difference
//! side by side. A failure on one pair is logged and the loop moves on.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::cube::CubeError;
use crate::io::GlobError;
use crate::ImgQaError;

#[derive(Parser, Debug)]
pub(super) struct CompareArgs {
    /// The directory containing the imaging products.
    #[clap(short, long, default_value = ".")]
    image_dir: PathBuf,

    /// The directory to write comparison figures into.
    #[clap(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// The regions to compare. The default is the full ALMA-IMF sample.
    #[clap(long, multiple_values(true))]
    regions: Vec<String>,

    /// The frequency bands to compare.
    #[clap(long, multiple_values(true), default_values = &["3", "6"])]
    bands: Vec<String>,

    /// The array configurations to compare.
    #[clap(long, multiple_values(true), default_values = &["12M", "7M12M"])]
    configs: Vec<String>,
}

impl CompareArgs {
    #[cfg(not(feature = "plotting"))]
    pub(super) fn run(self) -> Result<(), ImgQaError> {
        // Plotting is an optional feature because the C dependencies needed
        // for it can't always be statically compiled.
        Err(ImgQaError::from(CompareError::NoPlottingFeature))
    }

    #[cfg(feature = "plotting")]
    pub(super) fn run(self) -> Result<(), ImgQaError> {
        plotting::compare_all(self)?;
        Ok(())
    }
}

#[cfg(feature = "plotting")]
mod plotting {
    use log::{debug, info, warn};
    use ndarray::prelude::*;
    use plotters::prelude::*;

    use super::*;
    use crate::cube::ImageCube;
    use crate::filenames::get_selfcal_number;
    use crate::io::get_all_matches_from_glob;
    use crate::stats::nanmax;

    /// The ALMA-IMF regions, used when the user doesn't narrow the search
    /// down.
    const DEFAULT_REGIONS: [&str; 15] = [
        "G008.67", "G010.62", "G012.80", "G327.29", "G328.25", "G333.60", "G337.92", "G338.93",
        "G351.77", "G353.41", "W43-MM1", "W43-MM2", "W43-MM3", "W51-E", "W51-IRS2",
    ];

    /// The asinh stretch turns over at this fraction of the maximum.
    const SOFTENING: f64 = 1.0 / 30.0;
    /// The stretch maximum is never below this value (image units).
    const MIN_VMAX: f64 = 0.001;

    pub(super) fn compare_all(args: CompareArgs) -> Result<(), CompareError> {
        let CompareArgs {
            image_dir,
            output_dir,
            regions,
            bands,
            configs,
        } = args;

        let regions = if regions.is_empty() {
            DEFAULT_REGIONS.iter().map(|r| r.to_string()).collect()
        } else {
            regions
        };
        if !output_dir.exists() {
            std::fs::create_dir_all(&output_dir)?;
        }

        for region in &regions {
            for band in &bands {
                for config in &configs {
                    let pattern = format!(
                        "{}/{region}*_B{band}*_{config}_*selfcal[0-9]*.image.tt0.fits",
                        image_dir.display()
                    );
                    let matches: Vec<PathBuf> = get_all_matches_from_glob(&pattern)?
                        .into_iter()
                        .filter(|p| {
                            p.file_name()
                                .map(|n| n.to_string_lossy().contains("robust0_"))
                                .unwrap_or(false)
                        })
                        .collect();
                    let (post, iteration) = match latest_selfcal(&matches) {
                        Some((p, i)) => (p.clone(), i),
                        None => {
                            debug!("No images for {region} B{band} {config}");
                            continue;
                        }
                    };

                    let pre = match preselfcal_counterpart(&post, iteration) {
                        Some(p) => p,
                        None => {
                            warn!(
                                "{}: no pre-selfcal counterpart found",
                                post.display()
                            );
                            continue;
                        }
                    };

                    let output = output_dir.join(format!(
                        "{region}_B{band}_{config}_selfcal{iteration}_comparison.png"
                    ));
                    match compare_pair(&pre, &post, &output) {
                        Ok(()) => info!("Wrote {}", output.display()),
                        Err(e) => warn!("{region} B{band} {config}: {e}"),
                    }
                }
            }
        }
        Ok(())
    }

    /// The candidate with the highest self-calibration iteration.
    pub(super) fn latest_selfcal(matches: &[PathBuf]) -> Option<(&PathBuf, u8)> {
        let post = matches.iter().max_by_key(|p| {
            get_selfcal_number(&p.file_name().unwrap_or_default().to_string_lossy())
        })?;
        let iteration =
            get_selfcal_number(&post.file_name().unwrap_or_default().to_string_lossy());
        Some((post, iteration))
    }

    /// The pre-selfcal image matching a post-selfcal one: replace the
    /// `_selfcal<N>` token with `_preselfcal`, or failing that drop the token
    /// entirely. A `_finaliter` token never appears on pre-selfcal products.
    pub(super) fn preselfcal_counterpart(post: &PathBuf, iteration: u8) -> Option<PathBuf> {
        let name = post.file_name()?.to_string_lossy().into_owned();
        let token = format!("_selfcal{iteration}");
        let parent = post.parent()?;

        for replacement in ["_preselfcal", ""] {
            let candidate = parent.join(
                name.replace(&token, replacement)
                    .replace("_finaliter", ""),
            );
            if candidate.exists() {
                return Some(candidate);
            }
        }
        None
    }

    fn compare_pair(
        pre_path: &PathBuf,
        post_path: &PathBuf,
        output: &PathBuf,
    ) -> Result<(), CompareError> {
        debug!(
            "Comparing {} with {}",
            pre_path.display(),
            post_path.display()
        );
        let mut pre = ImageCube::read(pre_path)?;
        let mut post = ImageCube::read(post_path)?;
        // Zero-padded borders differ between imaging runs; mask them out.
        pre.mask_zeros();
        post.mask_zeros();

        let pre_plane = pre.plane(0);
        let post_plane = post.plane(0);
        if pre_plane.dim() != post_plane.dim() {
            return Err(CompareError::ShapeMismatch {
                pre: pre_path.clone(),
                post: post_path.clone(),
            });
        }
        let diff = &post_plane.to_owned() - &pre_plane;

        let pre_data: Vec<f32> = pre_plane.iter().copied().collect();
        let post_data: Vec<f32> = post_plane.iter().copied().collect();
        let vmax = nanmax(&pre_data).max(nanmax(&post_data)).max(MIN_VMAX);

        render_three_panel(
            [pre_plane, post_plane, diff.view()],
            ["preselfcal", "selfcal", "difference"],
            vmax,
            output,
        )
    }

    /// Render three planes side by side with a shared asinh stretch, no axes.
    fn render_three_panel(
        planes: [ArrayView2<f32>; 3],
        titles: [&str; 3],
        vmax: f64,
        output: &PathBuf,
    ) -> Result<(), CompareError> {
        const TITLE_HEIGHT: u32 = 40;
        const GAP: u32 = 10;

        let (height, width) = planes[0].dim();
        let (height, width) = (height as u32, width as u32);
        let total = (3 * width + 2 * GAP, height + TITLE_HEIGHT);

        let root = BitMapBackend::new(output, total).into_drawing_area();
        root.fill(&WHITE).map_err(to_draw_error)?;

        let soft = vmax * SOFTENING;
        let norm = (vmax / soft).asinh();
        for (panel, (plane, title)) in planes.iter().zip(titles.iter()).enumerate() {
            let x0 = panel as u32 * (width + GAP);
            root.draw_text(
                title,
                &("sans-serif", 28).into_font().color(&BLACK),
                (x0 as i32 + 10, 6),
            )
            .map_err(to_draw_error)?;

            for ((y, x), &v) in plane.indexed_iter() {
                let colour = if (v as f64).is_nan() {
                    RGBColor(255, 255, 255)
                } else {
                    let t = ((v as f64).max(0.0) / soft).asinh() / norm;
                    let level = 255 - (t.clamp(0.0, 1.0) * 255.0) as u8;
                    RGBColor(level, level, level)
                };
                // FITS images have their origin at the bottom left.
                let py = TITLE_HEIGHT + (height - 1 - y as u32);
                root.draw_pixel(((x0 + x as u32) as i32, py as i32), &colour)
                    .map_err(to_draw_error)?;
            }
        }
        root.present().map_err(to_draw_error)?;
        Ok(())
    }

    fn to_draw_error<E: std::error::Error>(e: E) -> CompareError {
        CompareError::Draw(e.to_string())
    }
}

#[cfg(all(test, feature = "plotting"))]
mod tests {
    use std::fs::File;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::plotting::{latest_selfcal, preselfcal_counterpart};

    #[test]
    fn latest_selfcal_picks_highest_iteration() {
        let matches = vec![
            PathBuf::from("W51-E_B6_12M_robust0_selfcal1.image.tt0.fits"),
            PathBuf::from("W51-E_B6_12M_robust0_selfcal4.image.tt0.fits"),
            PathBuf::from("W51-E_B6_12M_robust0_selfcal2.image.tt0.fits"),
        ];
        let (post, iteration) = latest_selfcal(&matches).unwrap();
        assert_eq!(iteration, 4);
        assert!(post.to_string_lossy().contains("selfcal4"));

        assert!(latest_selfcal(&[]).is_none());
    }

    #[test]
    fn counterpart_prefers_preselfcal_image() {
        let dir = TempDir::new().unwrap();
        let post = dir.path().join("W51-E_B6_12M_robust0_selfcal4.image.tt0.fits");
        let pre = dir
            .path()
            .join("W51-E_B6_12M_robust0_preselfcal.image.tt0.fits");
        File::create(&post).unwrap();
        File::create(&pre).unwrap();
        assert_eq!(preselfcal_counterpart(&post, 4), Some(pre));
    }

    #[test]
    fn counterpart_falls_back_to_dropping_the_token() {
        let dir = TempDir::new().unwrap();
        let post = dir
            .path()
            .join("G333.60_B3_7M12M_robust0_selfcal2.image.tt0.fits");
        let bare = dir.path().join("G333.60_B3_7M12M_robust0.image.tt0.fits");
        File::create(&post).unwrap();
        File::create(&bare).unwrap();
        assert_eq!(preselfcal_counterpart(&post, 2), Some(bare));
    }

    #[test]
    fn counterpart_strips_finaliter() {
        let dir = TempDir::new().unwrap();
        let post = dir
            .path()
            .join("W43-MM1_B6_12M_robust0_selfcal6_finaliter.image.tt0.fits");
        let pre = dir
            .path()
            .join("W43-MM1_B6_12M_robust0_preselfcal.image.tt0.fits");
        File::create(&post).unwrap();
        File::create(&pre).unwrap();
        assert_eq!(preselfcal_counterpart(&post, 6), Some(pre));
    }

    #[test]
    fn counterpart_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let post = dir.path().join("W51-E_B6_12M_robust0_selfcal4.image.tt0.fits");
        File::create(&post).unwrap();
        assert_eq!(preselfcal_counterpart(&post, 4), None);
    }
}

#[derive(Error, Debug)]
pub(super) enum CompareError {
    #[cfg(not(feature = "plotting"))]
    #[error("imgqa was not compiled with the \"plotting\" feature.\nYou need to compile imgqa from source with this feature to render comparison figures.")]
    NoPlottingFeature,

    #[cfg(feature = "plotting")]
    #[error("Image shapes differ between {pre} and {post}", pre = .pre.display(), post = .post.display())]
    ShapeMismatch { pre: PathBuf, post: PathBuf },

    #[cfg(feature = "plotting")]
    #[error("Error from the plotters library: {0}")]
    Draw(String),

    #[error(transparent)]
    Cube(#[from] CubeError),

    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
