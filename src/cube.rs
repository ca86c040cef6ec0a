// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! FITS image cubes.
//!
//! An [ImageCube] is a (channel, y, x) array of image values along with the
//! metadata the analysis tools need: the pixel scale, the brightness unit and
//! the restoring beam(s). Degenerate leading FITS axes (e.g. Stokes) are
//! squeezed on read, and 2-D images load as single-channel cubes.

use std::path::{Path, PathBuf};

use fitsio::images::{ImageDescription, ImageType};
use log::{debug, trace, warn};
use ndarray::prelude::*;
use thiserror::Error;

use crate::beam::Beam;
use crate::io::fits::{
    fits_create, fits_get_col, fits_get_col_unit, fits_get_image, fits_get_image_dims,
    fits_get_optional_key, fits_open, fits_open_hdu, fits_write_image, fits_write_key, FitsError,
};

pub struct ImageCube {
    /// The file this cube was read from.
    pub path: PathBuf,

    /// Image values, (channel, y, x).
    pub data: Array3<f32>,

    /// The (square) pixel scale from CDELT2 \[degrees\].
    pub pix_scale_deg: Option<f64>,

    /// The brightness unit (BUNIT), carried verbatim.
    pub unit: Option<String>,

    /// The restoring beam from the primary header, if any.
    pub beam: Option<Beam>,

    /// Per-channel beams from a CASA-style BEAMS binary table, if present.
    pub beams: Option<Vec<Beam>>,
}

impl ImageCube {
    /// Read a FITS image (2-D, 3-D, or 4-D with degenerate leading axes)
    /// into a cube.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<ImageCube, CubeError> {
        fn inner(path: &Path) -> Result<ImageCube, CubeError> {
            debug!("Reading image cube {}", path.display());
            let mut fptr = fits_open(path)?;
            let hdu = fits_open_hdu(&mut fptr, 0)?;

            // fitsio reports dims in row-major order (reverse of NAXIS).
            let dims = fits_get_image_dims(&mut fptr, &hdu)?;
            let (num_chans, height, width) = match dims.as_slice() {
                [y, x] => (1, *y, *x),
                [c, y, x] => (*c, *y, *x),
                [s, c, y, x] if *s == 1 => (*c, *y, *x),
                [c, s, y, x] if *s == 1 => (*c, *y, *x),
                _ => {
                    return Err(CubeError::BadDims {
                        path: path.to_path_buf(),
                        dims,
                    })
                }
            };

            let flat: Vec<f32> = fits_get_image(&mut fptr, &hdu)?;
            let data = Array3::from_shape_vec((num_chans, height, width), flat)
                .map_err(|_| CubeError::BadDims {
                    path: path.to_path_buf(),
                    dims: vec![num_chans, height, width],
                })?;

            let pix_scale_deg = fits_get_optional_key(&mut fptr, &hdu, "CDELT2")?;
            let unit: Option<String> = fits_get_optional_key(&mut fptr, &hdu, "BUNIT")?;
            let beam = {
                let bmaj: Option<f64> = fits_get_optional_key(&mut fptr, &hdu, "BMAJ")?;
                let bmin: Option<f64> = fits_get_optional_key(&mut fptr, &hdu, "BMIN")?;
                let bpa: Option<f64> = fits_get_optional_key(&mut fptr, &hdu, "BPA")?;
                match (bmaj, bmin) {
                    (Some(bmaj), Some(bmin)) => Some(Beam::from_header_degrees(
                        bmaj,
                        bmin,
                        bpa.unwrap_or_default(),
                    )),
                    _ => None,
                }
            };

            // CASA writes per-channel beams into a BEAMS binary table, with
            // the column units in TUNITn.
            let beams = match fits_open_hdu(&mut fptr, "BEAMS") {
                Ok(beams_hdu) => {
                    let bmaj: Vec<f32> = fits_get_col(&mut fptr, &beams_hdu, "BMAJ")?;
                    let bmin: Vec<f32> = fits_get_col(&mut fptr, &beams_hdu, "BMIN")?;
                    let bpa: Vec<f32> = fits_get_col(&mut fptr, &beams_hdu, "BPA")?;
                    let maj_to_arcsec = axis_to_arcsec(
                        fits_get_col_unit(&mut fptr, &beams_hdu, "BMAJ")?.as_deref(),
                        path,
                    );
                    let min_to_arcsec = axis_to_arcsec(
                        fits_get_col_unit(&mut fptr, &beams_hdu, "BMIN")?.as_deref(),
                        path,
                    );
                    let pa_to_deg = pa_to_degrees(
                        fits_get_col_unit(&mut fptr, &beams_hdu, "BPA")?.as_deref(),
                        path,
                    );
                    trace!("Found a BEAMS table with {} rows", bmaj.len());
                    Some(
                        bmaj.iter()
                            .zip(bmin.iter())
                            .zip(bpa.iter())
                            .take(num_chans)
                            .map(|((maj, min), pa)| Beam {
                                major: *maj as f64 * maj_to_arcsec,
                                minor: *min as f64 * min_to_arcsec,
                                pa: *pa as f64 * pa_to_deg,
                            })
                            .collect(),
                    )
                }
                Err(_) => None,
            };

            Ok(ImageCube {
                path: path.to_path_buf(),
                data,
                pix_scale_deg,
                unit,
                beam,
                beams,
            })
        }
        inner(path.as_ref())
    }

    pub fn num_chans(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// A 2-D view of one channel.
    pub fn plane(&self, chan: usize) -> ArrayView2<f32> {
        self.data.index_axis(Axis(0), chan)
    }

    /// Replace exact zeros with NaN. Zero-padded borders then drop out of
    /// the statistics and image differences.
    pub fn mask_zeros(&mut self) {
        self.data.mapv_inplace(|v| if v == 0.0 { f32::NAN } else { v });
    }

    /// The beam for every channel: the BEAMS table when present, otherwise
    /// the primary-header beam replicated across channels.
    pub fn channel_beams(&self) -> Result<Vec<Beam>, CubeError> {
        if let Some(beams) = &self.beams {
            if beams.len() == self.num_chans() {
                return Ok(beams.clone());
            }
        }
        match self.beam {
            Some(beam) => Ok(vec![beam; self.num_chans()]),
            None => Err(CubeError::NoBeam(self.path.clone())),
        }
    }

    /// Write the cube to a new FITS file, carrying the unit, pixel scale and
    /// beam over.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), CubeError> {
        fn inner(cube: &ImageCube, path: &Path) -> Result<(), CubeError> {
            debug!("Writing image cube {}", path.display());
            let description = ImageDescription {
                data_type: ImageType::Float,
                dimensions: &[
                    cube.data.len_of(Axis(0)),
                    cube.data.len_of(Axis(1)),
                    cube.data.len_of(Axis(2)),
                ],
            };
            let mut fptr = fits_create(path, &description)?;
            let hdu = fits_open_hdu(&mut fptr, 0)?;

            let flat = cube.data.as_standard_layout();
            fits_write_image(&mut fptr, &hdu, flat.as_slice().expect("is contiguous"))?;

            if let Some(unit) = &cube.unit {
                fits_write_key(&mut fptr, &hdu, "BUNIT", unit.clone())?;
            }
            if let Some(pix_scale) = cube.pix_scale_deg {
                fits_write_key(&mut fptr, &hdu, "CDELT1", -pix_scale)?;
                fits_write_key(&mut fptr, &hdu, "CDELT2", pix_scale)?;
            }
            if let Some(beam) = cube.beam {
                for (key, value) in beam.to_header_keywords() {
                    fits_write_key(&mut fptr, &hdu, key, value)?;
                }
            }
            Ok(())
        }
        inner(self, path.as_ref())
    }
}

/// Factor taking a BEAMS axis column to arcsec. Columns without a TUNIT are
/// taken to already be in arcsec.
fn axis_to_arcsec(unit: Option<&str>, path: &Path) -> f64 {
    match unit.map(str::trim) {
        None => 1.0,
        Some(u) if u.eq_ignore_ascii_case("arcsec") => 1.0,
        Some(u) if u.eq_ignore_ascii_case("arcmin") => 60.0,
        Some(u) if u.eq_ignore_ascii_case("deg") || u.eq_ignore_ascii_case("degree") => 3600.0,
        Some(u) if u.eq_ignore_ascii_case("rad") => 180.0 / std::f64::consts::PI * 3600.0,
        Some(u) => {
            warn!(
                "{}: unrecognised BEAMS axis unit {u:?}; assuming arcsec",
                path.display()
            );
            1.0
        }
    }
}

/// Factor taking a BEAMS position-angle column to degrees.
fn pa_to_degrees(unit: Option<&str>, path: &Path) -> f64 {
    match unit.map(str::trim) {
        None => 1.0,
        Some(u) if u.eq_ignore_ascii_case("deg") || u.eq_ignore_ascii_case("degree") => 1.0,
        Some(u) if u.eq_ignore_ascii_case("rad") => 180.0 / std::f64::consts::PI,
        Some(u) => {
            warn!(
                "{}: unrecognised BEAMS position-angle unit {u:?}; assuming degrees",
                path.display()
            );
            1.0
        }
    }
}

#[derive(Error, Debug)]
pub enum CubeError {
    #[error("{path}: expected a 2-D image or a cube with degenerate leading axes, got dimensions {dims:?}")]
    BadDims { path: PathBuf, dims: Vec<usize> },

    #[error("{0}: no beam information (BMAJ/BMIN headers or a BEAMS table)")]
    NoBeam(PathBuf),

    #[error(transparent)]
    Fits(#[from] FitsError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tempfile::TempDir;

    #[test]
    fn write_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cube.fits");

        let mut data = Array3::<f32>::zeros((2, 4, 5));
        data[(0, 1, 2)] = 3.5;
        data[(1, 3, 4)] = -1.25;
        let cube = ImageCube {
            path: path.clone(),
            data,
            pix_scale_deg: Some(0.1 / 3600.0),
            unit: Some("Jy/beam".to_string()),
            beam: Some(Beam {
                major: 1.0,
                minor: 0.5,
                pa: 30.0,
            }),
            beams: None,
        };
        cube.write(&path).unwrap();

        let read_back = ImageCube::read(&path).unwrap();
        assert_eq!(read_back.data.dim(), (2, 4, 5));
        assert_abs_diff_eq!(read_back.data[(0, 1, 2)], 3.5);
        assert_abs_diff_eq!(read_back.data[(1, 3, 4)], -1.25);
        assert_eq!(read_back.unit.as_deref(), Some("Jy/beam"));
        let beam = read_back.beam.unwrap();
        assert_abs_diff_eq!(beam.major, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(beam.minor, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(beam.pa, 30.0, epsilon = 1e-9);
    }

    /// Append a CASA-style BEAMS binary table, optionally with TUNIT
    /// keywords on the three columns.
    fn append_beams_table(
        path: &std::path::Path,
        bmaj: &[f32],
        bmin: &[f32],
        bpa: &[f32],
        axis_unit: Option<&str>,
        pa_unit: Option<&str>,
    ) {
        use fitsio::tables::{ColumnDataType, ColumnDescription};

        let mut fptr = fitsio::FitsFile::edit(path).unwrap();
        let descriptions = ["BMAJ", "BMIN", "BPA"].map(|name| {
            ColumnDescription::new(name)
                .with_type(ColumnDataType::Float)
                .create()
                .unwrap()
        });
        let hdu = fptr.create_table("BEAMS", &descriptions).unwrap();
        hdu.write_col(&mut fptr, "BMAJ", bmaj).unwrap();
        hdu.write_col(&mut fptr, "BMIN", bmin).unwrap();
        hdu.write_col(&mut fptr, "BPA", bpa).unwrap();
        if let Some(unit) = axis_unit {
            hdu.write_key(&mut fptr, "TUNIT1", unit).unwrap();
            hdu.write_key(&mut fptr, "TUNIT2", unit).unwrap();
        }
        if let Some(unit) = pa_unit {
            hdu.write_key(&mut fptr, "TUNIT3", unit).unwrap();
        }
    }

    fn plain_cube(path: &std::path::Path, num_chans: usize) {
        let cube = ImageCube {
            path: path.to_path_buf(),
            data: Array3::zeros((num_chans, 2, 2)),
            pix_scale_deg: None,
            unit: None,
            beam: None,
            beams: None,
        };
        cube.write(path).unwrap();
    }

    #[test]
    fn beams_table_units_are_converted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cube.fits");
        plain_cube(&path, 2);
        append_beams_table(
            &path,
            &[2.5e-4, 2.5e-4],
            &[2.0e-4, 2.0e-4],
            &[std::f32::consts::FRAC_PI_2, 0.0],
            Some("deg"),
            Some("rad"),
        );

        let cube = ImageCube::read(&path).unwrap();
        let beams = cube.beams.unwrap();
        assert_eq!(beams.len(), 2);
        assert_abs_diff_eq!(beams[0].major, 0.9, epsilon = 1e-6);
        assert_abs_diff_eq!(beams[0].minor, 0.72, epsilon = 1e-6);
        assert_abs_diff_eq!(beams[0].pa, 90.0, epsilon = 1e-4);
        assert_abs_diff_eq!(beams[1].pa, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn beams_table_without_units_is_arcsec() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cube.fits");
        plain_cube(&path, 1);
        append_beams_table(&path, &[0.9], &[0.72], &[45.0], None, None);

        let cube = ImageCube::read(&path).unwrap();
        let beams = cube.beams.unwrap();
        assert_abs_diff_eq!(beams[0].major, 0.9, epsilon = 1e-6);
        assert_abs_diff_eq!(beams[0].minor, 0.72, epsilon = 1e-6);
        assert_abs_diff_eq!(beams[0].pa, 45.0, epsilon = 1e-4);
    }

    #[test]
    fn beams_unit_factors() {
        let path = std::path::Path::new("test.fits");
        assert_abs_diff_eq!(axis_to_arcsec(None, path), 1.0);
        assert_abs_diff_eq!(axis_to_arcsec(Some("arcsec"), path), 1.0);
        assert_abs_diff_eq!(axis_to_arcsec(Some("ARCSEC "), path), 1.0);
        assert_abs_diff_eq!(axis_to_arcsec(Some("arcmin"), path), 60.0);
        assert_abs_diff_eq!(axis_to_arcsec(Some("deg"), path), 3600.0);
        // Unknown units fall back to arcsec.
        assert_abs_diff_eq!(axis_to_arcsec(Some("furlong"), path), 1.0);
        assert_abs_diff_eq!(pa_to_degrees(None, path), 1.0);
        assert_abs_diff_eq!(
            pa_to_degrees(Some("rad"), path),
            180.0 / std::f64::consts::PI
        );
    }

    #[test]
    fn mask_zeros_replaces_exact_zeros() {
        let mut cube = ImageCube {
            path: PathBuf::from("test.fits"),
            data: ndarray::array![[[0.0, 1.0], [2.0, 0.0]]],
            pix_scale_deg: None,
            unit: None,
            beam: None,
            beams: None,
        };
        cube.mask_zeros();
        assert!(cube.data[(0, 0, 0)].is_nan());
        assert_abs_diff_eq!(cube.data[(0, 0, 1)], 1.0);
        assert_abs_diff_eq!(cube.data[(0, 1, 0)], 2.0);
        assert!(cube.data[(0, 1, 1)].is_nan());
    }

    #[test]
    fn channel_beams_falls_back_to_header_beam() {
        let beam = Beam {
            major: 1.0,
            minor: 1.0,
            pa: 0.0,
        };
        let cube = ImageCube {
            path: PathBuf::from("test.fits"),
            data: Array3::zeros((3, 2, 2)),
            pix_scale_deg: None,
            unit: None,
            beam: Some(beam),
            beams: None,
        };
        let beams = cube.channel_beams().unwrap();
        assert_eq!(beams.len(), 3);
        assert_eq!(beams[0], beam);
    }
}
