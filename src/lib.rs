// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Quality-assurance tools for ALMA interferometric imaging products.
 */

pub mod beam;
pub mod cli;
pub mod convolve;
pub mod cube;
pub mod epsilon;
pub mod filenames;
pub(crate) mod io;
pub mod stats;
pub mod tabulate;

// Re-exports.
pub use cli::{ImgQa, ImgQaError};

use crossbeam_utils::atomic::AtomicCell;

/// Are progress bars being drawn? Used to prevent progress bars being drawn in
/// certain situations, e.g. when the user has requested them to be hidden.
pub static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
