// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code for file access: globbing, FITS helpers, measurement sets.

pub(crate) mod fits;
mod glob;
pub(crate) mod ms;

pub(crate) use glob::{get_all_matches_from_glob, GlobError};
