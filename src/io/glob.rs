// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Functions to glob files.

use std::path::PathBuf;

use glob::glob;
use thiserror::Error;

/// Given a glob pattern, get all of the matches from the filesystem.
pub(crate) fn get_all_matches_from_glob(g: &str) -> Result<Vec<PathBuf>, GlobError> {
    let mut entries = vec![];
    for entry in glob(g)? {
        match entry {
            Ok(e) => entries.push(e),
            Err(e) => return Err(GlobError::GlobCrate(e)),
        }
    }
    Ok(entries)
}

#[derive(Error, Debug)]
/// Error type associated with glob helper functions.
pub enum GlobError {
    #[error(transparent)]
    GlobCrate(#[from] glob::GlobError),

    #[error(transparent)]
    PatternError(#[from] glob::PatternError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_cargo() {
        let result = get_all_matches_from_glob("Cargo*");
        assert!(result.is_ok());
        let entries = result.unwrap();
        assert!(&entries.contains(&PathBuf::from("Cargo.toml")));
    }

    #[test]
    fn glob_no_matches_is_empty_not_err() {
        let result = get_all_matches_from_glob("does-not-exist-*");
        assert!(result.is_ok());
        assert!(result.unwrap().is_empty());
    }
}
