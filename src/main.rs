// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The main imgqa binary.

use clap::Parser;

use alma_imgqa::ImgQa;

fn main() {
    if let Err(e) = ImgQa::parse().run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
