// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code. More specific options for `imgqa`
//! subcommands are contained in modules.
//!
//! Only 3 things should be public in this module: `ImgQa`, `ImgQa::run`, and
//! `ImgQaError`.

mod compare;
mod epsilon;
mod error;
mod stats;
mod uvhist;

pub use error::ImgQaError;

use clap::{AppSettings, Args, Parser, Subcommand};
use log::info;

use crate::PROGRESS_BARS;

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = "Quality-assurance tools for ALMA interferometric imaging products"
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_subcommands = true)]
#[clap(propagate_version = true)]
#[clap(infer_long_args = true)]
pub struct ImgQa {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Don't draw progress bars.
    #[clap(long)]
    #[clap(global = true)]
    no_progress_bars: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    #[clap(global = true)]
    verbosity: u8,
}

#[derive(Debug, Subcommand)]
#[clap(arg_required_else_help = true)]
enum Command {
    #[clap(about = "Tabulate beam and noise statistics for FITS images.")]
    Stats(stats::StatsArgs),

    #[clap(
        about = r#"Render before/after self-calibration comparison figures. Only available
if compiled with the "plotting" feature."#
    )]
    Compare(compare::CompareArgs),

    #[clap(alias = "uv-hist")]
    #[clap(about = "Histogram the baseline-length distributions of measurement sets.")]
    Uvhist(uvhist::UvHistArgs),

    #[clap(about = "Estimate per-channel beam-volume correction factors from a PSF cube.")]
    Epsilon(epsilon::EpsilonArgs),

    #[clap(about = "Restore a model and an epsilon-rescaled residual into one image.")]
    Restore(epsilon::RestoreArgs),
}

impl ImgQa {
    pub fn run(self) -> Result<(), ImgQaError> {
        // Set up logging.
        let GlobalArgs {
            verbosity,
            no_progress_bars,
        } = self.global_opts;
        setup_logging(verbosity).expect("Failed to initialise logging.");
        // Enable progress bars if the user didn't say "no progress bars".
        if !no_progress_bars {
            PROGRESS_BARS.store(true);
        }

        // Print the version of imgqa and its build-time information.
        let sub_command = match &self.command {
            Command::Stats(_) => "stats",
            Command::Compare(_) => "compare",
            Command::Uvhist(_) => "uvhist",
            Command::Epsilon(_) => "epsilon",
            Command::Restore(_) => "restore",
        };
        info!("imgqa {} {}", sub_command, env!("CARGO_PKG_VERSION"));
        display_build_info();

        match self.command {
            Command::Stats(args) => args.run()?,
            Command::Compare(args) => args.run()?,
            Command::Uvhist(args) => args.run()?,
            Command::Epsilon(args) => args.run()?,
            Command::Restore(args) => args.run()?,
        }

        info!("imgqa {} complete.", sub_command);
        Ok(())
    }
}

/// Activate a logger. All log messages are put onto `stdout`. `env_logger`
/// automatically only uses colours and fancy symbols if we're on a tty (e.g. a
/// terminal); piped output will be formatted sensibly. Source code lines are
/// displayed in log messages when verbosity >= 3.
fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.init();

    Ok(())
}

/// Write many info-level log lines of how this executable was compiled.
fn display_build_info() {
    let dirty = match GIT_DIRTY {
        Some(true) => " (dirty)",
        _ => "",
    };
    match GIT_COMMIT_HASH_SHORT {
        Some(hash) => {
            info!("Compiled on git commit hash: {hash}{dirty}");
        }
        None => info!("Compiled on git commit hash: <no git info>"),
    }
    if let Some(hr) = GIT_HEAD_REF {
        info!("            git head ref: {}", hr);
    }
    info!("            {}", BUILT_TIME_UTC);
    info!("         with compiler {}", RUSTC_VERSION);
    info!("");
}
