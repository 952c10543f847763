use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod config;
mod evaluate;
mod peirce;
mod process;
mod report;

/// rimseval - Evaluation of CRD time-of-flight measurements
#[derive(Parser)]
#[command(name = "rimseval")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a measurement with a calibration file and write its integrals
    Process {
        /// Measurement in JSON form (header, ions per shot, arrivals)
        #[arg(value_name = "DATASET")]
        dataset: PathBuf,

        /// Calibration file with mass calibration, integrals and filters
        #[arg(short = 'c', long, value_name = "FILE")]
        calibration: PathBuf,

        /// TOML config file with processing defaults
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Isotope abundance table (JSON) for δ-values
        #[arg(short = 'i', long, value_name = "FILE")]
        isotopes: Option<PathBuf>,

        /// Integral file to write (defaults to <DATASET>.integrals.json)
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Sum integral files and compute δ-values
    Evaluate {
        /// Integral files of the sample
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Integral files of the standard
        #[arg(short = 's', long, value_name = "FILE")]
        standard: Vec<PathBuf>,

        /// Isotope abundance table (JSON)
        #[arg(short = 'i', long, value_name = "FILE")]
        isotopes: Option<PathBuf>,

        /// Save the evaluation as an .eval file
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
    },

    /// Reject outliers from a list of values with Peirce's criterion
    Peirce {
        /// Values to test
        #[arg(value_name = "VALUES", required = true, allow_negative_numbers = true)]
        values: Vec<f64>,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Process {
            dataset,
            calibration,
            config,
            isotopes,
            output,
        } => process::run(dataset, calibration, config, isotopes, output),
        Commands::Evaluate {
            files,
            standard,
            isotopes,
            save,
        } => evaluate::run(files, standard, isotopes, save),
        Commands::Peirce { values } => peirce::run(&values),
    }
}
