//! # rimseval
//!
//! Command-line front end for processing CRD measurements.
//!
//! ## Usage
//!
//! ```bash
//! # Process a measurement with a calibration and write its integrals
//! rimseval process measurement.json --calibration measurement.cal.json
//!
//! # Sum the integrals of several measurements and normalize to a standard
//! rimseval evaluate sample_1.json sample_2.json --standard standard.json --isotopes iso.json
//!
//! # Peirce's criterion on a list of values
//! rimseval peirce 102.2 90 99 102 103 100.2 89 98.1 101.5 102
//! ```

mod cli;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
