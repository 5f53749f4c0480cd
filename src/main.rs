//! # tabml command-line entry point
//!
//! ```text
//! main()
//!   │
//!   ├─> Parse CLI arguments (clap)
//!   ├─> Initialise logging (console + rolling file)
//!   └─> Run the command: infer | train | show | settings
//! ```
//!
//! ```bash
//! tabml infer data.csv --quick
//! tabml train data.csv --task classification --target churned --features age,plan
//! tabml show --store ./results
//! tabml settings --init
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout, clippy::print_stderr)] // Allow println! in main binary

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Logging is optional; a read-only data dir should not stop the command.
    if let Err(e) = tabml::logging::init() {
        eprintln!("Logging disabled: {e:#}");
    }

    cli::run_command(cli)
}
