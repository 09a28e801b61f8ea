//! # Stageline Entry Point
//!
//! ```text
//! main()
//!   │
//!   ├─> Load .env (dotenvy)
//!   ├─> Parse CLI arguments (clap)
//!   ├─> Initialize logging
//!   └─> Create Tokio runtime and block on the command
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout)] // Allow println! in main binary

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<()> {
    // A missing .env is normal; DATABASE_URL may come from the real environment
    dotenvy::dotenv().ok();

    let cli = cli::Cli::parse();
    stageline::logging::init(cli.verbose)?;

    tokio::runtime::Runtime::new()?.block_on(cli::run_command(cli))
}
