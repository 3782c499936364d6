// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::result_large_err)]

mod cli;
mod datetime;
mod error;

use crate::error::Result;
use clap::Parser;
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use snafu::{ErrorCompat, ResultExt};

/// This wrapper enables global options and initializes the logger before running any subcommands.
#[derive(Parser)]
#[command(version)]
struct Program {
    /// Set logging verbosity [trace|debug|info|warn|error]
    #[clap(name = "log-level", short, long, default_value = "info")]
    log_level: LevelFilter,
    /// Print a failure as `{"updateSuccessful":false,"error":"..."}` on
    /// stdout instead of a human-readable message on stderr
    #[clap(long = "format-output")]
    format_output: bool,
    #[clap(subcommand)]
    cmd: Command,
}

impl Program {
    fn run(self) -> Result<()> {
        TermLogger::init(
            self.log_level,
            ConfigBuilder::new()
                .add_filter_allow_str("taftool")
                .add_filter_allow_str("taf")
                .build(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        )
        .context(error::LoggerSnafu)?;
        self.cmd.run()
    }
}

#[derive(Debug, Parser)]
enum Command {
    /// Create and maintain an authentication repository's role metadata
    #[clap(subcommand)]
    Repo(cli::repo::Command),
}

impl Command {
    fn run(self) -> Result<()> {
        match self {
            Command::Repo(cmd) => cmd.run(),
        }
    }
}

fn main() -> ! {
    let program = Program::parse();
    let format_output = program.format_output;
    std::process::exit(match program.run() {
        Ok(()) => 0,
        Err(err) => {
            if format_output {
                println!(
                    "{}",
                    serde_json::json!({"updateSuccessful": false, "error": err.to_string()})
                );
            } else {
                eprintln!("{err}");
                if let Some(var) = std::env::var_os("RUST_BACKTRACE") {
                    if var != "0" {
                        if let Some(backtrace) = err.backtrace() {
                            eprintln!("\n{backtrace:?}");
                        }
                    }
                }
            }
            err.exit_code()
        }
    })
}
