// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Parser;

use exaconf_lib::commands::{self, Cli};

/// The exaconf binary resolves a cluster configuration and prints the result.
fn main() {
    let args = Cli::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("EXACONF_LOG", level)).init();

    if commands::main(&args).is_err() {
        std::process::exit(1);
    }
}
