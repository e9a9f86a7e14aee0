// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::{Args, ValueEnum};

use crate::commands::{load_cluster, Cli, Handle, HandledResult};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,
}

pub fn resolve(cli: &Cli, args: &ResolveArgs) -> HandledResult<()> {
    let cluster = load_cluster(cli)?;

    let output = match args.format {
        Format::Json => cluster.to_json().map_err(|e| e.to_string()),
        Format::Toml => cluster.to_toml().map_err(|e| e.to_string()),
    }
    .handle_err(|e| eprintln!("Could not serialize resolved configuration: {e}"))?;

    println!("{output}");
    Ok(())
}
