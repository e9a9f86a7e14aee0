// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod hosts;
pub mod resolve;
pub mod validate;

use {hosts::HostsArgs, resolve::ResolveArgs};

use clap::{Parser, Subcommand};

use crate::{
    cluster::{self, ResolveOptions},
    config::ClusterConfig,
};

/// A `HandledError` represents an error that has already been handled. When you call a function
/// that returns a `HandledError` or `HandledResult`, you don't need to do anything with that error,
/// other than just be aware that it happened, and return it on to your caller.
///
/// `main()` has a special responsibility: since its "caller" is, in a certain sense, the operating
/// system, `main()` must return a nonzero exit status when it gets a `HandledError`.
///
/// The primary way to construct a `HandledError` is with the `handle_err()` function, which turns a
/// generic error into a `HandledError`, and also runs some caller-provided code to handle the
/// error. That provided code would normally do something like report the error to stderr.
#[derive(Debug, PartialEq)]
pub struct HandledError {}

pub type HandledResult<T> = std::result::Result<T, HandledError>;

pub trait Handle<T, F> {
    fn handle_err(self, handler: F) -> HandledResult<T>;
}

impl<T, E, F: FnOnce(E)> Handle<T, F> for std::result::Result<T, E> {
    /// Handle an error by running the provided `handler` code, giving it the error.
    ///
    /// Then, return a `HandledResult`, so that transitive callers of this function know that they
    /// do not need to do anything further to handle the error.
    fn handle_err(self, handler: F) -> HandledResult<T> {
        self.map_err(|e| {
            handler(e);
            HandledError {}
        })
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file to resolve.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Shadow configuration whose options override the main configuration.
    #[arg(long, global = true)]
    pub shadow: Option<String>,

    /// Fail on missing mandatory fields instead of warning about them.
    #[arg(long, global = true)]
    pub strict: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the fully resolved configuration.
    Resolve(ResolveArgs),
    /// Check that the configuration resolves and print a summary.
    Validate,
    /// List hosts with their addresses, HA group and targets.
    Hosts(HostsArgs),
}

/// Resolve the configuration selected by the command line and the environment.
pub fn load_cluster(cli: &Cli) -> HandledResult<ClusterConfig> {
    let path = cli.config.clone().unwrap_or_else(crate::default_config_path);
    let shadow = cli.shadow.clone().or_else(crate::default_shadow_path);
    let options = ResolveOptions {
        strict: cli.strict || crate::default_strict(),
    };

    if cli.verbose {
        eprintln!("Resolving \"{path}\"");
        if let Some(shadow) = &shadow {
            eprintln!("Using shadow configuration \"{shadow}\"");
        }
    }

    cluster::resolve_files(&path, shadow.as_ref(), options)
        .handle_err(|e| eprintln!("Could not resolve configuration \"{path}\": {e}"))
}

pub fn main(cli: &Cli) -> HandledResult<()> {
    match &cli.command {
        Commands::Resolve(args) => resolve::resolve(cli, args),
        Commands::Validate => validate::validate(cli),
        Commands::Hosts(args) => hosts::hosts(cli, args),
    }
}
