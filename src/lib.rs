// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod cluster;
pub mod commands;
pub mod config;
pub mod error;
pub mod extra;
pub mod fs;
pub mod global;
pub mod ha;
pub mod host;
pub mod host_defaults;
pub mod nodeset;
pub mod pool;
pub mod section;
pub mod source;
pub mod subsystems;
pub mod test_env;

pub use cluster::{resolve_files, ResolveOptions, Resolver};
pub use config::ClusterConfig;
pub use error::ConfigError;

pub fn default_config_path() -> String {
    match std::env::var("EXACONF_CONFIG") {
        Ok(conf) => conf,
        Err(_) => "/etc/ddn/exascaler.conf".to_string(),
    }
}

pub fn default_shadow_path() -> Option<String> {
    std::env::var("EXACONF_SHADOW").ok()
}

/// Whether missing mandatory fields are errors by default.
pub fn default_strict() -> bool {
    match std::env::var("EXACONF_STRICT") {
        Ok(strict) => matches!(strict.as_str(), "1" | "yes" | "true" | "on"),
        Err(_) => false,
    }
}
