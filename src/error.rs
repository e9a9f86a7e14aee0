// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Errors raised while resolving a cluster configuration.

use std::fmt;

/// Every way a resolution pass can fail. Resolution is fail-fast: the first error aborts the
/// whole pass and no partially resolved configuration is returned.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("could not read configuration file '{path}': {reason}")]
    Io { path: String, reason: String },

    #[error("malformed configuration: {0}")]
    Syntax(String),

    #[error("invalid value '{value}' for '{field}' in section [{section}]: {reason}")]
    Parse {
        section: String,
        field: String,
        value: String,
        reason: String,
    },

    #[error("mandatory field '{field}' is missing from section [{section}]")]
    MandatoryFieldMissing { section: String, field: String },

    #[error("invalid network configuration for interface '{nic}' of host '{host}': {reason}")]
    NetworkConfig {
        host: String,
        nic: String,
        reason: String,
    },

    #[error("no address left in {block} for interface '{nic}' of host '{host}'")]
    AddressPoolExhausted {
        host: String,
        nic: String,
        block: String,
    },

    #[error("filesystems '{first}' and '{second}' both set mgs_internal; only one may host the MGS")]
    MultipleMgsFilesystems { first: String, second: String },

    #[error("host '{host}' referenced by {referrer} is not part of the cluster")]
    UnknownHost { host: String, referrer: String },

    #[error("resolution phase '{phase}' needs {requires}, which has not been resolved yet")]
    ResolutionOrder {
        phase: &'static str,
        requires: String,
    },
}

impl ConfigError {
    pub fn parse(
        section: &str,
        field: &str,
        value: &str,
        reason: impl fmt::Display,
    ) -> Self {
        ConfigError::Parse {
            section: section.to_string(),
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn network(host: &str, nic: &str, reason: impl fmt::Display) -> Self {
        ConfigError::NetworkConfig {
            host: host.to_string(),
            nic: nic.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn missing(section: &str, field: &str) -> Self {
        ConfigError::MandatoryFieldMissing {
            section: section.to_string(),
            field: field.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
