// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use serde::Serialize;

use crate::{cluster::ResolveOptions, error::Result, section::Schema, source::Sources};

pub const SECTION: &str = "EMF";

/// Management framework settings.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct EmfSettings {
    pub enabled: bool,
    pub ip: Option<String>,
    pub nic: Option<String>,
    pub cidr: Option<u64>,
    pub size: String,
}

impl EmfSettings {
    pub fn load(sources: &Sources, options: &ResolveOptions) -> Result<Self> {
        let loaded = Schema::new()
            .strings(&["ip", "nic", "size"])
            .ints(&["cidr"])
            .bools(&["enabled"])
            .mandatory(&["enabled"])
            .load(sources, SECTION)?;
        loaded.check_mandatory(options.strict)?;

        Ok(EmfSettings {
            enabled: loaded.bool("enabled").unwrap_or(false),
            ip: loaded.string("ip"),
            nic: loaded.string("nic"),
            cidr: loaded.unsigned("cidr")?,
            size: loaded.string("size").unwrap_or_else(|| "80G".to_string()),
        })
    }
}
