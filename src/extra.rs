// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use indexmap::IndexMap;

use crate::{error::Result, section::Schema, source::Sources};

/// Free-form sections such as `[set_param_tunings]` or `[sysctl oss01]`: every option is kept
/// verbatim, in file order, layered over optional defaults.
pub fn load_extra(
    sources: &Sources,
    section: &str,
    defaults: Option<&IndexMap<String, String>>,
) -> Result<IndexMap<String, String>> {
    let mut loaded = Schema::new().load(sources, section)?;

    let mut settings = defaults.cloned().unwrap_or_default();
    settings.extend(loaded.unknown.drain());
    Ok(settings)
}
