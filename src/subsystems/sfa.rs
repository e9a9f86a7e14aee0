// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use serde::Serialize;

use crate::{
    cluster::ResolveOptions, error::Result, host::MASKED_PASSWORD, section::Schema,
    source::Sources,
};

/// Password policy under which array passwords are never exported.
pub const ENCRYPTION_POLICY: &str = "encryption";

/// A storage array, from a `[sfa <name>]` section.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SfaSettings {
    pub name: String,
    pub user: String,
    pub password: String,
    pub controllers: Vec<String>,
}

impl SfaSettings {
    pub fn load(
        sources: &Sources,
        name: &str,
        password_policy: &str,
        options: &ResolveOptions,
    ) -> Result<Self> {
        let loaded = Schema::new()
            .strings(&["user", "password"])
            .space_lists(&["controllers"])
            .mandatory(&["controllers"])
            .load(sources, &format!("sfa {name}"))?;
        loaded.check_mandatory(options.strict)?;

        let mut sfa = SfaSettings {
            name: name.to_string(),
            user: loaded.string("user").unwrap_or_else(|| "user".to_string()),
            password: loaded.string("password").unwrap_or_else(|| "user".to_string()),
            controllers: loaded.list("controllers").unwrap_or_default(),
        };
        if password_policy == ENCRYPTION_POLICY {
            sfa.password = MASKED_PASSWORD.to_string();
        }
        Ok(sfa)
    }
}
