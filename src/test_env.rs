// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use crate::{
    cluster::{resolve_files, ResolveOptions, Resolver},
    config::ClusterConfig,
    error::Result,
    source::RawConfig,
};

/// Given a relative `path` in the test directory, prepend the
/// full path to the test directory.
pub fn test_path(path: &str) -> String {
    std::env::var("CARGO_MANIFEST_DIR").unwrap() + "/tests/" + path
}

/// A TestEnvironment names the configuration a test resolves. The configuration for a test
/// named `test_id` lives in `tests/configs/{test_id}.conf`; its optional shadow configuration
/// lives next to it in `tests/configs/{test_id}.shadow.conf`.
///
/// All access to test fixtures should go through TestEnvironment rather than be coded in the
/// tests themselves.
pub struct TestEnvironment {
    test_id: String,
    use_shadow: bool,
    options: ResolveOptions,
}

impl TestEnvironment {
    pub fn new(test_id: &str) -> Self {
        Self {
            test_id: test_id.to_string(),
            use_shadow: false,
            options: ResolveOptions::default(),
        }
    }

    /// Layer the test's shadow configuration over its main configuration.
    pub fn with_shadow(mut self) -> Self {
        self.use_shadow = true;
        self
    }

    pub fn strict(mut self) -> Self {
        self.options.strict = true;
        self
    }

    pub fn config_path(&self) -> String {
        test_path(&format!("configs/{}.conf", self.test_id))
    }

    pub fn shadow_path(&self) -> String {
        test_path(&format!("configs/{}.shadow.conf", self.test_id))
    }

    pub fn resolve(&self) -> Result<ClusterConfig> {
        let shadow = self.use_shadow.then(|| self.shadow_path());
        resolve_files(self.config_path(), shadow, self.options)
    }

    /// Resolve the test's configuration, panicking if it does not resolve.
    pub fn cluster(&self) -> ClusterConfig {
        self.resolve()
            .unwrap_or_else(|e| panic!("{} did not resolve: {e}", self.config_path()))
    }
}

/// Resolve configuration text, with optional shadow text layered over it.
pub fn resolve_str(config: &str, shadow: Option<&str>) -> Result<ClusterConfig> {
    resolve_str_with(config, shadow, ResolveOptions::default())
}

pub fn resolve_str_with(
    config: &str,
    shadow: Option<&str>,
    options: ResolveOptions,
) -> Result<ClusterConfig> {
    let primary = RawConfig::parse(config)?;
    let shadow = shadow.map(RawConfig::parse).transpose()?;
    Resolver::new(&primary, shadow.as_ref(), options).resolve()
}
