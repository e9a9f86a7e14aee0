// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use serde::Serialize;

use crate::{cluster::ResolveOptions, error::Result, section::Schema, source::Sources};

/// A named group of OSTs, from a `[pool <name>]` section.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Pool {
    pub name: String,
    pub ost_list: Vec<String>,
}

impl Pool {
    pub fn load(sources: &Sources, name: &str, options: &ResolveOptions) -> Result<Self> {
        let loaded = Schema::new()
            .node_lists(&["ost_list"])
            .mandatory(&["ost_list"])
            .load(sources, &format!("pool {name}"))?;
        loaded.check_mandatory(options.strict)?;

        Ok(Pool {
            name: name.to_string(),
            ost_list: loaded.list("ost_list").unwrap_or_default(),
        })
    }
}

/// A zpool backing zfs targets, from a `[zpool <name>]` section.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Zpool {
    pub name: String,
    pub vdevs: Vec<String>,
    pub opts: String,
    pub vdev_base_path: String,
}

impl Zpool {
    pub fn load(sources: &Sources, name: &str, options: &ResolveOptions) -> Result<Self> {
        let loaded = Schema::new()
            .strings(&["opts", "vdev_base_path"])
            .node_lists(&["vdevs"])
            .mandatory(&["vdevs"])
            .load(sources, &format!("zpool {name}"))?;
        loaded.check_mandatory(options.strict)?;

        Ok(Zpool {
            name: name.to_string(),
            vdevs: loaded.list("vdevs").unwrap_or_default(),
            opts: loaded
                .string("opts")
                .unwrap_or_else(|| "-o cachefile=none -O canmount=off -o multihost=on".to_string()),
            vdev_base_path: loaded
                .string("vdev_base_path")
                .unwrap_or_else(|| "/dev/disk/by-vdev/".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ConfigError, source::RawConfig};

    #[test]
    fn zpool_defaults() {
        let raw = RawConfig::parse("[zpool ost0]\nvdevs = raidz2 d[0-3]\n").unwrap();
        let zpool = Zpool::load(&Sources::new(&raw, None), "ost0", &ResolveOptions::default())
            .unwrap();
        assert_eq!(zpool.vdevs, vec!["raidz2", "d0", "d1", "d2", "d3"]);
        assert_eq!(zpool.vdev_base_path, "/dev/disk/by-vdev/");
    }

    #[test]
    fn strict_pool_needs_osts() {
        let raw = RawConfig::parse("[pool flash]\n").unwrap();
        let strict = ResolveOptions { strict: true };
        assert_eq!(
            Pool::load(&Sources::new(&raw, None), "flash", &strict),
            Err(ConfigError::missing("pool flash", "ost_list"))
        );
    }
}
