// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    fs::Filesystem,
    global::GlobalSettings,
    ha::HaSettings,
    host::Host,
    host_defaults::HostDefaults,
    pool::{Pool, Zpool},
    subsystems::{EmfSettings, HsmSettings, RestSettings, SfaSettings},
};

/// ClusterConfig is the fully resolved model of a cluster, as handed to reporting and
/// deployment tooling.
///
/// The model read from the configuration file is intentionally different from this one: the
/// file describes hosts and filesystems compactly and leaves most settings to defaults, while
/// the resolved model has every cross reference filled in. It is built once by
/// [`crate::cluster::Resolver`] and never changes afterwards.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    pub(crate) global_settings: GlobalSettings,
    pub(crate) host_defaults_settings: Option<HostDefaults>,
    pub(crate) hsm_settings: Option<HsmSettings>,
    pub(crate) fs_settings: IndexMap<String, Filesystem>,
    pub(crate) pool_settings: IndexMap<String, Pool>,
    /// Only present when some filesystem is zfs backed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) zpool_settings: Option<IndexMap<String, Zpool>>,
    pub(crate) emf_settings: Option<EmfSettings>,
    pub(crate) ha_settings: Option<HaSettings>,
    pub(crate) hosts_settings: IndexMap<String, Host>,
    pub(crate) sfa_settings: IndexMap<String, SfaSettings>,
    pub(crate) rest_settings: Option<RestSettings>,
}

impl ClusterConfig {
    pub fn global(&self) -> &GlobalSettings {
        &self.global_settings
    }

    pub fn host_defaults(&self) -> Option<&HostDefaults> {
        self.host_defaults_settings.as_ref()
    }

    pub fn hsm(&self) -> Option<&HsmSettings> {
        self.hsm_settings.as_ref()
    }

    /// Filesystems in resolved order, the MGS filesystem first.
    pub fn filesystems(&self) -> impl Iterator<Item = &Filesystem> {
        self.global_settings
            .fs_list
            .iter()
            .filter_map(|name| self.fs_settings.get(name))
    }

    pub fn filesystem(&self, name: &str) -> Option<&Filesystem> {
        self.fs_settings.get(name)
    }

    pub fn pool(&self, name: &str) -> Option<&Pool> {
        self.pool_settings.get(name)
    }

    pub fn zpool(&self, name: &str) -> Option<&Zpool> {
        self.zpool_settings.as_ref().and_then(|z| z.get(name))
    }

    pub fn emf(&self) -> Option<&EmfSettings> {
        self.emf_settings.as_ref()
    }

    pub fn ha(&self) -> Option<&HaSettings> {
        self.ha_settings.as_ref()
    }

    /// Hosts in resolution order: servers, then clients.
    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts_settings.values()
    }

    pub fn host(&self, name: &str) -> Option<&Host> {
        self.hosts_settings.get(name)
    }

    pub fn sfa(&self, name: &str) -> Option<&SfaSettings> {
        self.sfa_settings.get(name)
    }

    pub fn rest(&self) -> Option<&RestSettings> {
        self.rest_settings.as_ref()
    }

    /// The members of the HA group of `host`. Clients and ungrouped hosts have none.
    pub fn ha_group_of(&self, host: &str) -> &[String] {
        if self.global_settings.clients_list.iter().any(|c| c == host) {
            return &[];
        }
        self.host(host)
            .and_then(|h| h.ha_group.as_deref())
            .unwrap_or_default()
    }

    pub fn print_summary(&self) {
        let global = &self.global_settings;
        if let Some(name) = &global.cluster_name {
            println!("Cluster {name}");
        }
        println!(
            "{} filesystems, {} hosts, {} clients",
            self.fs_settings.len(),
            global.host_list.len(),
            global.clients_list.len()
        );
        for fs in self.filesystems() {
            let mgs = if fs.mgs_internal { ", MGS" } else { "" };
            println!(
                "  fs {} ({}{mgs}): {} MDTs, {} OSTs on {} hosts",
                fs.name,
                fs.backfs.as_str(),
                fs.total_mdt_count.unwrap_or(0),
                fs.total_ost_count.unwrap_or(0),
                fs.host_list.len()
            );
        }
        if let Some(ha) = &self.ha_settings {
            println!("  {} HA groups", ha.ha_groups.len());
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
