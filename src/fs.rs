// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use serde::Serialize;

use crate::{
    cluster::ResolveOptions,
    error::{ConfigError, Result},
    host::{self, Host},
    nodeset,
    section::{Loaded, Schema},
    source::Sources,
};

lazy_static! {
    /// `tune_ost_mke2fs_opts` clauses are separated by commas that start a new `for ...` clause.
    static ref TUNE_CLAUSE: Regex = Regex::new(r"(,)\s*for").unwrap();
    static ref SIZE_LITERAL: Regex = Regex::new(r"\d+[KMGTP]?B").unwrap();
}

const DEFAULT_MOUNT_OPTS: &str = "max_sectors_kb=0";
const DEFAULT_DEVICE_PATH: &str = "/dev/mapper";

pub fn section_name(name: &str) -> String {
    format!("fs {name}")
}

/// The backing store of a filesystem's targets.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackFs {
    Ldiskfs,
    Zfs,
}

impl BackFs {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackFs::Ldiskfs => "ldiskfs",
            BackFs::Zfs => "zfs",
        }
    }
}

impl std::str::FromStr for BackFs {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "ldiskfs" => Ok(BackFs::Ldiskfs),
            "zfs" => Ok(BackFs::Zfs),
            other => Err(format!("unsupported backing filesystem '{other}'")),
        }
    }
}

/// Settings that only apply to ldiskfs backed targets.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LdiskfsSettings {
    pub mdt_mke2fs_opts: Vec<String>,
    pub ost_mke2fs_opts: Vec<String>,
    pub tune_ost_mke2fs_opts: Vec<String>,
    pub mgs_device_path: Option<String>,
    pub mdt_base_device_path: String,
    pub ost_device_path: String,
}

/// Zpools holding the targets of a zfs backed filesystem.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ZfsSettings {
    pub mgs_zpools: Vec<String>,
    pub mdt_zpools: Vec<String>,
    pub ost_zpools: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Storage {
    Ldiskfs(LdiskfsSettings),
    Zfs(ZfsSettings),
}

/// A `[fs <name>]` section and the target indices allocated for it.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Filesystem {
    pub name: String,
    pub mdt_opts: Option<String>,
    pub ost_opts: Option<String>,
    pub mgs_size: Option<String>,
    pub mdt_size: String,
    pub mgs_list: Vec<String>,
    pub mds_list: Vec<String>,
    pub oss_list: Vec<String>,
    pub pools: Vec<String>,
    pub default_mdt_count: u32,
    pub default_ost_count: Option<u32>,
    pub mmp_update_interval: u64,
    pub mdt_parts: Option<u64>,
    pub mgs_internal: bool,
    pub mgs_failback: bool,
    pub mdt_failback: bool,
    pub ost_failback: bool,
    pub hsm_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fake_nid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mgs_fs: Option<String>,
    /// MGS, MDS and OSS hosts, deduplicated in that order.
    pub host_list: Vec<String>,
    pub log_dir: String,
    pub mdt_list: IndexMap<String, Vec<u32>>,
    pub ost_list: IndexMap<String, Vec<u32>>,
    pub ost_lnet_list: IndexMap<String, Vec<u32>>,
    pub cur_mdt_index: u32,
    pub cur_ost_index: u32,
    pub total_mdt_count: Option<u32>,
    pub total_ost_count: Option<u32>,
    pub mdt_mount_opts: String,
    pub ost_mount_opts: String,
    pub mgt_mount_opts: String,
    pub backfs: BackFs,
    pub dom_enabled: bool,
    pub dom_max_file_size: u64,
    pub client_allow_intr: u8,
    #[serde(flatten)]
    pub storage: Storage,

    /// Indices named explicitly by some host; the counters never hand these out.
    #[serde(skip)]
    reserved_osts: BTreeSet<u32>,
    #[serde(skip)]
    reserved_mdts: BTreeSet<u32>,
}

impl Filesystem {
    pub fn schema() -> Schema {
        Schema::new()
            .strings(&[
                "ost_opts",
                "mdt_opts",
                "mdt_size",
                "mgs_size",
                "fake_nid",
                "mgs_fs",
                "mdt_mount_opts",
                "ost_mount_opts",
                "mgt_mount_opts",
                "backfs",
                "ost_device_path",
                "mdt_base_device_path",
                "mgs_device_path",
                "dom_max_file_size",
            ])
            .space_lists(&["pools", "mdt_mke2fs_opts", "ost_mke2fs_opts"])
            .ints(&[
                "default_ost_count",
                "default_mdt_count",
                "mmp_update_interval",
                "mdt_parts",
                "client_allow_intr",
            ])
            .bools(&[
                "mgs_internal",
                "mgs_failback",
                "mdt_failback",
                "ost_failback",
                "hsm_active",
                "dom_enabled",
            ])
            .node_lists(&[
                "mgs_list",
                "mds_list",
                "oss_list",
                "mgs_zpools",
                "mdt_zpools",
                "ost_zpools",
            ])
            .regex_list("tune_ost_mke2fs_opts", TUNE_CLAUSE.clone())
            .mandatory(&["mds_list", "oss_list", "mgs_internal"])
    }

    /// Load filesystem `name`. Its log directory lives under `log_dir_base`.
    pub fn load(
        sources: &Sources,
        name: &str,
        log_dir_base: &str,
        options: &ResolveOptions,
    ) -> Result<Self> {
        let section = section_name(name);
        let mut loaded = Self::schema().load(sources, &section)?;
        loaded.check_mandatory(options.strict)?;

        let backfs = match loaded.string("backfs") {
            Some(value) => value
                .parse::<BackFs>()
                .map_err(|e| ConfigError::parse(&section, "backfs", &value, e))?,
            None => BackFs::Ldiskfs,
        };

        let storage = match backfs {
            BackFs::Ldiskfs => Storage::Ldiskfs(LdiskfsSettings {
                mdt_mke2fs_opts: loaded.list("mdt_mke2fs_opts").unwrap_or_default(),
                ost_mke2fs_opts: loaded.list("ost_mke2fs_opts").unwrap_or_default(),
                tune_ost_mke2fs_opts: tune_ost_mke2fs_opts(&loaded)?,
                mgs_device_path: loaded.string("mgs_device_path"),
                mdt_base_device_path: loaded
                    .string("mdt_base_device_path")
                    .unwrap_or_else(|| DEFAULT_DEVICE_PATH.to_string()),
                ost_device_path: loaded
                    .string("ost_device_path")
                    .unwrap_or_else(|| DEFAULT_DEVICE_PATH.to_string()),
            }),
            BackFs::Zfs => Storage::Zfs(ZfsSettings {
                mgs_zpools: loaded.list("mgs_zpools").unwrap_or_default(),
                mdt_zpools: loaded.list("mdt_zpools").unwrap_or_default(),
                ost_zpools: loaded.list("ost_zpools").unwrap_or_default(),
            }),
        };

        let dom_max_file_size = loaded.string("dom_max_file_size").unwrap_or("64K".into());
        let dom_max_file_size = nodeset::cast_to_bytes(&dom_max_file_size)
            .map_err(|e| ConfigError::parse(&section, "dom_max_file_size", &dom_max_file_size, e))?;

        let client_allow_intr = match loaded.int("client_allow_intr") {
            None | Some(1) => 1,
            Some(0) => 0,
            Some(other) => {
                return Err(ConfigError::parse(
                    &section,
                    "client_allow_intr",
                    &other.to_string(),
                    "must be 0 or 1",
                ))
            }
        };

        let mut fs = Filesystem {
            name: name.to_string(),
            mdt_opts: loaded.string("mdt_opts"),
            ost_opts: loaded.string("ost_opts"),
            mgs_size: loaded.string("mgs_size").map(|s| s.replace("%%", "%")),
            mdt_size: loaded
                .string("mdt_size")
                .map(|s| s.replace("%%", "%"))
                .unwrap_or_else(|| "80%".to_string()),
            mgs_list: loaded.list("mgs_list").unwrap_or_default(),
            mds_list: loaded.list("mds_list").unwrap_or_default(),
            oss_list: loaded.list("oss_list").unwrap_or_default(),
            pools: loaded.list("pools").unwrap_or_default(),
            default_mdt_count: loaded.count("default_mdt_count")?.unwrap_or(0),
            default_ost_count: loaded.count("default_ost_count")?,
            mmp_update_interval: loaded.unsigned("mmp_update_interval")?.unwrap_or(5),
            mdt_parts: loaded.unsigned("mdt_parts")?,
            mgs_internal: loaded.bool("mgs_internal").unwrap_or(false),
            mgs_failback: loaded.bool("mgs_failback").unwrap_or(true),
            mdt_failback: loaded.bool("mdt_failback").unwrap_or(true),
            ost_failback: loaded.bool("ost_failback").unwrap_or(true),
            hsm_active: loaded.bool("hsm_active").unwrap_or(false),
            fake_nid: loaded.string("fake_nid"),
            mgs_fs: loaded.string("mgs_fs"),
            host_list: Vec::new(),
            log_dir: format!("{}/{name}", log_dir_base.trim_end_matches('/')),
            mdt_list: IndexMap::new(),
            ost_list: IndexMap::new(),
            ost_lnet_list: IndexMap::new(),
            cur_mdt_index: 0,
            cur_ost_index: 0,
            total_mdt_count: None,
            total_ost_count: None,
            mdt_mount_opts: loaded
                .string("mdt_mount_opts")
                .unwrap_or_else(|| DEFAULT_MOUNT_OPTS.to_string()),
            ost_mount_opts: loaded
                .string("ost_mount_opts")
                .unwrap_or_else(|| DEFAULT_MOUNT_OPTS.to_string()),
            mgt_mount_opts: loaded
                .string("mgt_mount_opts")
                .unwrap_or_else(|| DEFAULT_MOUNT_OPTS.to_string()),
            backfs,
            dom_enabled: loaded.bool("dom_enabled").unwrap_or(false),
            dom_max_file_size,
            client_allow_intr,
            storage,
            reserved_osts: BTreeSet::new(),
            reserved_mdts: BTreeSet::new(),
        };

        if fs.mgs_internal {
            fs.mgs_size.get_or_insert_with(|| "500m".to_string());
            if fs.mgs_list.is_empty() {
                fs.mgs_list = fs.mds_list.iter().take(2).cloned().collect();
            }
        }

        for host in fs.mgs_list.iter().chain(&fs.mds_list).chain(&fs.oss_list) {
            if !fs.host_list.contains(host) {
                fs.host_list.push(host.clone());
            }
        }

        for (key, value) in loaded.unknown.consume_matching(|key| key.ends_with("_ost")) {
            let lnet = key.trim_end_matches("_ost").to_string();
            let osts = value
                .split_whitespace()
                .map(|ost| ost.parse::<u32>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| ConfigError::parse(&section, &key, &value, e))?;
            fs.ost_lnet_list.insert(lnet, osts);
        }

        if !loaded.unknown.is_empty() {
            debug!(
                "[{section}] unrecognized options: {:?}",
                loaded.unknown.remaining().keys()
            );
        }

        Ok(fs)
    }

    pub fn is_ldiskfs(&self) -> bool {
        self.backfs == BackFs::Ldiskfs
    }

    /// Zpools referenced by this filesystem, MGS then MDT then OST. Empty unless zfs backed.
    pub fn zpools(&self) -> Vec<String> {
        match &self.storage {
            Storage::Zfs(zfs) => zfs
                .mgs_zpools
                .iter()
                .chain(&zfs.mdt_zpools)
                .chain(&zfs.ost_zpools)
                .cloned()
                .collect(),
            Storage::Ldiskfs(_) => Vec::new(),
        }
    }

    /// Hand out the next OST index that has not been named explicitly by a host.
    pub fn next_ost_index(&mut self) -> u32 {
        while self.reserved_osts.contains(&self.cur_ost_index) {
            self.cur_ost_index += 1;
        }
        let index = self.cur_ost_index;
        self.cur_ost_index += 1;
        index
    }

    /// Hand out the next MDT index that has not been named explicitly by a host.
    pub fn next_mdt_index(&mut self) -> u32 {
        while self.reserved_mdts.contains(&self.cur_mdt_index) {
            self.cur_mdt_index += 1;
        }
        let index = self.cur_mdt_index;
        self.cur_mdt_index += 1;
        index
    }

    fn explicit_indices(&self, host: &Host, key: &str) -> Result<Option<Vec<u32>>> {
        let Some(spec) = host.unknown.peek(key) else {
            return Ok(None);
        };
        let specs: Vec<&str> = spec.split_whitespace().collect();
        let indices = nodeset::parse_index_list(&specs)
            .map_err(|e| ConfigError::parse(&host::section_name(&host.name), key, spec, e))?;
        Ok(Some(indices.into_iter().collect()))
    }

    fn explicit_count(&self, host: &mut Host, key: &str) -> Result<Option<u32>> {
        let Some(count) = host.unknown.consume(key) else {
            return Ok(None);
        };
        count
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|e| ConfigError::parse(&host::section_name(&host.name), key, &count, e))
    }

    /// Work out the OSTs `host` serves: an explicit `<fs>_osts` index list, else
    /// `<fs>_ost_count` fresh indices, else `default_ost_count` fresh indices.
    pub fn register_osts(&mut self, host: &mut Host) -> Result<Vec<u32>> {
        let list_key = format!("{}_osts", self.name);
        let osts = match self.explicit_indices(host, &list_key)? {
            Some(osts) => {
                host.unknown.consume(&list_key);
                osts
            }
            None => {
                let count_key = format!("{}_ost_count", self.name);
                let count = match self.explicit_count(host, &count_key)? {
                    Some(count) => count,
                    None => self.default_ost_count.ok_or_else(|| {
                        ConfigError::missing(&section_name(&self.name), "default_ost_count")
                    })?,
                };
                (0..count).map(|_| self.next_ost_index()).collect()
            }
        };

        host.ost_list.insert(self.name.clone(), osts.clone());
        Ok(osts)
    }

    /// Work out the MDTs `host` serves, like [`Filesystem::register_osts`]. When the default
    /// MDT count is zero the first MDS still gets one MDT.
    pub fn register_mdts(&mut self, host: &mut Host) -> Result<Vec<u32>> {
        let list_key = format!("{}_mdts", self.name);
        let mdts = match self.explicit_indices(host, &list_key)? {
            Some(mdts) => {
                host.unknown.consume(&list_key);
                mdts
            }
            None => {
                let count_key = format!("{}_mdt_count", self.name);
                let count = match self.explicit_count(host, &count_key)? {
                    Some(count) => count,
                    None if self.default_mdt_count == 0
                        && self.mds_list.first() == Some(&host.name) =>
                    {
                        1
                    }
                    None => self.default_mdt_count,
                };
                (0..count).map(|_| self.next_mdt_index()).collect()
            }
        };

        host.mdt_list.insert(self.name.clone(), mdts.clone());
        Ok(mdts)
    }

    /// Register this filesystem with the hosts serving it and allocate target indices.
    ///
    /// Explicit index lists of every OSS and MDS are reserved first, then hosts are processed
    /// in OSS list and MDS list order.
    pub fn associate_hosts(&mut self, hosts: &mut IndexMap<String, Host>) -> Result<()> {
        let device_paths = match &self.storage {
            Storage::Ldiskfs(ldiskfs) => Some((
                ldiskfs.ost_device_path.clone(),
                ldiskfs.mdt_base_device_path.clone(),
            )),
            Storage::Zfs(_) => None,
        };

        for name in self.host_list.clone() {
            let host = resolved_host(hosts, &name)?;
            host.register_fs(
                &self.name,
                device_paths.as_ref().map(|(o, m)| (o.as_str(), m.as_str())),
            );
        }

        let ost_key = format!("{}_osts", self.name);
        let mdt_key = format!("{}_mdts", self.name);
        for name in self.oss_list.clone() {
            if let Some(osts) = self.explicit_indices(resolved_host(hosts, &name)?, &ost_key)? {
                self.reserved_osts.extend(osts);
            }
        }
        for name in self.mds_list.clone() {
            if let Some(mdts) = self.explicit_indices(resolved_host(hosts, &name)?, &mdt_key)? {
                self.reserved_mdts.extend(mdts);
            }
        }

        for name in self.oss_list.clone() {
            let osts = self.register_osts(resolved_host(hosts, &name)?)?;
            self.ost_list.insert(name, osts);
        }
        self.total_ost_count = Some(self.ost_list.values().map(|l| l.len() as u32).sum());

        for name in self.mds_list.clone() {
            let mdts = self.register_mdts(resolved_host(hosts, &name)?)?;
            self.mdt_list.insert(name, mdts);
        }
        self.total_mdt_count = Some(self.mdt_list.values().map(|l| l.len() as u32).sum());

        self.check_ost_lnet_list();
        debug!(
            "filesystem '{}': {} OSTs, {} MDTs",
            self.name,
            self.total_ost_count.unwrap_or(0),
            self.total_mdt_count.unwrap_or(0)
        );
        Ok(())
    }

    /// Warn about `<lnet>_ost` restrictions naming OSTs that no host serves.
    fn check_ost_lnet_list(&self) {
        let served: BTreeSet<u32> = self.ost_list.values().flatten().copied().collect();
        for (lnet, osts) in self.ost_lnet_list.iter() {
            for ost in osts.iter().filter(|ost| !served.contains(ost)) {
                warn!(
                    "filesystem '{}': OST {ost} restricted to LNet '{lnet}' is not served by any host",
                    self.name
                );
            }
        }
    }

    pub fn get_ost_list(&self, host: &str) -> &[u32] {
        self.ost_list.get(host).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn get_mdt_list(&self, host: &str) -> &[u32] {
        self.mdt_list.get(host).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Look up a host that filesystem association needs; it must have been resolved already.
fn resolved_host<'a>(hosts: &'a mut IndexMap<String, Host>, name: &str) -> Result<&'a mut Host> {
    match hosts.get_mut(name) {
        Some(host) if host.is_network_resolved() => Ok(host),
        _ => Err(ConfigError::ResolutionOrder {
            phase: "filesystem association",
            requires: format!("host '{name}'"),
        }),
    }
}

/// Split the tuning clauses and cast the size literals in them to bytes.
fn tune_ost_mke2fs_opts(loaded: &Loaded) -> Result<Vec<String>> {
    let clauses = loaded.list("tune_ost_mke2fs_opts").unwrap_or_default();
    let mut tuned = Vec::with_capacity(clauses.len());

    for clause in clauses {
        let mut error = None;
        let replaced = SIZE_LITERAL.replace_all(&clause, |caps: &regex::Captures| {
            match nodeset::cast_to_bytes(&caps[0]) {
                Ok(bytes) => bytes.to_string(),
                Err(e) => {
                    error.get_or_insert(e);
                    caps[0].to_string()
                }
            }
        });
        if let Some(e) = error {
            return Err(ConfigError::parse(
                loaded.section(),
                "tune_ost_mke2fs_opts",
                &clause,
                e,
            ));
        }
        tuned.push(replaced.trim().to_string());
    }

    Ok(tuned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RawConfig;

    fn load(text: &str) -> Result<Filesystem> {
        let raw = RawConfig::parse(text).unwrap();
        Filesystem::load(
            &Sources::new(&raw, None),
            "fs1",
            "/scratch/log",
            &ResolveOptions::default(),
        )
    }

    #[test]
    fn defaults_and_tunings() {
        let fs = load(
            "[fs fs1]\nmgs_internal = yes\nmds_list = mds[0-2]\noss_list = oss[1-2]\nmdt_size = 50%%\n",
        )
        .unwrap();
        assert_eq!(fs.mdt_size, "50%");
        assert_eq!(fs.mgs_size.as_deref(), Some("500m"));
        assert_eq!(fs.mgs_list, vec!["mds0", "mds1"]);
        assert_eq!(fs.host_list, vec!["mds0", "mds1", "mds2", "oss1", "oss2"]);
        assert_eq!(fs.log_dir, "/scratch/log/fs1");
        assert_eq!(fs.dom_max_file_size, 65536);
        assert!(fs.mgs_failback && fs.mdt_failback && fs.ost_failback);
        let Storage::Ldiskfs(ldiskfs) = &fs.storage else {
            panic!("expected ldiskfs settings");
        };
        assert_eq!(ldiskfs.mdt_base_device_path, "/dev/mapper");
    }

    #[test]
    fn tune_clauses_are_split_and_cast() {
        let fs = load(
            "[fs fs1]\nmds_list = mds0\noss_list = oss0\ntune_ost_mke2fs_opts = for size < 10GB apply '-E a,b', for size >= 10GB apply '-E c'\n",
        )
        .unwrap();
        let Storage::Ldiskfs(ldiskfs) = &fs.storage else {
            panic!("expected ldiskfs settings");
        };
        assert_eq!(
            ldiskfs.tune_ost_mke2fs_opts,
            vec![
                "for size < 10737418240 apply '-E a,b'",
                "for size >= 10737418240 apply '-E c'"
            ]
        );
    }

    #[test]
    fn lnet_ost_restrictions() {
        let fs = load("[fs fs1]\nmds_list = mds0\noss_list = oss0\no2ib1_ost = 0 2\n").unwrap();
        assert_eq!(fs.ost_lnet_list["o2ib1"], vec![0, 2]);
    }

    #[test]
    fn client_allow_intr_must_be_binary() {
        assert!(matches!(
            load("[fs fs1]\nclient_allow_intr = 2\n"),
            Err(ConfigError::Parse { ref field, .. }) if field == "client_allow_intr"
        ));
    }

    #[test]
    fn zfs_exports_zpools() {
        let fs = load("[fs fs1]\nbackfs = zfs\nmdt_zpools = mdt[0-1]\nost_zpools = ost0\n").unwrap();
        assert_eq!(fs.zpools(), vec!["mdt0", "mdt1", "ost0"]);
        let json = serde_json::to_value(&fs).unwrap();
        assert!(json.get("mdt_zpools").is_some());
        assert!(json.get("ost_device_path").is_none());
    }

    #[test]
    fn counters_skip_reserved_indices() {
        let mut fs = load("[fs fs1]\nmds_list = mds0\noss_list = oss0\n").unwrap();
        fs.reserved_osts.extend([0, 1, 3]);
        assert_eq!(fs.next_ost_index(), 2);
        assert_eq!(fs.next_ost_index(), 4);
    }
}
