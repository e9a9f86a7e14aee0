// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use indexmap::IndexMap;
use log::debug;
use serde::Serialize;

use crate::{
    error::{ConfigError, Result},
    host_defaults::{HostCommon, HostDefaults},
    section::{Schema, Unknown},
    source::Sources,
};

pub mod lnet;
pub mod nic;

pub use nic::Nic;

/// Password exported in place of a defaulted stonith password when the password policy does not
/// allow clear text.
pub const MASKED_PASSWORD: &str = "xxxx";

/// The section name of the host called `name`.
pub fn section_name(name: &str) -> String {
    format!("host {name}")
}

/// A server or client of the cluster, fully resolved.
///
/// A host starts out as a copy of the host defaults overlaid with its own `[host <name>]`
/// section. Network resolution fills in the NICs, filesystem registration fills in the target
/// indices and HA resolution fills in the group and LNet membership.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Host {
    pub name: String,
    #[serde(flatten)]
    pub common: HostCommon,
    pub peers: Vec<String>,
    pub stonith_primary_peers: Vec<String>,
    pub stonith_secondary_peers: Vec<String>,
    pub oid: Option<String>,
    pub fs_list: Vec<String>,
    pub ost_list: IndexMap<String, Vec<u32>>,
    pub mdt_list: IndexMap<String, Vec<u32>>,
    pub ost_device_paths: IndexMap<String, String>,
    pub mdt_base_device_paths: IndexMap<String, String>,
    pub ha_group_idx: Option<usize>,
    pub ha_group: Option<Vec<String>>,
    pub lnet_nics: Vec<String>,
    pub lnet_members: IndexMap<String, Vec<Vec<String>>>,
    pub nics: IndexMap<String, Nic>,
    pub sysctl: Option<IndexMap<String, String>>,

    /// Options of the host section that nothing has claimed yet.
    #[serde(skip)]
    pub(crate) unknown: Unknown,
    #[serde(skip)]
    network_resolved: bool,
}

impl Host {
    pub fn schema() -> Schema {
        HostCommon::schema()
            .strings(&["oid"])
            .space_lists(&["stonith_primary_peers", "stonith_secondary_peers"])
            .node_lists(&["peers"])
    }

    /// Load the section of host `name` on top of `defaults`.
    ///
    /// `plain_text` is whether defaulted stonith passwords may be exported in clear text.
    pub fn load(
        sources: &Sources,
        name: &str,
        defaults: Option<&HostDefaults>,
        plain_text: bool,
    ) -> Result<Self> {
        let loaded = Self::schema().load(sources, &section_name(name))?;

        let mut common = defaults.map(|d| d.common.clone()).unwrap_or_default();
        common.overlay(&loaded)?;

        let mut host = Host {
            name: name.to_string(),
            common,
            peers: loaded.list("peers").unwrap_or_default(),
            stonith_primary_peers: loaded.list("stonith_primary_peers").unwrap_or_default(),
            stonith_secondary_peers: loaded.list("stonith_secondary_peers").unwrap_or_default(),
            oid: loaded.string("oid"),
            fs_list: Vec::new(),
            ost_list: IndexMap::new(),
            mdt_list: IndexMap::new(),
            ost_device_paths: IndexMap::new(),
            mdt_base_device_paths: IndexMap::new(),
            ha_group_idx: None,
            ha_group: None,
            lnet_nics: Vec::new(),
            lnet_members: IndexMap::new(),
            nics: IndexMap::new(),
            sysctl: None,
            unknown: loaded.unknown,
            network_resolved: false,
        };

        if host.common.serial_speed.to_ascii_lowercase().starts_with("no") {
            host.common.serial_port = None;
        }
        host.set_stonith_defaults(plain_text);

        Ok(host)
    }

    /// Report mandatory settings that are set neither in the host section nor in the host
    /// defaults.
    pub fn check_mandatory(&self, strict: bool) -> Result<()> {
        let missing = [
            ("lnets", self.common.lnets.is_empty()),
            ("stonith_type", self.common.stonith_type.is_none()),
            ("nic_list", self.common.nic_list.is_empty()),
        ];
        for (field, _) in missing.iter().filter(|(_, missing)| *missing) {
            if strict {
                return Err(ConfigError::missing(&section_name(&self.name), field));
            }
            log::warn!("host '{}' does not set mandatory field '{field}'", self.name);
        }
        Ok(())
    }

    fn set_stonith_defaults(&mut self, plain_text: bool) {
        let (user, pass) = match self.common.stonith_type.as_deref() {
            Some("ipmi") | Some("ipmi-slow") => {
                self.common.ipmi_delay.get_or_insert(15);
                self.common.ipmi_monitor.get_or_insert(60);
                self.common.ipmi_method.get_or_insert_with(|| "onoff".to_string());
                ("root", "calvin")
            }
            Some("ilo") => ("Administrator", "datadirect"),
            Some("sfa_vm") => ("user", "user"),
            _ => return,
        };

        self.common.stonith_user.get_or_insert_with(|| user.to_string());
        self.common.stonith_pass.get_or_insert_with(|| {
            if plain_text {
                pass.to_string()
            } else {
                MASKED_PASSWORD.to_string()
            }
        });
    }

    /// Build the NICs of this host: seed from the defaults, overlay the host's own settings,
    /// then work out bonding, addresses and network addresses in that order.
    ///
    /// Automatic addresses come from the cursors in `defaults`, so hosts must be resolved in
    /// host list order.
    pub fn resolve_network(&mut self, defaults: Option<&mut HostDefaults>) -> Result<()> {
        for name in self.common.candidate_nics() {
            let seed = defaults.as_deref().and_then(|d| d.nics.get(&name));
            let mut nic = Nic::seeded(&name, seed);
            nic.overlay(&mut self.unknown);
            self.nics.insert(name, nic);
        }

        nic::resolve_bonding(&self.name, &mut self.nics)?;
        nic::resolve_ips(&self.name, &mut self.nics, &mut self.unknown, defaults)?;
        nic::resolve_netaddrs(&self.name, &mut self.nics)?;

        self.lnet_nics = self.lnet_pairs()?.into_iter().map(|(_, nic)| nic).collect();
        self.network_resolved = true;
        debug!("resolved network of host '{}': {:?}", self.name, self.nics.keys());
        Ok(())
    }

    pub fn is_network_resolved(&self) -> bool {
        self.network_resolved
    }

    /// The `(lnet, nic)` pairs this host serves, in declared order.
    pub fn lnet_pairs(&self) -> Result<Vec<(String, String)>> {
        lnet::parse_lnets(&self.common.lnets).map_err(|reason| {
            ConfigError::parse(
                &section_name(&self.name),
                "lnets",
                &self.common.lnets.join(" "),
                reason,
            )
        })
    }

    fn nic(&self, name: &str) -> Result<&Nic> {
        self.nics.get(name).ok_or_else(|| {
            ConfigError::network(&self.name, name, "used by lnets but not in nic_list")
        })
    }

    /// The LNet networks in modprobe format, e.g. `o2ib(ib0,ib1), tcp(eth0)`.
    pub fn lnet_networks(&self) -> Result<String> {
        let pairs = self
            .lnet_pairs()?
            .into_iter()
            .map(|(lnet, name)| {
                let nic = self.nic(&name)?;
                Ok((lnet, nic.device.clone().unwrap_or(name)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(lnet::format_networks(&pairs))
    }

    /// The addresses of this host on each of its LNets.
    pub fn nids_by_lnet(&self) -> Result<IndexMap<String, Vec<String>>> {
        let mut nids: IndexMap<String, Vec<String>> = IndexMap::new();
        for (lnet, name) in self.lnet_pairs()? {
            let ips = nids.entry(lnet).or_default();
            if let Some(ip) = self.nic(&name)?.ip.clone() {
                ips.push(ip);
            }
        }
        Ok(nids)
    }

    /// The NIDs of this host, `ip@lnet`.
    pub fn nids(&self) -> Result<Vec<String>> {
        Ok(self
            .nids_by_lnet()?
            .into_iter()
            .flat_map(|(lnet, ips)| ips.into_iter().map(move |ip| format!("{ip}@{lnet}")))
            .collect())
    }

    pub fn has_stonith_peers(&self) -> bool {
        !self.stonith_primary_peers.is_empty() && !self.stonith_secondary_peers.is_empty()
    }

    /// Record that this host serves filesystem `fs`.
    ///
    /// `device_paths` carries the filesystem's default OST and MDT base device paths for
    /// ldiskfs filesystems; the host may override either with `<fs>_ost_device_path` and
    /// `<fs>_mdt_base_device_path`.
    pub fn register_fs(&mut self, fs: &str, device_paths: Option<(&str, &str)>) {
        if !self.fs_list.iter().any(|f| f == fs) {
            self.fs_list.push(fs.to_string());
        }
        self.ost_list.insert(fs.to_string(), Vec::new());
        self.mdt_list.insert(fs.to_string(), Vec::new());

        if let Some((ost_path, mdt_path)) = device_paths {
            let ost_path = self
                .unknown
                .consume(&format!("{fs}_ost_device_path"))
                .unwrap_or_else(|| ost_path.to_string());
            let mdt_path = self
                .unknown
                .consume(&format!("{fs}_mdt_base_device_path"))
                .unwrap_or_else(|| mdt_path.to_string());
            self.ost_device_paths.insert(fs.to_string(), ost_path);
            self.mdt_base_device_paths.insert(fs.to_string(), mdt_path);
        }
    }

    /// Options of the host section that no resolution step has consumed.
    pub fn unknown_settings(&self) -> &IndexMap<String, String> {
        self.unknown.remaining()
    }
}
