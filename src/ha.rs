// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;

use crate::{
    cluster::ResolveOptions,
    error::{ConfigError, Result},
    host::Host,
    nodeset,
    section::Schema,
    source::Sources,
};

pub const SECTION: &str = "HA";

/// Corosync and pacemaker settings from the `[HA]` section, plus the failover groups.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HaSettings {
    pub corosync_nics: Vec<String>,
    pub no_quorum_policy: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub transport: String,
    pub failover_policy: String,
    pub rrp_mode: String,
    pub mcastport: u64,
    pub ha_group_count: Option<usize>,
    pub start_on_boot: bool,
    pub ha_groups: Vec<Vec<String>>,
    pub dampen_ping: u64,
    pub dampen_ifspeed: u64,
    pub crypto_hash: String,
    pub crypto_cipher: String,
    pub secauth: String,
    pub netmtu: u64,
    pub window_size: u64,
    pub max_messages: u64,
    pub stonith_timeout: u64,
    pub zpool_monitor_timeout: u64,
    pub lustre_start_timeout: u64,
    pub stonith_action_sfa_vm: String,
}

impl Default for HaSettings {
    fn default() -> Self {
        HaSettings {
            corosync_nics: Vec::new(),
            no_quorum_policy: "freeze".to_string(),
            kind: "corosync".to_string(),
            transport: "multicast".to_string(),
            failover_policy: "standard".to_string(),
            rrp_mode: "passive".to_string(),
            mcastport: 5405,
            ha_group_count: None,
            start_on_boot: true,
            ha_groups: Vec::new(),
            dampen_ping: 20,
            dampen_ifspeed: 20,
            crypto_hash: "sha1".to_string(),
            crypto_cipher: "aes256".to_string(),
            secauth: "on".to_string(),
            netmtu: 1500,
            window_size: 50,
            max_messages: 17,
            stonith_timeout: 300,
            zpool_monitor_timeout: 60,
            lustre_start_timeout: 450,
            stonith_action_sfa_vm: "reboot".to_string(),
        }
    }
}

impl HaSettings {
    pub fn schema() -> Schema {
        Schema::new()
            .strings(&[
                "no_quorum_policy",
                "type",
                "transport",
                "failover_policy",
                "rrp_mode",
                "crypto_hash",
                "crypto_cipher",
                "secauth",
                "stonith_action_sfa_vm",
            ])
            .space_lists(&["corosync_nics"])
            .ints(&[
                "mcastport",
                "ha_group_count",
                "dampen_ping",
                "dampen_ifspeed",
                "netmtu",
                "window_size",
                "max_messages",
                "stonith_timeout",
                "zpool_monitor_timeout",
                "lustre_start_timeout",
            ])
            .bools(&["start_on_boot"])
    }

    /// Load the `[HA]` section. Without `ha_group_count`, the whole `host_list` forms a single
    /// group.
    pub fn load(sources: &Sources, host_list: &[String], options: &ResolveOptions) -> Result<Self> {
        let mut loaded = Self::schema().load(sources, SECTION)?;

        let mut ha = HaSettings::default();
        loaded.set_list("corosync_nics", &mut ha.corosync_nics);
        loaded.set_string("no_quorum_policy", &mut ha.no_quorum_policy);
        loaded.set_string("type", &mut ha.kind);
        loaded.set_string("transport", &mut ha.transport);
        loaded.set_string("failover_policy", &mut ha.failover_policy);
        loaded.set_string("rrp_mode", &mut ha.rrp_mode);
        loaded.set_string("crypto_hash", &mut ha.crypto_hash);
        loaded.set_string("crypto_cipher", &mut ha.crypto_cipher);
        loaded.set_string("secauth", &mut ha.secauth);
        loaded.set_string("stonith_action_sfa_vm", &mut ha.stonith_action_sfa_vm);
        loaded.set_bool("start_on_boot", &mut ha.start_on_boot);
        for (field, target) in [
            ("mcastport", &mut ha.mcastport),
            ("dampen_ping", &mut ha.dampen_ping),
            ("dampen_ifspeed", &mut ha.dampen_ifspeed),
            ("netmtu", &mut ha.netmtu),
            ("window_size", &mut ha.window_size),
            ("max_messages", &mut ha.max_messages),
            ("stonith_timeout", &mut ha.stonith_timeout),
            ("zpool_monitor_timeout", &mut ha.zpool_monitor_timeout),
            ("lustre_start_timeout", &mut ha.lustre_start_timeout),
        ] {
            loaded.set_unsigned(field, target)?;
        }

        let Some(count) = loaded.count("ha_group_count")? else {
            ha.ha_groups = vec![host_list.to_vec()];
            ha.ha_group_count = Some(1);
            return Ok(ha);
        };

        ha.ha_group_count = Some(count as usize);
        for idx in 0..count {
            let key = format!("ha_group{idx}");
            let Some(spec) = loaded.unknown.consume(&key) else {
                if options.strict {
                    return Err(ConfigError::missing(SECTION, &key));
                }
                warn!("[{SECTION}] declares {count} groups but '{key}' is missing");
                ha.ha_groups.push(Vec::new());
                continue;
            };
            let specs: Vec<&str> = spec.split_whitespace().collect();
            let group = nodeset::parse_node_spec(&specs)
                .map_err(|e| ConfigError::parse(SECTION, &key, &spec, e))?;
            ha.ha_groups.push(group);
        }

        Ok(ha)
    }

    /// Stamp every grouped host with its group, then give each host of `host_list` the
    /// addresses its group peers have on each of its LNets.
    pub fn assign_groups(
        &self,
        hosts: &mut IndexMap<String, Host>,
        host_list: &[String],
    ) -> Result<()> {
        for (idx, group) in self.ha_groups.iter().enumerate() {
            for member in group {
                let Some(host) = hosts.get_mut(member) else {
                    return Err(ConfigError::UnknownHost {
                        host: member.clone(),
                        referrer: format!("[{SECTION}] ha_group{idx}"),
                    });
                };
                host.ha_group_idx = Some(idx);
                host.ha_group = Some(group.clone());
            }
        }

        for name in host_list {
            let Some(host) = hosts.get(name) else {
                continue;
            };
            let Some(group) = host.ha_group_idx.and_then(|idx| self.ha_groups.get(idx)) else {
                debug!("host '{name}' is not part of any HA group");
                continue;
            };

            let mut members: IndexMap<String, Vec<Vec<String>>> = IndexMap::new();
            for (lnet, _) in host.lnet_pairs()? {
                if members.contains_key(&lnet) {
                    continue;
                }
                let mut peers = Vec::new();
                for member in group {
                    // Members were checked above.
                    let Some(peer) = hosts.get(member) else {
                        continue;
                    };
                    if let Some(ips) = peer.nids_by_lnet()?.shift_remove(&lnet) {
                        peers.push(ips);
                    }
                }
                members.insert(lnet, peers);
            }

            if let Some(host) = hosts.get_mut(name) {
                host.lnet_members = members;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RawConfig;

    fn hosts() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[test]
    fn implicit_single_group() {
        let raw = RawConfig::parse("[HA]\nmcastport = 6000\n").unwrap();
        let ha = HaSettings::load(&Sources::new(&raw, None), &hosts(), &ResolveOptions::default())
            .unwrap();
        assert_eq!(ha.mcastport, 6000);
        assert_eq!(ha.ha_group_count, Some(1));
        assert_eq!(ha.ha_groups, vec![hosts()]);
    }

    #[test]
    fn missing_group_keeps_index() {
        let raw =
            RawConfig::parse("[HA]\nha_group_count = 3\nha_group0 = a\nha_group2 = oss[1-2]\n")
                .unwrap();
        let ha = HaSettings::load(&Sources::new(&raw, None), &hosts(), &ResolveOptions::default())
            .unwrap();
        assert_eq!(ha.ha_groups.len(), 3);
        assert!(ha.ha_groups[1].is_empty());
        assert_eq!(ha.ha_groups[2], vec!["oss1", "oss2"]);

        let strict = ResolveOptions { strict: true };
        assert_eq!(
            HaSettings::load(&Sources::new(&raw, None), &hosts(), &strict),
            Err(ConfigError::missing(SECTION, "ha_group1"))
        );
    }

    #[test]
    fn type_is_exported_under_its_name() {
        let json = serde_json::to_value(HaSettings::default()).unwrap();
        assert_eq!(json["type"], "corosync");
    }
}
