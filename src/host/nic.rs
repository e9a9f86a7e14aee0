// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::net::Ipv4Addr;

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    error::{ConfigError, Result},
    host_defaults::{HostDefaults, NicDefaults, IPMI_NIC},
    section::Unknown,
};

/// `cfg` lines that map onto NIC fields; anything else is kept in `cfg` verbatim.
const CFG_KEYS: [&str; 4] = ["NETMASK", "GATEWAY", "MASTER", "SLAVE"];

/// One network interface of a host, fully resolved.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct Nic {
    #[serde(skip)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slaves: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slave: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netaddr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_bonded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

impl Nic {
    /// Start from the host-defaults record for this NIC, if there is one.
    pub fn seeded(name: &str, defaults: Option<&NicDefaults>) -> Self {
        let mut nic = Nic {
            name: name.to_string(),
            ..Default::default()
        };
        if let Some(defaults) = defaults {
            nic.cfg = defaults.cfg.clone();
            nic.device = defaults.device.clone();
            nic.slaves = defaults.slaves.clone();
            nic.netmask = defaults.netmask.clone();
            nic.gateway = defaults.gateway.clone();
        }
        if !nic.is_ipmi() && nic.device.is_none() {
            nic.device = Some(name.to_string());
        }
        nic
    }

    pub fn is_ipmi(&self) -> bool {
        self.name == IPMI_NIC
    }

    /// Overlay the host's own `<nic>_<field>` options, consuming them.
    pub fn overlay(&mut self, unknown: &mut Unknown) {
        let name = self.name.clone();
        let mut take = |field: &str| unknown.consume(&format!("{name}_{field}"));

        if let Some(netmask) = take("netmask") {
            self.netmask = Some(netmask);
        }
        if let Some(gateway) = take("gateway") {
            self.gateway = Some(gateway);
        }
        if self.is_ipmi() {
            return;
        }
        for (field, target) in [
            ("cfg", &mut self.cfg),
            ("device", &mut self.device),
            ("slaves", &mut self.slaves),
            ("network", &mut self.network),
            ("mac", &mut self.mac),
        ] {
            if let Some(value) = take(field) {
                *target = Some(value);
            }
        }
        self.apply_cfg();
    }

    /// Pull NETMASK/GATEWAY/MASTER/SLAVE out of a raw `cfg` block.
    fn apply_cfg(&mut self) {
        let Some(cfg) = self.cfg.take() else {
            return;
        };

        let mut leftover = Vec::new();
        for line in cfg.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let parts: Vec<&str> = line.split('=').collect();
            let [key, value] = parts.as_slice() else {
                leftover.push(line);
                continue;
            };
            let value = Some(value.to_string());
            match *key {
                "NETMASK" => self.netmask = value,
                "GATEWAY" => self.gateway = value,
                "MASTER" => self.master = value,
                "SLAVE" => self.slave = value,
                _ => {
                    debug_assert!(!CFG_KEYS.contains(key));
                    leftover.push(line);
                }
            }
        }

        if !leftover.is_empty() {
            self.cfg = Some(leftover.join("\n"));
        }
    }
}

/// Work out the bonding roles of `nics`.
///
/// A NIC whose cfg names a master marks that master as bonded. A NIC with `slaves` is bonded
/// and becomes the master of each slave. Everything else is not bonded.
pub fn resolve_bonding(host: &str, nics: &mut IndexMap<String, Nic>) -> Result<()> {
    let names: Vec<String> = nics.keys().cloned().collect();

    for name in names.iter() {
        let nic = &mut nics[name];
        nic.slave = None;
        if let Some(master) = nic.master.clone() {
            let Some(master_nic) = nics.get_mut(&master) else {
                return Err(ConfigError::network(
                    host,
                    name,
                    format!("master '{master}' is not a declared interface"),
                ));
            };
            master_nic.is_bonded = Some(true);
        }
    }

    for name in names.iter() {
        let Some(slaves) = nics[name].slaves.clone() else {
            let nic = &mut nics[name];
            nic.is_bonded.get_or_insert(false);
            continue;
        };
        nics[name].is_bonded = Some(true);

        for slave in slaves.split_whitespace() {
            let Some(slave_nic) = nics.get_mut(slave) else {
                return Err(ConfigError::network(
                    host,
                    name,
                    format!("bonding slave '{slave}' is not a declared interface"),
                ));
            };
            slave_nic.master = Some(name.clone());
        }
    }

    Ok(())
}

/// Assign IP addresses. Bonding slaves get none. An explicit `<nic>_ip` option wins; otherwise
/// the host-defaults cursor for the NIC, if any, hands out the next address.
pub fn resolve_ips(
    host: &str,
    nics: &mut IndexMap<String, Nic>,
    unknown: &mut Unknown,
    mut defaults: Option<&mut HostDefaults>,
) -> Result<()> {
    for (name, nic) in nics.iter_mut() {
        if nic.master.is_some() {
            continue;
        }

        if let Some(ip) = unknown.consume(&format!("{name}_ip")) {
            nic.ip = Some(ip);
            continue;
        }

        if let Some(defaults) = defaults.as_deref_mut() {
            if defaults.has_base_ip(name) {
                nic.ip = Some(defaults.next_ip(name, host)?.to_string());
            }
        }
    }
    Ok(())
}

fn parse_quad(host: &str, nic: &str, what: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse::<Ipv4Addr>()
        .map(u32::from)
        .map_err(|e| ConfigError::network(host, nic, format!("incorrect {what} '{value}': {e}")))
}

/// Compute the network address of every non-IPMI NIC that has both an address and a netmask.
pub fn resolve_netaddrs(host: &str, nics: &mut IndexMap<String, Nic>) -> Result<()> {
    for (name, nic) in nics.iter_mut() {
        if nic.is_ipmi() {
            continue;
        }
        let (Some(ip), Some(netmask)) = (nic.ip.as_deref(), nic.netmask.as_deref()) else {
            continue;
        };
        let ip = parse_quad(host, name, "IP format", ip)?;
        let netmask = parse_quad(host, name, "netmask", netmask)?;
        nic.netaddr = Some(Ipv4Addr::from(ip & netmask).to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nic_map(nics: Vec<Nic>) -> IndexMap<String, Nic> {
        nics.into_iter().map(|n| (n.name.clone(), n)).collect()
    }

    #[test]
    fn cfg_lines_are_split_out() {
        let mut nic = Nic::seeded("eth1", None);
        nic.cfg = Some("MASTER=bond0\nSLAVE=yes\nMTU=9000\n".to_string());
        nic.apply_cfg();
        assert_eq!(nic.master.as_deref(), Some("bond0"));
        assert_eq!(nic.slave.as_deref(), Some("yes"));
        assert_eq!(nic.cfg.as_deref(), Some("MTU=9000"));
    }

    #[test]
    fn slaves_are_stamped_with_master() {
        let mut bond = Nic::seeded("bond0", None);
        bond.slaves = Some("eth1 eth2".to_string());
        let mut nics = nic_map(vec![
            bond,
            Nic::seeded("eth1", None),
            Nic::seeded("eth2", None),
            Nic::seeded("eth0", None),
        ]);
        resolve_bonding("h", &mut nics).unwrap();
        assert_eq!(nics["bond0"].is_bonded, Some(true));
        assert_eq!(nics["eth1"].master.as_deref(), Some("bond0"));
        assert_eq!(nics["eth2"].master.as_deref(), Some("bond0"));
        assert_eq!(nics["eth0"].is_bonded, Some(false));
        assert_eq!(nics["eth0"].master, None);
    }

    #[test]
    fn undeclared_slave_is_an_error() {
        let mut bond = Nic::seeded("bond0", None);
        bond.slaves = Some("eth9".to_string());
        let mut nics = nic_map(vec![bond]);
        assert!(matches!(
            resolve_bonding("h", &mut nics),
            Err(ConfigError::NetworkConfig { .. })
        ));
    }

    #[test]
    fn netaddr_is_masked() {
        let mut nic = Nic::seeded("ib0", None);
        nic.ip = Some("192.168.7.42".to_string());
        nic.netmask = Some("255.255.255.0".to_string());
        let mut nics = nic_map(vec![nic]);
        resolve_netaddrs("h", &mut nics).unwrap();
        assert_eq!(nics["ib0"].netaddr.as_deref(), Some("192.168.7.0"));
    }
}
