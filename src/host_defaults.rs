// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{collections::BTreeSet, net::Ipv4Addr};

use cidr::{Cidr as _, Inet as _, Ipv4Inet};
use indexmap::IndexMap;
use log::debug;
use serde::Serialize;

use crate::{
    cluster::ResolveOptions,
    error::{ConfigError, Result},
    section::{Loaded, Schema, Unknown},
    source::Sources,
};

pub const SECTION: &str = "host_defaults";

/// The NIC that is implicitly added for IPMI based fencing.
pub const IPMI_NIC: &str = "ipmi";

const COMMON_STRINGS: [&str; 19] = [
    "stonith_pass",
    "stonith_user",
    "stonith_type",
    "bonding_mode",
    "modprobe_cfg",
    "serial_speed",
    "serial_port",
    "ring0",
    "ring1",
    "ipmi_method",
    "grub_args",
    "rest_ext_nic",
    "rest_int_nic",
    "rest_primary_nic",
    "rest_keepalived_nic",
    "rest_cert_ca",
    "rest_cert_crl",
    "rest_cert_server",
    "rest_cert_server_key",
];

const COMMON_LISTS: [&str; 3] = ["nic_list", "lnets", "host_sfa_list"];

const COMMON_INTS: [&str; 3] = ["ipmi_delay", "ipmi_monitor", "ipmi_power_wait"];

/// Settings that appear both in `[host_defaults]` and in every `[host <name>]` section. A host
/// starts from a copy of the defaults and overlays its own section on top.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HostCommon {
    pub nic_list: Vec<String>,
    pub lnets: Vec<String>,
    pub host_sfa_list: Vec<String>,
    pub stonith_pass: Option<String>,
    pub stonith_user: Option<String>,
    pub stonith_type: Option<String>,
    pub ipmi_delay: Option<u64>,
    pub ipmi_method: Option<String>,
    pub ipmi_monitor: Option<u64>,
    pub ipmi_power_wait: u64,
    pub bonding_mode: Option<String>,
    pub modprobe_cfg: Option<String>,
    pub serial_speed: String,
    pub serial_port: Option<String>,
    pub ring0: Option<String>,
    pub ring1: Option<String>,
    pub grub_args: Option<String>,
    pub rest_ext_nic: Option<String>,
    pub rest_int_nic: Option<String>,
    pub rest_primary_nic: Option<String>,
    pub rest_keepalived_nic: Option<String>,
    pub rest_cert_ca: Option<String>,
    pub rest_cert_crl: Option<String>,
    pub rest_cert_server: Option<String>,
    pub rest_cert_server_key: Option<String>,
}

impl Default for HostCommon {
    fn default() -> Self {
        HostCommon {
            nic_list: Vec::new(),
            lnets: Vec::new(),
            host_sfa_list: Vec::new(),
            stonith_pass: None,
            stonith_user: None,
            stonith_type: None,
            ipmi_delay: None,
            ipmi_method: None,
            ipmi_monitor: None,
            ipmi_power_wait: 5,
            bonding_mode: None,
            modprobe_cfg: None,
            serial_speed: "115200".to_string(),
            serial_port: Some("ttyS0".to_string()),
            ring0: None,
            ring1: None,
            grub_args: None,
            rest_ext_nic: None,
            rest_int_nic: None,
            rest_primary_nic: None,
            rest_keepalived_nic: None,
            rest_cert_ca: None,
            rest_cert_crl: None,
            rest_cert_server: None,
            rest_cert_server_key: None,
        }
    }
}

impl HostCommon {
    /// The schema shared by host and host-defaults sections.
    pub fn schema() -> Schema {
        Schema::new()
            .strings(&COMMON_STRINGS)
            .space_lists(&COMMON_LISTS)
            .ints(&COMMON_INTS)
    }

    /// Overlay the values set in `loaded`.
    pub fn overlay(&mut self, loaded: &Loaded) -> Result<()> {
        loaded.set_list("nic_list", &mut self.nic_list);
        loaded.set_list("lnets", &mut self.lnets);
        loaded.set_list("host_sfa_list", &mut self.host_sfa_list);
        loaded.set_opt_string("stonith_pass", &mut self.stonith_pass);
        loaded.set_opt_string("stonith_user", &mut self.stonith_user);
        loaded.set_opt_string("stonith_type", &mut self.stonith_type);
        loaded.set_opt_unsigned("ipmi_delay", &mut self.ipmi_delay)?;
        loaded.set_opt_string("ipmi_method", &mut self.ipmi_method);
        loaded.set_opt_unsigned("ipmi_monitor", &mut self.ipmi_monitor)?;
        loaded.set_unsigned("ipmi_power_wait", &mut self.ipmi_power_wait)?;
        loaded.set_opt_string("bonding_mode", &mut self.bonding_mode);
        loaded.set_opt_string("modprobe_cfg", &mut self.modprobe_cfg);
        loaded.set_string("serial_speed", &mut self.serial_speed);
        loaded.set_opt_string("serial_port", &mut self.serial_port);
        loaded.set_opt_string("ring0", &mut self.ring0);
        loaded.set_opt_string("ring1", &mut self.ring1);
        loaded.set_opt_string("grub_args", &mut self.grub_args);
        loaded.set_opt_string("rest_ext_nic", &mut self.rest_ext_nic);
        loaded.set_opt_string("rest_int_nic", &mut self.rest_int_nic);
        loaded.set_opt_string("rest_primary_nic", &mut self.rest_primary_nic);
        loaded.set_opt_string("rest_keepalived_nic", &mut self.rest_keepalived_nic);
        loaded.set_opt_string("rest_cert_ca", &mut self.rest_cert_ca);
        loaded.set_opt_string("rest_cert_crl", &mut self.rest_cert_crl);
        loaded.set_opt_string("rest_cert_server", &mut self.rest_cert_server);
        loaded.set_opt_string("rest_cert_server_key", &mut self.rest_cert_server_key);
        Ok(())
    }

    /// Whether the stonith settings need an IPMI interface.
    pub fn is_ipmi_required(&self) -> bool {
        matches!(self.stonith_type.as_deref(), Some("ipmi") | Some("ipmi-slow"))
    }

    /// Declared NICs, plus the IPMI NIC when fencing needs it.
    pub fn candidate_nics(&self) -> Vec<String> {
        let mut nics = self.nic_list.clone();
        if self.is_ipmi_required() && !nics.iter().any(|nic| nic == IPMI_NIC) {
            nics.push(IPMI_NIC.to_string());
        }
        nics
    }
}

/// Default settings for one NIC.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct NicDefaults {
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
}

impl NicDefaults {
    /// Consume the `<nic>_<field>` options of `name` from `unknown`.
    fn from_unknown(name: &str, unknown: &mut Unknown) -> Self {
        let mut nic = NicDefaults::default();
        let mut take = |field: &str| unknown.consume(&format!("{name}_{field}"));

        nic.netmask = take("netmask");
        nic.gateway = take("gateway");
        if name != IPMI_NIC {
            nic.cfg = take("cfg").map(|cfg| cfg.trim().to_string());
            nic.device = Some(take("device").unwrap_or_else(|| name.to_string()));
            nic.slaves = take("slaves");
        }
        nic
    }
}

/// The `[host_defaults]` section.
///
/// Besides the settings every host inherits, this holds the per-NIC cursors used to hand out
/// IP addresses automatically (`<nic>_ip_base`). Cursors advance as hosts are resolved, so the
/// order in which hosts are processed decides which host gets which address.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct HostDefaults {
    #[serde(flatten)]
    pub common: HostCommon,
    pub nics: IndexMap<String, NicDefaults>,
    pub base_ip: IndexMap<String, Ipv4Addr>,
    /// Addresses set explicitly on some host; the cursors never hand these out.
    #[serde(skip)]
    reserved: BTreeSet<Ipv4Addr>,
}

impl HostDefaults {
    pub fn load(sources: &Sources, options: &ResolveOptions) -> Result<Self> {
        let mut loaded = HostCommon::schema().load(sources, SECTION)?;
        loaded.check_mandatory(options.strict)?;

        let mut defaults = HostDefaults::default();
        defaults.common.overlay(&loaded)?;

        for name in defaults.common.candidate_nics() {
            let nic = NicDefaults::from_unknown(&name, &mut loaded.unknown);
            defaults.nics.insert(name.clone(), nic);

            let setting = format!("{name}_ip_base");
            if let Some(base) = loaded.unknown.consume(&setting) {
                let base = base
                    .trim()
                    .parse::<Ipv4Addr>()
                    .map_err(|e| ConfigError::parse(SECTION, &setting, &base, e))?;
                defaults.base_ip.insert(name, base);
            }
        }

        Ok(defaults)
    }

    /// Keep `ip` out of automatic assignment.
    pub fn reserve(&mut self, ip: Ipv4Addr) {
        self.reserved.insert(ip);
    }

    pub fn has_base_ip(&self, nic: &str) -> bool {
        self.base_ip.contains_key(nic)
    }

    /// Hand out the next free address for `nic` to `host` and advance the cursor.
    ///
    /// The block is derived from the cursor and the NIC's default netmask. Addresses reserved
    /// with [`HostDefaults::reserve`] are skipped. The last address of the block is never
    /// handed out.
    pub fn next_ip(&mut self, nic: &str, host: &str) -> Result<Ipv4Addr> {
        let Some(cursor) = self.base_ip.get(nic).copied() else {
            return Err(ConfigError::network(host, nic, "no base IP is configured"));
        };
        let netmask = self
            .nics
            .get(nic)
            .and_then(|n| n.netmask.as_deref())
            .ok_or_else(|| {
                ConfigError::network(host, nic, "automatic IP assignment needs a default netmask")
            })?;
        let prefix = netmask_prefix(netmask).map_err(|e| ConfigError::network(host, nic, e))?;

        let inet = Ipv4Inet::new(cursor, prefix).map_err(|e| ConfigError::network(host, nic, e))?;
        let block = inet.network();
        let last = u32::from(block.last_address());

        let mut candidate = u32::from(cursor);
        while candidate < last && self.reserved.contains(&Ipv4Addr::from(candidate)) {
            candidate += 1;
        }
        if candidate >= last {
            return Err(ConfigError::AddressPoolExhausted {
                host: host.to_string(),
                nic: nic.to_string(),
                block: block.to_string(),
            });
        }

        let ip = Ipv4Addr::from(candidate);
        self.base_ip.insert(nic.to_string(), Ipv4Addr::from(candidate + 1));
        debug!("assigned {ip} to {host}/{nic}");
        Ok(ip)
    }
}

/// The number of bits set in a dotted-quad netmask.
pub fn netmask_prefix(netmask: &str) -> std::result::Result<u8, String> {
    let mask = netmask
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|e| format!("invalid netmask '{netmask}': {e}"))?;
    Ok(u32::from(mask).count_ones() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults_with_base(base: &str, netmask: &str) -> HostDefaults {
        let mut defaults = HostDefaults::default();
        defaults.nics.insert(
            "ib0".to_string(),
            NicDefaults {
                netmask: Some(netmask.to_string()),
                ..Default::default()
            },
        );
        defaults
            .base_ip
            .insert("ib0".to_string(), base.parse().unwrap());
        defaults
    }

    #[test]
    fn cursor_advances() {
        let mut defaults = defaults_with_base("10.0.0.10", "255.255.255.0");
        assert_eq!(defaults.next_ip("ib0", "a").unwrap(), Ipv4Addr::new(10, 0, 0, 10));
        assert_eq!(defaults.next_ip("ib0", "b").unwrap(), Ipv4Addr::new(10, 0, 0, 11));
        assert_eq!(defaults.base_ip["ib0"], Ipv4Addr::new(10, 0, 0, 12));
    }

    #[test]
    fn reserved_addresses_are_skipped() {
        let mut defaults = defaults_with_base("10.0.0.10", "255.255.255.0");
        defaults.reserve(Ipv4Addr::new(10, 0, 0, 10));
        defaults.reserve(Ipv4Addr::new(10, 0, 0, 11));
        assert_eq!(defaults.next_ip("ib0", "a").unwrap(), Ipv4Addr::new(10, 0, 0, 12));
    }

    #[test]
    fn exhaustion_is_an_error() {
        let mut defaults = defaults_with_base("10.0.0.253", "255.255.255.0");
        assert!(defaults.next_ip("ib0", "a").is_ok());
        assert!(defaults.next_ip("ib0", "b").is_ok());
        assert!(matches!(
            defaults.next_ip("ib0", "c"),
            Err(ConfigError::AddressPoolExhausted { ref host, ref block, .. })
                if host == "c" && block == "10.0.0.0/24"
        ));
    }

    #[test]
    fn prefix_counts_bits() {
        assert_eq!(netmask_prefix("255.255.240.0"), Ok(20));
        assert!(netmask_prefix("255.255.0").is_err());
    }
}
