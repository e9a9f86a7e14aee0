// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{net::Ipv4Addr, path::Path};

use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::{
    config::ClusterConfig,
    error::{ConfigError, Result},
    extra::load_extra,
    fs::Filesystem,
    global::GlobalSettings,
    ha::{self, HaSettings},
    host::{self, Host},
    host_defaults::{self, HostDefaults},
    pool::{Pool, Zpool},
    source::{RawConfig, Sources},
    subsystems::{emf, hsm, rest, EmfSettings, HsmSettings, RestSettings, SfaSettings},
};

/// Knobs for a resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Treat missing mandatory fields as errors instead of warnings.
    pub strict: bool,
}

/// Resolver turns a raw configuration, and an optional shadow configuration layered over it,
/// into a [`ClusterConfig`].
///
/// Resolution runs in a fixed order of phases. Later phases depend on state earlier phases
/// leave behind: hosts draw automatic addresses from the host defaults, filesystems draw
/// target indices while walking their hosts, and HA groups read the resolved addresses.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    sources: Sources<'a>,
    options: ResolveOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(
        primary: &'a RawConfig,
        shadow: Option<&'a RawConfig>,
        options: ResolveOptions,
    ) -> Self {
        Resolver {
            sources: Sources::new(primary, shadow),
            options,
        }
    }

    pub fn resolve(&self) -> Result<ClusterConfig> {
        let sources = &self.sources;
        let options = &self.options;

        let mut global = GlobalSettings::load(sources, options)?;

        let mut host_defaults = if sources.has_section(host_defaults::SECTION) {
            Some(HostDefaults::load(sources, options)?)
        } else {
            None
        };

        let hsm = if global.hsm_active || sources.has_section(hsm::SECTION) {
            Some(HsmSettings::load(sources, options)?)
        } else {
            None
        };

        let (mut fs_settings, pool_settings) = self.resolve_filesystems(&mut global)?;
        let zpool_settings = self.resolve_zpools(&global, &fs_settings)?;

        global.order_hosts_by_sections(&sources.host_section_names());
        global.finalize_host_list();

        let mut hosts = self.resolve_hosts(&global, host_defaults.as_mut())?;

        for name in global.fs_list.iter() {
            if let Some(fs) = fs_settings.get_mut(name) {
                fs.associate_hosts(&mut hosts)?;
            }
        }

        let ha = if sources.has_section(ha::SECTION) {
            let ha = HaSettings::load(sources, &global.host_list, options)?;
            ha.assign_groups(&mut hosts, &global.host_list)?;
            Some(ha)
        } else {
            None
        };

        let emf = if sources.has_section(emf::SECTION) {
            Some(EmfSettings::load(sources, options)?)
        } else {
            None
        };

        let mut sfa_settings = IndexMap::new();
        for name in global.sfa_list.iter() {
            let sfa = SfaSettings::load(sources, name, &global.password_policy, options)?;
            sfa_settings.insert(name.clone(), sfa);
        }

        let rest = if sources.has_section(rest::SECTION) {
            let rest = RestSettings::load(sources, options)?;
            RestSettings::apply_keepalived_defaults(&mut hosts, &global.host_list);
            Some(rest)
        } else {
            None
        };

        info!(
            "resolved {} filesystems and {} hosts",
            fs_settings.len(),
            hosts.len()
        );

        Ok(ClusterConfig {
            global_settings: global,
            host_defaults_settings: host_defaults,
            hsm_settings: hsm,
            fs_settings,
            pool_settings,
            zpool_settings,
            emf_settings: emf,
            ha_settings: ha,
            hosts_settings: hosts,
            sfa_settings,
            rest_settings: rest,
        })
    }

    /// Load every filesystem of the global list with its pools, collect their hosts and move
    /// the filesystem hosting the MGS to the front.
    fn resolve_filesystems(
        &self,
        global: &mut GlobalSettings,
    ) -> Result<(IndexMap<String, Filesystem>, IndexMap<String, Pool>)> {
        let mut fs_settings = IndexMap::new();
        let mut pool_settings = IndexMap::new();
        let mut mgs_fs: Option<String> = None;

        for name in global.fs_list.clone() {
            let fs = Filesystem::load(&self.sources, &name, &global.log_dir, &self.options)?;
            global.add_hosts(&fs.host_list);

            if fs.mgs_internal {
                if let Some(first) = mgs_fs.take() {
                    return Err(ConfigError::MultipleMgsFilesystems {
                        first,
                        second: name,
                    });
                }
                mgs_fs = Some(name.clone());
            }

            for pool in fs.pools.iter() {
                if !pool_settings.contains_key(pool) {
                    let loaded = Pool::load(&self.sources, pool, &self.options)?;
                    pool_settings.insert(pool.clone(), loaded);
                }
            }

            let backfs = fs.backfs.as_str().to_string();
            if !global.used_backfs_types.contains(&backfs) {
                global.used_backfs_types.push(backfs);
            }
            fs_settings.insert(name, fs);
        }

        match mgs_fs {
            Some(mgs_fs) => global.put_mgs_fs_first(&mgs_fs),
            None => warn!("no filesystem sets mgs_internal; the MGS is expected to be external"),
        }

        Ok((fs_settings, pool_settings))
    }

    /// Load the zpools of zfs backed filesystems. None when no filesystem uses zfs.
    fn resolve_zpools(
        &self,
        global: &GlobalSettings,
        fs_settings: &IndexMap<String, Filesystem>,
    ) -> Result<Option<IndexMap<String, Zpool>>> {
        let mut zpools = IndexMap::new();
        for fs in global.fs_list.iter().filter_map(|name| fs_settings.get(name)) {
            for name in fs.zpools() {
                if !zpools.contains_key(&name) {
                    let zpool = Zpool::load(&self.sources, &name, &self.options)?;
                    zpools.insert(name, zpool);
                }
            }
        }
        Ok(if zpools.is_empty() { None } else { Some(zpools) })
    }

    /// Load and resolve servers in host list order, then clients, followed by their sysctl
    /// settings.
    fn resolve_hosts(
        &self,
        global: &GlobalSettings,
        mut defaults: Option<&mut HostDefaults>,
    ) -> Result<IndexMap<String, Host>> {
        let names: Vec<&String> = global
            .host_list
            .iter()
            .chain(global.clients_list.iter().filter(|c| !global.host_list.contains(c)))
            .collect();

        if let Some(defaults) = defaults.as_deref_mut() {
            for name in names.iter() {
                self.reserve_explicit_ips(name, defaults);
            }
        }

        let plain_text = global.is_plain_text_policy();
        let mut hosts = IndexMap::new();
        for name in names {
            let mut host = Host::load(&self.sources, name, defaults.as_deref(), plain_text)?;
            host.check_mandatory(self.options.strict)?;
            host.resolve_network(defaults.as_deref_mut())?;
            hosts.insert(name.clone(), host);
        }

        let sysctl_defaults = if self.sources.has_section("sysctl_defaults") {
            Some(load_extra(&self.sources, "sysctl_defaults", None)?)
        } else {
            None
        };
        for name in global.host_list.iter() {
            let section = format!("sysctl {name}");
            let sysctl = if self.sources.has_section(&section) {
                Some(load_extra(&self.sources, &section, sysctl_defaults.as_ref())?)
            } else {
                sysctl_defaults.clone()
            };
            if let Some(host) = hosts.get_mut(name) {
                host.sysctl = sysctl;
            }
        }

        Ok(hosts)
    }

    /// Keep addresses a host sets explicitly (`<nic>_ip`) out of automatic assignment.
    fn reserve_explicit_ips(&self, name: &str, defaults: &mut HostDefaults) {
        for (key, value) in self.sources.options(&host::section_name(name)) {
            if !key.ends_with("_ip") {
                continue;
            }
            if let Ok(ip) = value.trim().parse::<Ipv4Addr>() {
                debug!("reserving {ip} set explicitly by host '{name}'");
                defaults.reserve(ip);
            }
        }
    }
}

/// Read the configuration at `path`, and the shadow configuration at `shadow` if given, and
/// resolve them.
pub fn resolve_files<P: AsRef<Path>>(
    path: P,
    shadow: Option<P>,
    options: ResolveOptions,
) -> Result<ClusterConfig> {
    let primary = RawConfig::load(path)?;
    let shadow = shadow.map(RawConfig::load).transpose()?;
    Resolver::new(&primary, shadow.as_ref(), options).resolve()
}
