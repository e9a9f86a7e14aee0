// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;

use crate::{
    cluster::ResolveOptions, error::Result, extra::load_extra, section::Schema, source::Sources,
};

pub const SECTION: &str = "global";

/// Password policy under which default credentials are exported in clear text.
pub const PLAIN_TEXT_POLICY: &str = "plain-text";

/// Cluster wide settings from the `[global]` section, along with the canonical filesystem and
/// host orderings that the rest of the resolution follows.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GlobalSettings {
    pub s2a_user: String,
    pub s2a_pass: String,
    pub email_domain: Option<String>,
    pub email_relay: Option<String>,
    pub log_dir: String,
    pub mdt_backup: String,
    pub mdt_backup_dir: String,
    pub kdump_path: String,
    pub fs_list: Vec<String>,
    pub used_backfs_types: Vec<String>,
    pub extra_hosts_start: Vec<String>,
    pub extra_hosts_end: Vec<String>,
    pub s2a_list: Vec<String>,
    pub sfa_list: Vec<String>,
    pub vg_activation_list: Vec<String>,
    pub clients_list: Vec<String>,
    pub email_list: Vec<String>,
    pub ntp_list: Vec<String>,
    pub timezone: Option<String>,
    /// Changes pacemaker behavior for hosts with several LNets.
    pub lnet_mr_fault_sensitive: bool,
    pub pingd: bool,
    pub hsm_active: bool,
    pub shadow_conf: bool,
    pub host_list: Vec<String>,
    pub mgs_fs: Option<String>,
    pub cluster_name: Option<String>,
    pub password_policy: String,
    pub set_param_tunings: Option<IndexMap<String, String>>,
    pub conf_param_tunings: Option<IndexMap<String, String>>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        GlobalSettings {
            s2a_user: "admin".to_string(),
            s2a_pass: "password".to_string(),
            email_domain: None,
            email_relay: None,
            log_dir: "/scratch/log".to_string(),
            mdt_backup: "none".to_string(),
            mdt_backup_dir: "/scratch".to_string(),
            kdump_path: "/scratch/crash".to_string(),
            fs_list: Vec::new(),
            used_backfs_types: Vec::new(),
            extra_hosts_start: Vec::new(),
            extra_hosts_end: Vec::new(),
            s2a_list: Vec::new(),
            sfa_list: Vec::new(),
            vg_activation_list: vec!["auto".to_string()],
            clients_list: Vec::new(),
            email_list: Vec::new(),
            ntp_list: Vec::new(),
            timezone: None,
            lnet_mr_fault_sensitive: false,
            pingd: true,
            hsm_active: false,
            shadow_conf: false,
            host_list: Vec::new(),
            mgs_fs: None,
            cluster_name: None,
            password_policy: PLAIN_TEXT_POLICY.to_string(),
            set_param_tunings: None,
            conf_param_tunings: None,
        }
    }
}

impl GlobalSettings {
    pub fn schema() -> Schema {
        Schema::new()
            .strings(&[
                "s2a_user",
                "s2a_pass",
                "email_domain",
                "email_relay",
                "log_dir",
                "mdt_backup",
                "mdt_backup_dir",
                "kdump_path",
                "cluster_name",
                "timezone",
                "password_policy",
            ])
            .space_lists(&["fs_list", "s2a_list", "sfa_list", "vg_activation_list", "ntp_list"])
            .bools(&["pingd", "hsm_active", "shadow_conf", "lnet_mr_fault_sensitive"])
            .node_lists(&["extra_hosts_start", "extra_hosts_end", "clients_list"])
            .comma_lists(&["email_list"])
            .mandatory(&["fs_list"])
    }

    pub fn load(sources: &Sources, options: &ResolveOptions) -> Result<Self> {
        let loaded = Self::schema().load(sources, SECTION)?;
        loaded.check_mandatory(options.strict)?;

        let mut global = GlobalSettings::default();
        loaded.set_string("s2a_user", &mut global.s2a_user);
        loaded.set_string("s2a_pass", &mut global.s2a_pass);
        loaded.set_opt_string("email_domain", &mut global.email_domain);
        loaded.set_opt_string("email_relay", &mut global.email_relay);
        loaded.set_string("log_dir", &mut global.log_dir);
        loaded.set_string("mdt_backup", &mut global.mdt_backup);
        loaded.set_string("mdt_backup_dir", &mut global.mdt_backup_dir);
        loaded.set_string("kdump_path", &mut global.kdump_path);
        loaded.set_opt_string("cluster_name", &mut global.cluster_name);
        loaded.set_opt_string("timezone", &mut global.timezone);
        loaded.set_string("password_policy", &mut global.password_policy);
        loaded.set_list("fs_list", &mut global.fs_list);
        loaded.set_list("s2a_list", &mut global.s2a_list);
        loaded.set_list("sfa_list", &mut global.sfa_list);
        loaded.set_list("vg_activation_list", &mut global.vg_activation_list);
        loaded.set_list("ntp_list", &mut global.ntp_list);
        loaded.set_bool("pingd", &mut global.pingd);
        loaded.set_bool("hsm_active", &mut global.hsm_active);
        loaded.set_bool("shadow_conf", &mut global.shadow_conf);
        loaded.set_bool("lnet_mr_fault_sensitive", &mut global.lnet_mr_fault_sensitive);
        loaded.set_list("extra_hosts_start", &mut global.extra_hosts_start);
        loaded.set_list("extra_hosts_end", &mut global.extra_hosts_end);
        loaded.set_list("clients_list", &mut global.clients_list);
        loaded.set_list("email_list", &mut global.email_list);

        let mut seen = Vec::new();
        global.fs_list.retain(|fs| {
            if seen.contains(fs) {
                warn!("filesystem '{fs}' is listed more than once in fs_list");
                return false;
            }
            seen.push(fs.clone());
            true
        });

        let extra_start = global.extra_hosts_start.clone();
        global.add_hosts(&extra_start);

        if sources.has_section("set_param_tunings") {
            global.set_param_tunings = Some(load_extra(sources, "set_param_tunings", None)?);
        }
        if sources.has_section("conf_param_tunings") {
            global.conf_param_tunings = Some(load_extra(sources, "conf_param_tunings", None)?);
        }

        Ok(global)
    }

    /// Append hosts that are not yet part of the host list.
    pub fn add_hosts(&mut self, hosts: &[String]) {
        for host in hosts {
            if !self.host_list.contains(host) {
                self.host_list.push(host.clone());
            }
        }
    }

    /// Reorder the host list to follow the order of the `[host <name>]` sections.
    ///
    /// Automatic IP assignment hands out addresses in host list order, so the order in which
    /// the administrator wrote the host sections is what decides who gets which address. Hosts
    /// without a section of their own keep their relative order behind the others.
    pub fn order_hosts_by_sections(&mut self, section_order: &[String]) {
        let (mut ordered, unsectioned): (Vec<String>, Vec<String>) = self
            .host_list
            .drain(..)
            .partition(|host| section_order.contains(host));
        ordered.sort_by_key(|host| section_order.iter().position(|s| s == host));

        for host in unsectioned.iter() {
            warn!("host '{host}' has no [host {host}] section; using host defaults only");
        }
        ordered.extend(unsectioned);
        self.host_list = ordered;
    }

    /// Add the extra hosts that belong at the end of the host list. Run this once the host list
    /// has been populated from the filesystems.
    pub fn finalize_host_list(&mut self) {
        let extra_end = self.extra_hosts_end.clone();
        self.add_hosts(&extra_end);
        debug!("final host list: {:?}", self.host_list);
    }

    /// Move the filesystem hosting the MGS to the front of the filesystem list.
    pub fn put_mgs_fs_first(&mut self, mgs_fs: &str) {
        if let Some(pos) = self.fs_list.iter().position(|fs| fs == mgs_fs) {
            let fs = self.fs_list.remove(pos);
            self.fs_list.insert(0, fs);
        }
        self.mgs_fs = Some(mgs_fs.to_string());
    }

    pub fn is_plain_text_policy(&self) -> bool {
        self.password_policy == PLAIN_TEXT_POLICY
    }
}
