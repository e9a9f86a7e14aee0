// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    cluster::ResolveOptions, error::Result, host::Host, section::Schema, source::Sources,
};

pub const SECTION: &str = "rest";

/// REST API virtual addresses and keepalived settings.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct RestSettings {
    pub master_nodes: Vec<String>,
    pub ext_vip: Option<String>,
    pub ext_mask: Option<String>,
    pub int_vip: Option<String>,
    pub int_mask: Option<String>,
    pub ka_vr_id: Option<String>,
    pub ext_vip_fqdn: Option<String>,
    pub auth_ou: Option<String>,
}

impl RestSettings {
    pub fn load(sources: &Sources, options: &ResolveOptions) -> Result<Self> {
        let loaded = Schema::new()
            .space_lists(&["master_nodes"])
            .strings(&[
                "ext_vip",
                "ext_mask",
                "int_vip",
                "int_mask",
                "ka_vr_id",
                "ext_vip_fqdn",
                "auth_ou",
            ])
            .mandatory(&["master_nodes", "ext_vip", "ext_mask", "int_vip", "int_mask", "ka_vr_id"])
            .load(sources, SECTION)?;
        loaded.check_mandatory(options.strict)?;

        Ok(RestSettings {
            master_nodes: loaded.list("master_nodes").unwrap_or_default(),
            ext_vip: loaded.string("ext_vip"),
            ext_mask: loaded.string("ext_mask"),
            int_vip: loaded.string("int_vip"),
            int_mask: loaded.string("int_mask"),
            ka_vr_id: loaded.string("ka_vr_id"),
            ext_vip_fqdn: loaded.string("ext_vip_fqdn"),
            auth_ou: loaded.string("auth_ou"),
        })
    }

    /// Hosts of `host_list` without a keepalived NIC use their primary REST NIC.
    pub fn apply_keepalived_defaults(hosts: &mut IndexMap<String, Host>, host_list: &[String]) {
        for name in host_list {
            if let Some(host) = hosts.get_mut(name) {
                if host.common.rest_keepalived_nic.is_none() {
                    host.common.rest_keepalived_nic = host.common.rest_primary_nic.clone();
                }
            }
        }
    }
}
