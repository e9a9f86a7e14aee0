// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use serde::Serialize;

use crate::{cluster::ResolveOptions, error::Result, section::Schema, source::Sources};

pub const SECTION: &str = "HSM";

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct HsmSettings {
    #[serde(rename = "db_hosts")]
    pub db_host_names: Vec<String>,
    pub redis_vip: Option<String>,
    pub db_vip: Option<String>,
    pub lustre_mount_device: Option<String>,
    pub lustre_mount_directory: Option<String>,
    pub wos_address: Option<String>,
    pub wos_listen_address: Option<String>,
    pub broker_count: Option<u64>,
    pub replication_user: Option<String>,
    pub replication_passwd: Option<String>,
}

impl HsmSettings {
    pub fn load(sources: &Sources, options: &ResolveOptions) -> Result<Self> {
        let loaded = Schema::new()
            .ints(&["broker_count"])
            .strings(&[
                "redis_vip",
                "db_vip",
                "lustre_mount_device",
                "lustre_mount_directory",
                "wos_address",
                "wos_listen_address",
                "replication_user",
                "replication_passwd",
            ])
            .space_lists(&["db_host_names"])
            .mandatory(&[
                "redis_vip",
                "db_vip",
                "lustre_mount_device",
                "lustre_mount_directory",
                "wos_address",
                "wos_listen_address",
                "db_host_names",
                "broker_count",
                "replication_user",
                "replication_passwd",
            ])
            .load(sources, SECTION)?;
        loaded.check_mandatory(options.strict)?;

        Ok(HsmSettings {
            db_host_names: loaded.list("db_host_names").unwrap_or_default(),
            redis_vip: loaded.string("redis_vip"),
            db_vip: loaded.string("db_vip"),
            lustre_mount_device: loaded.string("lustre_mount_device"),
            lustre_mount_directory: loaded.string("lustre_mount_directory"),
            wos_address: loaded.string("wos_address"),
            wos_listen_address: loaded.string("wos_listen_address"),
            broker_count: loaded.unsigned("broker_count")?,
            replication_user: loaded.string("replication_user"),
            replication_passwd: loaded.string("replication_passwd"),
        })
    }
}
