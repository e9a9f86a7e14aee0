// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Args;

use crate::{
    commands::{load_cluster, Cli, Handle, HandledResult},
    host::Host,
};

#[derive(Args, Debug, Clone)]
pub struct HostsArgs {
    /// Only list hosts serving this filesystem.
    #[arg(long)]
    fs: Option<String>,
}

pub fn hosts(cli: &Cli, args: &HostsArgs) -> HandledResult<()> {
    let cluster = load_cluster(cli)?;

    for host in cluster.hosts() {
        if let Some(fs) = &args.fs {
            if !host.fs_list.contains(fs) {
                continue;
            }
        }
        print_host(host).handle_err(|e| eprintln!("Could not describe host {}: {e}", host.name))?;
    }

    Ok(())
}

fn print_host(host: &Host) -> crate::error::Result<()> {
    let group = match host.ha_group_idx {
        Some(idx) => format!("ha_group{idx}"),
        None => "-".to_string(),
    };
    println!("{} [{group}] {}", host.name, host.nids()?.join(" "));

    for fs in host.fs_list.iter() {
        let osts = host.ost_list.get(fs).map(Vec::as_slice).unwrap_or_default();
        let mdts = host.mdt_list.get(fs).map(Vec::as_slice).unwrap_or_default();
        println!("    {fs}: mdts {mdts:?} osts {osts:?}");
    }

    Ok(())
}
