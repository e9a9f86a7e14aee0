// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use exaconf_lib::{test_env::*, ClusterConfig};

    fn basic() -> ClusterConfig {
        TestEnvironment::new("basic").cluster()
    }

    fn ip(cluster: &ClusterConfig, host: &str, nic: &str) -> Option<String> {
        cluster.host(host).unwrap().nics[nic].ip.clone()
    }

    #[test]
    fn host_list_follows_sections() {
        let cluster = basic();
        assert_eq!(
            cluster.global().host_list,
            vec!["mgmt0", "mds0", "mds1", "oss0", "oss1", "oss2", "oss3"]
        );
        let resolved: Vec<&str> = cluster.hosts().map(|h| h.name.as_str()).collect();
        assert_eq!(
            resolved,
            vec!["mgmt0", "mds0", "mds1", "oss0", "oss1", "oss2", "oss3", "cli1", "cli2"]
        );
    }

    #[test]
    fn mgs_filesystem_first() {
        let cluster = basic();
        assert_eq!(cluster.global().fs_list, vec!["testfs", "scratch"]);
        assert_eq!(cluster.global().mgs_fs.as_deref(), Some("testfs"));
        assert_eq!(cluster.global().used_backfs_types, vec!["ldiskfs"]);
        assert_eq!(
            cluster.filesystem("testfs").unwrap().mgs_list,
            vec!["mds0", "mds1"]
        );
        assert_eq!(
            cluster.filesystem("scratch").unwrap().log_dir,
            "/var/log/lustre/scratch"
        );
    }

    #[test]
    fn automatic_ips_skip_explicit_ones() {
        let cluster = basic();
        assert_eq!(ip(&cluster, "mgmt0", "ib0").as_deref(), Some("10.10.0.10"));
        assert_eq!(ip(&cluster, "mds1", "ib0").as_deref(), Some("10.10.0.12"));
        // oss1 claims .13 itself, so oss0 moves on to .14.
        assert_eq!(ip(&cluster, "oss0", "ib0").as_deref(), Some("10.10.0.14"));
        assert_eq!(ip(&cluster, "oss1", "ib0").as_deref(), Some("10.10.0.13"));
        assert_eq!(ip(&cluster, "oss2", "ib0").as_deref(), Some("10.10.0.15"));
        assert_eq!(ip(&cluster, "cli2", "ib0").as_deref(), Some("10.10.0.18"));
        assert_eq!(ip(&cluster, "oss3", "eth0").as_deref(), Some("192.168.1.16"));

        let oss0 = cluster.host("oss0").unwrap();
        assert_eq!(oss0.nics["ib0"].netaddr.as_deref(), Some("10.10.0.0"));
        assert_eq!(oss0.nics["ib0"].device.as_deref(), Some("ib0"));
        assert_eq!(oss0.lnet_nics, vec!["ib0"]);
    }

    #[test]
    fn ipmi_nic_and_stonith_defaults() {
        let cluster = basic();
        let mds0 = cluster.host("mds0").unwrap();
        assert!(mds0.nics.contains_key("ipmi"));
        assert_eq!(mds0.nics["ipmi"].ip.as_deref(), Some("192.168.2.11"));
        assert_eq!(mds0.nics["ipmi"].netaddr, None);
        assert_eq!(mds0.nics["ipmi"].device, None);
        assert_eq!(mds0.common.stonith_user.as_deref(), Some("root"));
        assert_eq!(mds0.common.stonith_pass.as_deref(), Some("calvin"));
        assert_eq!(mds0.common.ipmi_delay, Some(15));
    }

    #[test]
    fn ost_and_mdt_allocation() {
        let cluster = basic();
        let testfs = cluster.filesystem("testfs").unwrap();
        assert_eq!(testfs.get_ost_list("oss0"), [0, 1, 2, 3]);
        assert_eq!(testfs.get_ost_list("oss1"), [4, 5, 6, 7]);
        assert_eq!(testfs.get_mdt_list("mds0"), [0]);
        assert!(testfs.get_mdt_list("mds1").is_empty());
        assert_eq!(testfs.total_ost_count, Some(8));
        assert_eq!(testfs.total_mdt_count, Some(1));

        let scratch = cluster.filesystem("scratch").unwrap();
        assert_eq!(scratch.get_ost_list("oss3"), [2, 3]);
        assert_eq!(scratch.get_mdt_list("mds1"), [0]);

        let mds1 = cluster.host("mds1").unwrap();
        assert_eq!(mds1.fs_list, vec!["testfs", "scratch"]);
        assert_eq!(mds1.mdt_list["scratch"], vec![0]);
        assert_eq!(mds1.ost_device_paths["testfs"], "/dev/mapper");
    }

    #[test]
    fn pools_sfa_and_sysctl() {
        let cluster = basic();
        assert_eq!(
            cluster.pool("flash").unwrap().ost_list,
            vec!["testfs-OST0000", "testfs-OST0001"]
        );

        let sfa = cluster.sfa("sfa0").unwrap();
        assert_eq!(sfa.controllers, vec!["172.16.0.1", "172.16.0.2"]);
        assert_eq!(sfa.password, "user");

        let oss0 = cluster.host("oss0").unwrap().sysctl.clone().unwrap();
        assert_eq!(oss0["vm.min_free_kbytes"], "1048576");
        assert_eq!(oss0["kernel.panic"], "10");
        let mds0 = cluster.host("mds0").unwrap().sysctl.clone().unwrap();
        assert!(!mds0.contains_key("kernel.panic"));
        assert!(cluster.host("cli1").unwrap().sysctl.is_none());

        assert_eq!(
            cluster.global().email_list,
            vec!["ops@example.com", "storage@example.com"]
        );
    }

    #[test]
    fn shadow_overrides_primary() {
        let cluster = TestEnvironment::new("basic").with_shadow().cluster();

        let testfs = cluster.filesystem("testfs").unwrap();
        assert_eq!(testfs.default_ost_count, Some(2));
        assert_eq!(testfs.get_ost_list("oss1"), [2, 3]);

        assert_eq!(ip(&cluster, "mds0", "ipmi").as_deref(), Some("192.168.2.99"));
        assert_eq!(ip(&cluster, "mds1", "ipmi").as_deref(), Some("192.168.2.11"));
    }

    #[test]
    fn resolution_is_idempotent() {
        let first = basic();
        let second = basic();
        assert_eq!(first, second);
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }

    #[test]
    fn output_tree() {
        let json: serde_json::Value = serde_json::from_str(&basic().to_json().unwrap()).unwrap();
        for key in [
            "global_settings",
            "host_defaults_settings",
            "hsm_settings",
            "fs_settings",
            "pool_settings",
            "emf_settings",
            "ha_settings",
            "hosts_settings",
            "sfa_settings",
            "rest_settings",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json.get("zpool_settings").is_none());

        let oss1 = &json["hosts_settings"]["oss1"];
        assert_eq!(oss1["stonith_type"], "ipmi");
        assert_eq!(oss1["ost_list"]["testfs"], serde_json::json!([4, 5, 6, 7]));
        assert!(oss1.get("unknown").is_none());
        assert_eq!(json["fs_settings"]["testfs"]["ost_device_path"], "/dev/mapper");
        assert!(json["fs_settings"]["testfs"].get("ost_zpools").is_none());
    }

    #[test]
    fn zfs_filesystem_loads_zpools() {
        let cluster = TestEnvironment::new("zfs").cluster();
        let zpool = cluster.zpool("ost0").unwrap();
        assert_eq!(zpool.vdevs, vec!["raidz2", "d4", "d5", "d6", "d7", "d8", "d9"]);
        assert_eq!(zpool.opts, "-o cachefile=none");
        assert_eq!(cluster.zpool("mgt").unwrap().vdev_base_path, "/dev/disk/by-vdev/");
        assert_eq!(cluster.global().used_backfs_types, vec!["zfs"]);

        let oss0 = cluster.host("oss0").unwrap();
        assert_eq!(oss0.common.stonith_user.as_deref(), Some("Administrator"));
        assert_eq!(oss0.nics["ib0"].netaddr.as_deref(), Some("10.20.0.0"));
        assert!(oss0.ost_device_paths.is_empty());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = TestEnvironment::new("does-not-exist").resolve().unwrap_err();
        assert!(matches!(err, exaconf_lib::ConfigError::Io { .. }));
    }
}
