// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use exaconf_lib::{test_env::*, ConfigError, ResolveOptions};
    use indoc::indoc;

    fn members(ips: &[&[&str]]) -> Vec<Vec<String>> {
        ips.iter()
            .map(|group| group.iter().map(|ip| ip.to_string()).collect())
            .collect()
    }

    #[test]
    fn groups_follow_ha_section() {
        let cluster = TestEnvironment::new("basic").cluster();
        let ha = cluster.ha().unwrap();
        assert_eq!(ha.ha_group_count, Some(3));
        assert_eq!(ha.ha_groups[1], vec!["oss0", "oss1"]);
        assert_eq!(ha.mcastport, 5405);
        assert_eq!(ha.kind, "corosync");

        let oss3 = cluster.host("oss3").unwrap();
        assert_eq!(oss3.ha_group_idx, Some(2));
        assert_eq!(cluster.ha_group_of("oss3"), ["oss2", "oss3"]);
        assert!(cluster.ha_group_of("mgmt0").is_empty());
        assert!(cluster.ha_group_of("cli1").is_empty());
    }

    #[test]
    fn lnet_members_list_peer_addresses() {
        let cluster = TestEnvironment::new("basic").cluster();

        let oss0 = cluster.host("oss0").unwrap();
        assert_eq!(oss0.lnet_members.len(), 1);
        assert_eq!(
            oss0.lnet_members["o2ib"],
            members(&[&["10.10.0.14"], &["10.10.0.13"]])
        );
        assert_eq!(oss0.nids().unwrap(), vec!["10.10.0.14@o2ib"]);

        let mds1 = cluster.host("mds1").unwrap();
        assert_eq!(
            mds1.lnet_members["o2ib"],
            members(&[&["10.10.0.11"], &["10.10.0.12"]])
        );

        let mgmt0 = cluster.host("mgmt0").unwrap();
        assert_eq!(mgmt0.ha_group_idx, None);
        assert!(mgmt0.lnet_members.is_empty());
    }

    #[test]
    fn single_group_without_count() {
        let cluster = resolve_str(
            indoc! {"
                [global]
                fs_list = fs0

                [host_defaults]
                nic_list = ib0
                lnets = o2ib(ib0) tcp(eth0)
                ib0_ip_base = 10.0.0.1
                ib0_netmask = 255.255.255.0

                [fs fs0]
                mgs_internal = yes
                mds_list = n0
                oss_list = n1
                default_ost_count = 1

                [HA]
                transport = udpu
            "},
            None,
        );
        // eth0 is used by lnets but never declared.
        assert!(matches!(cluster, Err(ConfigError::NetworkConfig { .. })));

        let cluster = resolve_str(
            indoc! {"
                [global]
                fs_list = fs0

                [host_defaults]
                nic_list = ib0 ib1
                lnets = o2ib(ib0,ib1)
                ib0_ip_base = 10.0.0.1
                ib0_netmask = 255.255.255.0
                ib1_ip_base = 10.0.1.1
                ib1_netmask = 255.255.255.0

                [fs fs0]
                mgs_internal = yes
                mds_list = n0
                oss_list = n1
                default_ost_count = 1

                [HA]
                transport = udpu
            "},
            None,
        )
        .unwrap();

        let ha = cluster.ha().unwrap();
        assert_eq!(ha.transport, "udpu");
        assert_eq!(ha.ha_groups, vec![vec!["n0", "n1"]]);
        assert_eq!(
            cluster.host("n1").unwrap().lnet_members["o2ib"],
            members(&[&["10.0.0.1", "10.0.1.1"], &["10.0.0.2", "10.0.1.2"]])
        );
    }

    #[test]
    fn unknown_group_member() {
        let config = indoc! {"
            [global]
            fs_list = fs0

            [fs fs0]
            mgs_internal = yes
            mds_list = n0
            oss_list = n1
            default_ost_count = 1

            [HA]
            ha_group_count = 1
            ha_group0 = n[0-2]
        "};
        assert_eq!(
            resolve_str(config, None),
            Err(ConfigError::UnknownHost {
                host: "n2".to_string(),
                referrer: "[HA] ha_group0".to_string(),
            })
        );
    }

    #[test]
    fn missing_group_is_strict_only() {
        let config = indoc! {"
            [global]
            fs_list = fs0

            [host_defaults]
            nic_list = ib0
            lnets = ib0
            stonith_type = none

            [fs fs0]
            mgs_internal = yes
            mds_list = n0
            oss_list = n1
            default_ost_count = 1

            [HA]
            ha_group_count = 2
            ha_group0 = n[0-1]
        "};

        let cluster = resolve_str(config, None).unwrap();
        let ha = cluster.ha().unwrap();
        assert_eq!(ha.ha_groups.len(), 2);
        assert!(ha.ha_groups[1].is_empty());

        let strict = ResolveOptions { strict: true };
        assert_eq!(
            resolve_str_with(config, None, strict),
            Err(ConfigError::MandatoryFieldMissing {
                section: "HA".to_string(),
                field: "ha_group1".to_string(),
            })
        );
    }

    #[test]
    fn no_ha_section() {
        let cluster = TestEnvironment::new("zfs").cluster();
        assert!(cluster.ha().is_none());
        assert!(cluster.hosts().all(|h| h.ha_group.is_none()));
    }
}
