// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use exaconf_lib::{test_env::*, ConfigError};
    use indoc::{formatdoc, indoc};

    /// A two host filesystem, with `host_defaults` and any extra sections appended.
    fn cluster_with(host_defaults: &str, extra: &str) -> String {
        formatdoc! {"
            [global]
            fs_list = fs0

            [host_defaults]
            stonith_type = none
            {host_defaults}

            [fs fs0]
            mgs_internal = yes
            mds_list = n0
            oss_list = n1
            default_ost_count = 1

            {extra}
        "}
    }

    #[test]
    fn bonding_slaves_get_no_address() {
        let config = cluster_with(
            indoc! {"
                nic_list = bond0 eth1 eth2
                lnets = tcp(bond0)
                bond0_slaves = eth1 eth2
                bond0_ip_base = 10.1.0.10
                bond0_netmask = 255.255.255.0
                eth1_ip_base = 10.2.0.10
                eth1_netmask = 255.255.255.0
            "},
            "",
        );
        let cluster = resolve_str(&config, None).unwrap();

        let n1 = cluster.host("n1").unwrap();
        let bond0 = &n1.nics["bond0"];
        assert_eq!(bond0.is_bonded, Some(true));
        assert_eq!(bond0.ip.as_deref(), Some("10.1.0.11"));
        assert_eq!(bond0.netaddr.as_deref(), Some("10.1.0.0"));

        let eth1 = &n1.nics["eth1"];
        assert_eq!(eth1.master.as_deref(), Some("bond0"));
        assert_eq!(eth1.is_bonded, Some(false));
        assert_eq!(eth1.ip, None);
        assert_eq!(n1.lnet_networks().unwrap(), "tcp(bond0)");
        assert_eq!(n1.nids().unwrap(), vec!["10.1.0.11@tcp"]);
    }

    #[test]
    fn undeclared_bonding_slave() {
        let config = cluster_with(
            indoc! {"
                nic_list = bond0
                lnets = tcp(bond0)
                bond0_slaves = eth9
            "},
            "",
        );
        assert!(matches!(
            resolve_str(&config, None),
            Err(ConfigError::NetworkConfig { host, nic, .. }) if host == "n0" && nic == "bond0"
        ));
    }

    #[test]
    fn invalid_explicit_address() {
        let config = cluster_with(
            indoc! {"
                nic_list = ib0
                lnets = ib0
                ib0_netmask = 255.255.255.0
            "},
            indoc! {"
                [host n1]
                ib0_ip = 10.0.0.300
            "},
        );
        assert!(matches!(
            resolve_str(&config, None),
            Err(ConfigError::NetworkConfig { host, nic, .. }) if host == "n1" && nic == "ib0"
        ));
    }

    #[test]
    fn address_pool_exhausted() {
        let config = indoc! {"
            [global]
            fs_list = fs0
            clients_list = c0

            [host_defaults]
            stonith_type = none
            nic_list = ib0
            lnets = ib0
            ib0_ip_base = 10.0.0.1
            ib0_netmask = 255.255.255.252

            [fs fs0]
            mgs_internal = yes
            mds_list = n0
            oss_list = n1
            default_ost_count = 1
        "};
        assert!(matches!(
            resolve_str(config, None),
            Err(ConfigError::AddressPoolExhausted { host, nic, .. }) if host == "c0" && nic == "ib0"
        ));
    }

    #[test]
    fn explicit_address_of_later_host_is_skipped() {
        let config = cluster_with(
            indoc! {"
                nic_list = ib0
                lnets = ib0
                ib0_ip_base = 10.0.0.1
                ib0_netmask = 255.255.255.0
            "},
            indoc! {"
                [host n0]
                oid = 0

                [host n1]
                ib0_ip = 10.0.0.1
            "},
        );
        let cluster = resolve_str(&config, None).unwrap();
        let ip = |host: &str| cluster.host(host).unwrap().nics["ib0"].ip.clone();
        assert_eq!(ip("n0").as_deref(), Some("10.0.0.2"));
        assert_eq!(ip("n1").as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn nic_aliases() {
        let config = cluster_with(
            indoc! {"
                nic_list = ib0
                lnets = ib0
                ib0_ip_base = 10.0.0.1
                ib0_netmask = 255.255.255.0
            "},
            indoc! {"
                [host n0]
                nic_list = ib0 ib0-alias0
                ib0-alias0_ip = 10.0.0.50
                ib0-alias0_netmask = 255.255.255.0
            "},
        );
        let cluster = resolve_str(&config, None).unwrap();
        let n0 = cluster.host("n0").unwrap();
        assert_eq!(n0.common.nic_list, vec!["ib0", "ib0:0"]);
        assert_eq!(n0.nics["ib0:0"].ip.as_deref(), Some("10.0.0.50"));
        assert_eq!(n0.nics["ib0:0"].netaddr.as_deref(), Some("10.0.0.0"));
    }

    #[test]
    fn nic_device_defaults() {
        let config = cluster_with(
            indoc! {"
                nic_list = ib0 eth0
                lnets = o2ib(ib0)
                eth0_device = enp1s0
            "},
            indoc! {"
                [host n1]
                ib0_device = mlx0
            "},
        );
        let cluster = resolve_str(&config, None).unwrap();
        let n0 = cluster.host("n0").unwrap();
        assert_eq!(n0.nics["ib0"].device.as_deref(), Some("ib0"));
        assert_eq!(n0.nics["eth0"].device.as_deref(), Some("enp1s0"));

        let n1 = cluster.host("n1").unwrap();
        assert_eq!(n1.lnet_networks().unwrap(), "o2ib(mlx0)");
    }

    #[test]
    fn rest_keepalived_defaults_to_primary_nic() {
        let config = cluster_with(
            indoc! {"
                nic_list = eth0
                lnets = eth0
                rest_primary_nic = eth0
            "},
            indoc! {"
                [rest]
                master_nodes = n0 n1
                ext_vip = 192.168.0.100

                [host n1]
                rest_keepalived_nic = eth3
            "},
        );
        let cluster = resolve_str(&config, None).unwrap();
        assert_eq!(cluster.rest().unwrap().master_nodes, vec!["n0", "n1"]);
        let keepalived = |host: &str| cluster.host(host).unwrap().common.rest_keepalived_nic.clone();
        assert_eq!(keepalived("n0").as_deref(), Some("eth0"));
        assert_eq!(keepalived("n1").as_deref(), Some("eth3"));
    }
}
