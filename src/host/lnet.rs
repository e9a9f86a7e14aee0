// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

/// LNet names implied by a bare NIC name in `lnets`.
const BUILTIN_LNETS: [(&str, &str); 8] = [
    ("ib0", "o2ib"),
    ("ib1", "o2ib1"),
    ("ib2", "o2ib2"),
    ("ib3", "o2ib3"),
    ("eth0", "tcp"),
    ("eth1", "tcp1"),
    ("eth2", "tcp2"),
    ("eth3", "tcp3"),
];

fn builtin_lnet(nic: &str) -> Option<&'static str> {
    BUILTIN_LNETS
        .iter()
        .find(|(name, _)| *name == nic)
        .map(|(_, lnet)| *lnet)
}

/// Expand `lnets` tokens into ordered `(lnet, nic)` pairs.
///
/// A token is either a NIC with a built-in LNet (`ib0`) or `lnet(nic[,nic...])`.
pub fn parse_lnets(lnets: &[String]) -> Result<Vec<(String, String)>, String> {
    let mut pairs = Vec::new();

    for token in lnets {
        if let Some(lnet) = builtin_lnet(token) {
            pairs.push((lnet.to_string(), token.clone()));
            continue;
        }

        let Some((lnet, nics)) = token.strip_suffix(')').and_then(|t| t.split_once('(')) else {
            return Err(format!("'{token}' is neither a known NIC nor lnet(nic,...)"));
        };
        if lnet.is_empty() || nics.contains('(') {
            return Err(format!("malformed lnet '{token}'"));
        }
        for nic in nics.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            pairs.push((lnet.to_string(), nic.to_string()));
        }
    }

    Ok(pairs)
}

/// Group `(lnet, device)` pairs as `lnet(dev,dev), lnet(dev)` in first-seen LNet order.
pub fn format_networks(pairs: &[(String, String)]) -> String {
    let mut grouped: Vec<(&str, Vec<&str>)> = Vec::new();
    for (lnet, device) in pairs {
        match grouped.iter().position(|(name, _)| *name == lnet.as_str()) {
            Some(pos) => grouped[pos].1.push(device.as_str()),
            None => grouped.push((lnet.as_str(), vec![device.as_str()])),
        }
    }

    grouped
        .iter()
        .map(|(lnet, devices)| format!("{lnet}({})", devices.join(",")))
        .collect::<Vec<_>>()
        .join(", ")
}
