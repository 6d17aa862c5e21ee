use anyhow::Result;
use if_addrs::{get_if_addrs, IfAddr};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

use crate::types::SubnetPrefix;

/// Detect the /24 prefixes of this host's own non-loopback, non-link-local IPv4 interfaces.
///
/// For example, an interface IP `192.168.1.42` becomes `192.168.1`.
/// Interfaces without neighbours (see [`scan_prefix_for`]) are skipped.
/// Duplicates are removed and the output is sorted for stable ordering.
pub fn detect_local_prefixes() -> Result<Vec<SubnetPrefix>> {
    let mut out: Vec<SubnetPrefix> = Vec::new();
    for iface in get_if_addrs()? {
        if let IfAddr::V4(v4) = iface.addr {
            let ip = v4.ip;
            if ip.is_loopback() || ip.is_link_local() || ip.is_unspecified() {
                continue;
            }
            if let Some(prefix) = scan_prefix_for(ip, v4.netmask) {
                out.push(prefix);
            }
        }
    }
    out.sort_by_key(|p| p.octets());
    out.dedup();
    Ok(out)
}

/// Prepend `local` prefixes to `configured`, keeping first occurrences only.
pub fn merge_prefixes(local: &[SubnetPrefix], configured: &[SubnetPrefix]) -> Vec<SubnetPrefix> {
    let mut out: Vec<SubnetPrefix> = Vec::with_capacity(local.len() + configured.len());
    for p in local.iter().chain(configured) {
        if !out.contains(p) {
            out.push(*p);
        }
    }
    out
}

/// The /24 to scan around an interface address, or `None` when its network has no neighbours.
///
/// Point-to-point links and host routes (/31, /32, typical of VPN tunnels)
/// carry no other hosts, and invalid netmasks are ignored.
pub fn scan_prefix_for(ip: Ipv4Addr, netmask: Ipv4Addr) -> Option<SubnetPrefix> {
    let net = Ipv4Net::with_netmask(ip, netmask).ok()?;
    if net.prefix_len() >= 31 {
        return None;
    }
    Some(SubnetPrefix::of(ip))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_from_lan_interface() {
        let p = scan_prefix_for(Ipv4Addr::new(10, 1, 2, 3), Ipv4Addr::new(255, 255, 0, 0));
        assert_eq!(p, Some(SubnetPrefix::new(10, 1, 2)));
    }

    #[test]
    fn tunnel_and_bad_netmask_are_skipped() {
        let ip = Ipv4Addr::new(10, 8, 0, 6);
        assert_eq!(scan_prefix_for(ip, Ipv4Addr::new(255, 255, 255, 255)), None);
        // Non-contiguous mask.
        assert_eq!(scan_prefix_for(ip, Ipv4Addr::new(255, 0, 255, 0)), None);
    }

    #[test]
    fn merge_keeps_local_first_without_duplicates() {
        let local = [SubnetPrefix::new(192, 168, 0), SubnetPrefix::new(172, 24, 171)];
        let configured = [SubnetPrefix::new(192, 168, 1), SubnetPrefix::new(192, 168, 0)];
        let merged = merge_prefixes(&local, &configured);
        assert_eq!(
            merged,
            vec![
                SubnetPrefix::new(192, 168, 0),
                SubnetPrefix::new(172, 24, 171),
                SubnetPrefix::new(192, 168, 1),
            ]
        );
    }
}
