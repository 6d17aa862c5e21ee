use crate::types::SubnetPrefix;
use std::net::Ipv4Addr;

/// Highest usable host octet in a /24.
pub const MAX_HOST: u8 = 254;

/// Host octets tried first when nothing hints where the backend sits:
/// gateways, the usual DHCP pool starts, and the top of the range.
pub const COMMON_HOST_OCTETS: &[u8] = &[1, 2, 100, 101, 10, 50, 254];

/// Default private prefixes for a blind scan, most common home/office layouts first.
pub const DEFAULT_PREFIXES: &[SubnetPrefix] = &[
    SubnetPrefix::new(192, 168, 1),
    SubnetPrefix::new(192, 168, 0),
    SubnetPrefix::new(10, 0, 0),
    SubnetPrefix::new(172, 16, 0),
];

/// Split a dotted IPv4 string into its /24 prefix.
///
/// Returns `None` unless the input has exactly four octets, each in `0..=255`.
pub fn derive_subnet(candidate: &str) -> Option<SubnetPrefix> {
    let ip: Ipv4Addr = candidate.trim().parse().ok()?;
    Some(SubnetPrefix::of(ip))
}

/// Host octets ordered by distance from `seed`, lower octet first on ties.
///
/// Neighbours are clipped to `1..=254`; once one side runs out the other
/// keeps going, so every host appears exactly once. At most `budget` octets
/// are returned.
pub fn seeded_order(seed: u8, budget: usize) -> Vec<u8> {
    let budget = budget.min(MAX_HOST as usize);
    if budget == 0 {
        return Vec::new();
    }
    let seed = seed.clamp(1, MAX_HOST) as i16;
    let mut out = Vec::with_capacity(budget);
    out.push(seed as u8);
    let mut d: i16 = 1;
    while out.len() < budget {
        let lo = seed - d;
        let hi = seed + d;
        let lo_ok = lo >= 1;
        let hi_ok = hi <= MAX_HOST as i16;
        if !lo_ok && !hi_ok {
            break;
        }
        if lo_ok {
            out.push(lo as u8);
        }
        if hi_ok && out.len() < budget {
            out.push(hi as u8);
        }
        d += 1;
    }
    out.truncate(budget);
    out
}

/// Host octets for a scan without a seed: [`COMMON_HOST_OCTETS`] first, then ascending.
pub fn unseeded_order(budget: usize) -> Vec<u8> {
    let budget = budget.min(MAX_HOST as usize);
    let mut out: Vec<u8> = COMMON_HOST_OCTETS.to_vec();
    out.extend((1..=MAX_HOST).filter(|o| !COMMON_HOST_OCTETS.contains(o)));
    out.truncate(budget);
    out
}

/// Candidate addresses in probe order for `prefix`.
pub fn candidates(prefix: SubnetPrefix, seed: Option<u8>, budget: usize) -> Vec<Ipv4Addr> {
    let octets = match seed {
        Some(s) => seeded_order(s, budget),
        None => unseeded_order(budget),
    };
    octets.into_iter().map(|o| prefix.host(o)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_subnet_takes_first_three_octets() {
        assert_eq!(
            derive_subnet("192.168.1.55").map(|p| p.to_string()),
            Some("192.168.1".to_string())
        );
    }

    #[test]
    fn derive_subnet_rejects_wrong_octet_count() {
        assert_eq!(derive_subnet("192.168.1"), None);
        assert_eq!(derive_subnet("192.168.1.5.6"), None);
        assert_eq!(derive_subnet(""), None);
        assert_eq!(derive_subnet("a.b.c.d"), None);
    }

    #[test]
    fn seeded_order_alternates_lower_first() {
        assert_eq!(seeded_order(100, 7), vec![100, 99, 101, 98, 102, 97, 103]);
    }

    #[test]
    fn seeded_order_clips_at_edges() {
        assert_eq!(seeded_order(1, 4), vec![1, 2, 3, 4]);
        assert_eq!(seeded_order(254, 4), vec![254, 253, 252, 251]);
        assert_eq!(seeded_order(2, 5), vec![2, 1, 3, 4, 5]);
    }

    #[test]
    fn seeded_order_covers_whole_range_once() {
        let mut all = seeded_order(37, 1000);
        assert_eq!(all.len(), 254);
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 254);
    }

    #[test]
    fn unseeded_order_starts_with_common_hosts() {
        let o = unseeded_order(9);
        assert_eq!(o, vec![1, 2, 100, 101, 10, 50, 254, 3, 4]);
        assert_eq!(unseeded_order(500).len(), 254);
    }
}
