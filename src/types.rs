use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ::time::{format_description::well_known, OffsetDateTime};

/// Outcome of one health probe against a candidate address.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub ip: Ipv4Addr,
    pub reachable: bool,
    pub latency_ms: u64,
    pub timestamp: String,
}

/// The first three octets of an IPv4 address, e.g. `192.168.1`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct SubnetPrefix([u8; 3]);

impl SubnetPrefix {
    pub const fn new(a: u8, b: u8, c: u8) -> Self {
        Self([a, b, c])
    }

    pub fn of(ip: Ipv4Addr) -> Self {
        let o = ip.octets();
        Self([o[0], o[1], o[2]])
    }

    /// Build the host address `a.b.c.<octet>` inside this prefix.
    pub fn host(&self, octet: u8) -> Ipv4Addr {
        let [a, b, c] = self.0;
        Ipv4Addr::new(a, b, c, octet)
    }

    pub fn octets(&self) -> [u8; 3] {
        self.0
    }
}

impl fmt::Display for SubnetPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a}.{b}.{c}")
    }
}

impl FromStr for SubnetPrefix {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            anyhow::bail!("subnet prefix must have three octets: {s}");
        }
        let mut out = [0u8; 3];
        for (slot, part) in out.iter_mut().zip(&parts) {
            *slot = part
                .parse::<u8>()
                .map_err(|e| anyhow::anyhow!("invalid octet {part:?} in {s}: {e}"))?;
        }
        Ok(Self(out))
    }
}

impl TryFrom<String> for SubnetPrefix {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SubnetPrefix> for String {
    fn from(value: SubnetPrefix) -> Self {
        value.to_string()
    }
}

/// How a backend address was arrived at.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// The environment hint answered its health probe.
    HintProbed,
    /// A neighbour of the hint on the same /24 answered.
    HintSubnetScan,
    /// Nothing answered; the hint is returned unprobed as a best guess.
    UnverifiedHint,
    /// No hint existed and a prioritized prefix scan found a backend.
    BlindScan,
}

impl Strategy {
    /// Whether the address passed a health probe before being accepted.
    pub fn is_verified(&self) -> bool {
        !matches!(self, Strategy::UnverifiedHint)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::HintProbed => "hint_probed",
            Strategy::HintSubnetScan => "hint_subnet_scan",
            Strategy::UnverifiedHint => "unverified_hint",
            Strategy::BlindScan => "blind_scan",
        };
        f.write_str(s)
    }
}

/// A resolved backend address together with the strategy that produced it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub address: Ipv4Addr,
    pub strategy: Strategy,
}

/// Result of scanning one subnet.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ScanOutcome {
    pub found: Option<Ipv4Addr>,
    /// Settled probes in generation order. Probes abandoned after a hit are not listed.
    pub attempts: Vec<ProbeResult>,
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
