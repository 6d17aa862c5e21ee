//! Backend hints taken from the connection metadata the host environment exposes.
//!
//! A development runtime usually knows the URL its bundle was served from
//! (`http://192.168.1.55:8081/index.bundle`). The backend tends to live on the
//! same machine, so that address is the first candidate worth probing.
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::OnceLock;

/// Connection metadata as published by the runtime, in camelCase JSON.
///
/// Only the fields listed here are inspected, in the order given by
/// [`EnvironmentMetadata::hint_fields`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentMetadata {
    #[serde(rename = "scriptURL", default)]
    pub script_url: Option<String>,
    #[serde(default)]
    pub linking_uri: Option<String>,
    #[serde(default)]
    pub experience_url: Option<String>,
    #[serde(default)]
    pub expo_config: Option<ExpoConfig>,
    #[serde(default)]
    pub manifest: Option<Manifest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpoConfig {
    #[serde(default)]
    pub host_uri: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub bundle_url: Option<String>,
    #[serde(default)]
    pub debugger_host: Option<String>,
}

impl EnvironmentMetadata {
    /// Metadata carrying a single direct URL, as if the bundle was served from it.
    pub fn from_script_url(url: impl Into<String>) -> Self {
        Self {
            script_url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Known metadata fields as `(path, value, shape)`: the direct field first, then fallbacks.
    pub fn hint_fields(&self) -> Vec<(&'static str, &str, FieldShape)> {
        let expo = self.expo_config.as_ref();
        let manifest = self.manifest.as_ref();
        [
            ("scriptURL", self.script_url.as_deref(), FieldShape::Url),
            ("linkingUri", self.linking_uri.as_deref(), FieldShape::Url),
            ("experienceUrl", self.experience_url.as_deref(), FieldShape::Url),
            (
                "expoConfig.hostUri",
                expo.and_then(|e| e.host_uri.as_deref()),
                FieldShape::HostPort,
            ),
            (
                "manifest.bundleUrl",
                manifest.and_then(|m| m.bundle_url.as_deref()),
                FieldShape::Url,
            ),
            (
                "manifest.debuggerHost",
                manifest.and_then(|m| m.debugger_host.as_deref()),
                FieldShape::HostPort,
            ),
        ]
        .into_iter()
        .filter_map(|(path, value, shape)| value.map(|v| (path, v, shape)))
        .collect()
    }
}

/// How an address is laid out inside a metadata field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// `scheme://a.b.c.d...` anywhere in the value.
    Url,
    /// The whole value is `a.b.c.d` or `a.b.c.d:port`.
    HostPort,
}

impl FieldShape {
    pub fn find(&self, value: &str) -> Option<Ipv4Addr> {
        match self {
            FieldShape::Url => find_ipv4_in_url(value),
            FieldShape::HostPort => find_ipv4_host_port(value),
        }
    }
}

/// Read metadata from a JSON file.
pub fn load_metadata(path: impl AsRef<Path>) -> Result<EnvironmentMetadata> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read metadata file: {}", path.as_ref().display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("invalid metadata JSON: {}", path.as_ref().display()))
}

/// Return the first usable IPv4 hint found in the metadata fields, in field order.
pub fn extract_hint(meta: &EnvironmentMetadata) -> Option<Ipv4Addr> {
    meta.hint_fields().into_iter().find_map(|(path, value, shape)| {
        let ip = shape.find(value)?;
        tracing::debug!(field = path, %ip, "hint found in environment metadata");
        Some(ip)
    })
}

fn url_ipv4_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[a-z][a-z0-9+.\-]*://([0-9]{1,3}(?:\.[0-9]{1,3}){3})")
            .expect("static regex is valid")
    })
}

fn host_port_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([0-9]{1,3}(?:\.[0-9]{1,3}){3})(?::[0-9]{1,5})?$")
            .expect("static regex is valid")
    })
}

/// Find the first `scheme://a.b.c.d` address in `s` that can denote a remote peer.
///
/// Groups that do not form a valid address (octets above 255, leading zeros),
/// addresses that continue with more digits or dotted groups, loopback
/// (`127/8`) and unspecified (`0/8`) addresses are skipped.
pub fn find_ipv4_in_url(s: &str) -> Option<Ipv4Addr> {
    for caps in url_ipv4_regex().captures_iter(s) {
        let whole = caps.get(0)?;
        let mut tail = s[whole.end()..].chars();
        match (tail.next(), tail.next()) {
            (Some(c), _) if c.is_ascii_digit() => continue,
            (Some('.'), Some(c)) if c.is_ascii_digit() => continue,
            _ => {}
        }
        if let Some(ip) = accept(&caps[1]) {
            return Some(ip);
        }
    }
    None
}

/// Match a bare `a.b.c.d[:port]` value, as in `hostUri` or `debuggerHost`.
///
/// The whole value must be the address, so `1.2.3.4.5` and hostnames never match.
pub fn find_ipv4_host_port(s: &str) -> Option<Ipv4Addr> {
    let caps = host_port_regex().captures(s.trim())?;
    accept(&caps[1])
}

fn accept(dotted: &str) -> Option<Ipv4Addr> {
    let ip: Ipv4Addr = dotted.parse().ok()?;
    (!is_excluded(ip)).then_some(ip)
}

fn is_excluded(ip: Ipv4Addr) -> bool {
    matches!(ip.octets()[0], 0 | 127)
}
