use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::subnet::{DEFAULT_PREFIXES, MAX_HOST};
use crate::types::SubnetPrefix;

/// Longest a single discovery run may take; configs that could exceed it are rejected.
pub const MAX_DISCOVERY: Duration = Duration::from_secs(60);

/// Discovery settings. Every field has a default, so an empty TOML file is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Port the backend listens on at every candidate address.
    pub port: u16,
    pub health_path: String,
    pub probe_timeout_ms: u64,
    /// Probes in flight per batch.
    pub batch_size: usize,
    /// Addresses probed around a hint before giving up on its subnet.
    pub hint_scan_budget: usize,
    /// Addresses probed in each prefix of a blind scan.
    pub blind_scan_budget: usize,
    pub common_prefixes: Vec<SubnetPrefix>,
    /// Put this host's own interface subnets ahead of `common_prefixes`.
    pub include_local_subnets: bool,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            health_path: "/health".to_string(),
            probe_timeout_ms: 2000,
            batch_size: 20,
            hint_scan_budget: 60,
            blind_scan_budget: 20,
            common_prefixes: DEFAULT_PREFIXES.to_vec(),
            include_local_subnets: false,
        }
    }
}

impl LocatorConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Batches needed to exhaust `budget` at the configured batch size.
    pub fn batches_for(&self, budget: usize) -> usize {
        budget.div_ceil(self.batch_size.max(1))
    }

    /// Upper bound on discovery wall-clock time for `blind_prefixes` prefixes.
    ///
    /// One direct probe plus the larger of the hint scan and the blind scan,
    /// since a run takes one path or the other.
    pub fn worst_case(&self, blind_prefixes: usize) -> Duration {
        let blind = blind_prefixes.saturating_mul(self.batches_for(self.blind_scan_budget));
        let batches = self
            .batches_for(self.hint_scan_budget)
            .max(blind)
            .saturating_add(1);
        let batches = u32::try_from(batches).unwrap_or(u32::MAX);
        self.probe_timeout().saturating_mul(batches)
    }

    /// How many blind-scan prefixes fit within [`MAX_DISCOVERY`].
    pub fn max_blind_prefixes(&self) -> usize {
        let timeout_ms = self.probe_timeout_ms.max(1) as u128;
        let total_batches = (MAX_DISCOVERY.as_millis() / timeout_ms) as usize;
        total_batches.saturating_sub(1) / self.batches_for(self.blind_scan_budget).max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            bail!("port must be non-zero");
        }
        if !self.health_path.starts_with('/') {
            bail!("health_path must start with '/': {}", self.health_path);
        }
        if self.probe_timeout_ms == 0 {
            bail!("probe_timeout_ms must be non-zero");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        for (name, budget) in [
            ("hint_scan_budget", self.hint_scan_budget),
            ("blind_scan_budget", self.blind_scan_budget),
        ] {
            if budget == 0 || budget > MAX_HOST as usize {
                bail!("{name} must be in 1..={MAX_HOST}, got {budget}");
            }
        }
        let worst = self.worst_case(self.common_prefixes.len());
        if worst > MAX_DISCOVERY {
            bail!(
                "discovery could take {}s, over the {}s limit; lower probe_timeout_ms, \
                 the scan budgets, or the number of common_prefixes",
                worst.as_secs(),
                MAX_DISCOVERY.as_secs()
            );
        }
        Ok(())
    }
}

/// Parse and validate a TOML config string.
pub fn parse_config_str(s: &str) -> Result<LocatorConfig> {
    let cfg: LocatorConfig = toml::from_str(s).context("invalid locator config")?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load a config file, or defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<LocatorConfig> {
    match path {
        Some(p) => {
            let content = std::fs::read_to_string(p)
                .with_context(|| format!("failed to read config file: {}", p.display()))?;
            parse_config_str(&content).with_context(|| format!("in {}", p.display()))
        }
        None => Ok(LocatorConfig::default()),
    }
}
