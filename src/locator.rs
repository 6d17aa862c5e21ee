use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::LocatorConfig;
use crate::hint::{extract_hint, EnvironmentMetadata};
use crate::netdetect;
use crate::probe::Prober;
use crate::scanner::scan_subnet;
use crate::types::{Resolution, Strategy, SubnetPrefix};

/// Finds the backend starting from environment metadata.
///
/// Strategies, first success wins:
/// 1. probe the hint itself;
/// 2. scan the hint's /24 outward from the hint;
/// 3. return the hint unprobed ([`Strategy::UnverifiedHint`]);
/// 4. with no hint at all, scan the prioritized prefixes.
#[derive(Clone)]
pub struct Locator {
    prober: Arc<dyn Prober>,
    config: LocatorConfig,
    cancel: CancellationToken,
}

impl Locator {
    pub fn new(prober: Arc<dyn Prober>, config: LocatorConfig) -> Self {
        Self {
            prober,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop further scan batches when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn resolve(&self, meta: &EnvironmentMetadata) -> Option<Resolution> {
        match extract_hint(meta) {
            Some(hint) => Some(self.resolve_from_hint(hint).await),
            None => {
                tracing::info!("no hint in environment metadata; scanning common subnets");
                self.blind_scan().await
            }
        }
    }

    async fn resolve_from_hint(&self, hint: Ipv4Addr) -> Resolution {
        if self.prober.probe(hint).await {
            tracing::info!(%hint, "hint answered health probe");
            return Resolution {
                address: hint,
                strategy: Strategy::HintProbed,
            };
        }

        let prefix = SubnetPrefix::of(hint);
        let seed = hint.octets()[3];
        tracing::info!(%hint, %prefix, "hint unreachable; scanning its subnet");
        let outcome = scan_subnet(
            self.prober.clone(),
            prefix,
            Some(seed),
            self.config.hint_scan_budget,
            self.config.batch_size,
            &self.cancel,
        )
        .await;
        if let Some(found) = outcome.found {
            tracing::info!(%found, probes = outcome.attempts.len(), "backend found near hint");
            return Resolution {
                address: found,
                strategy: Strategy::HintSubnetScan,
            };
        }

        // The service may simply not be listening yet; the hint is still the best guess.
        tracing::warn!(%hint, "no backend answered; falling back to unverified hint");
        Resolution {
            address: hint,
            strategy: Strategy::UnverifiedHint,
        }
    }

    async fn blind_scan(&self) -> Option<Resolution> {
        for prefix in self.blind_prefixes() {
            if self.cancel.is_cancelled() {
                break;
            }
            let outcome = scan_subnet(
                self.prober.clone(),
                prefix,
                None,
                self.config.blind_scan_budget,
                self.config.batch_size,
                &self.cancel,
            )
            .await;
            if let Some(found) = outcome.found {
                tracing::info!(%found, %prefix, "backend found by blind scan");
                return Some(Resolution {
                    address: found,
                    strategy: Strategy::BlindScan,
                });
            }
        }
        tracing::warn!("backend discovery failed");
        None
    }

    /// Prefixes for a blind scan, local interface subnets first when enabled.
    ///
    /// Truncated so the scan stays within [`MAX_DISCOVERY`](crate::config::MAX_DISCOVERY).
    pub fn blind_prefixes(&self) -> Vec<SubnetPrefix> {
        let mut prefixes = if self.config.include_local_subnets {
            let local = netdetect::detect_local_prefixes().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to detect local networks");
                Vec::new()
            });
            netdetect::merge_prefixes(&local, &self.config.common_prefixes)
        } else {
            self.config.common_prefixes.clone()
        };
        let cap = self.config.max_blind_prefixes();
        if prefixes.len() > cap {
            tracing::warn!(dropped = prefixes.len() - cap, "too many prefixes for the discovery time limit");
            prefixes.truncate(cap);
        }
        prefixes
    }
}

impl std::fmt::Debug for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
