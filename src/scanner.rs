use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::probe::{probe_timed, Prober};
use crate::subnet;
use crate::types::{now_rfc3339, ProbeResult, ScanOutcome, SubnetPrefix};

/// Probe up to `budget` hosts of `prefix` in batches of `batch_size` concurrent probes.
///
/// - Candidates come from [`subnet::candidates`]: distance order around `seed`,
///   or common hosts first when there is no seed.
/// - A batch must settle before the next one starts.
/// - Within a batch the earliest candidate in generation order that answers
///   wins, even when a later one answers first. Once the winner is known the
///   remaining probes are aborted and their outcome dropped.
/// - `cancel` is checked between batches.
pub async fn scan_subnet(
    prober: Arc<dyn Prober>,
    prefix: SubnetPrefix,
    seed: Option<u8>,
    budget: usize,
    batch_size: usize,
    cancel: &CancellationToken,
) -> ScanOutcome {
    let candidates = subnet::candidates(prefix, seed, budget);
    let mut outcome = ScanOutcome::default();
    tracing::debug!(
        %prefix,
        ?seed,
        candidates = candidates.len(),
        "subnet scan starting"
    );

    for (batch_no, batch) in candidates.chunks(batch_size.max(1)).enumerate() {
        if cancel.is_cancelled() {
            tracing::debug!(%prefix, batch_no, "subnet scan cancelled");
            break;
        }
        let (found, settled) = run_batch(prober.clone(), batch).await;
        tracing::debug!(
            %prefix,
            batch_no,
            size = batch.len(),
            settled = settled.len(),
            found = ?found,
            "batch settled"
        );
        outcome.attempts.extend(settled);
        if found.is_some() {
            outcome.found = found;
            break;
        }
    }
    outcome
}

/// Run one batch; returns the winner (if any) and the settled probes up to it.
async fn run_batch(
    prober: Arc<dyn Prober>,
    batch: &[Ipv4Addr],
) -> (Option<Ipv4Addr>, Vec<ProbeResult>) {
    let mut set = JoinSet::new();
    let mut index_of = HashMap::with_capacity(batch.len());
    for (idx, &ip) in batch.iter().enumerate() {
        let prober = prober.clone();
        let handle = set.spawn(async move { probe_timed(prober.as_ref(), ip).await });
        index_of.insert(handle.id(), idx);
    }

    let mut slots: Vec<Option<ProbeResult>> = vec![None; batch.len()];
    // Every slot below `next` has settled unreachable.
    let mut next = 0usize;

    while let Some(joined) = set.join_next_with_id().await {
        let (id, result) = match joined {
            Ok((id, res)) => (id, res),
            Err(e) => {
                // A panicking prober counts as unreachable.
                let id = e.id();
                let ip = index_of.get(&id).map(|&i| batch[i]);
                tracing::warn!(?ip, error = %e, "probe task failed");
                let Some(ip) = ip else { continue };
                (
                    id,
                    ProbeResult {
                        ip,
                        reachable: false,
                        latency_ms: 0,
                        timestamp: now_rfc3339(),
                    },
                )
            }
        };
        if let Some(&idx) = index_of.get(&id) {
            slots[idx] = Some(result);
        }

        while let Some(Some(r)) = slots.get(next) {
            if r.reachable {
                let winner = r.ip;
                let settled = slots.into_iter().take(next + 1).flatten().collect();
                // Dropping the set aborts whatever is still in flight.
                return (Some(winner), settled);
            }
            next += 1;
        }
    }

    (None, slots.into_iter().flatten().collect())
}
