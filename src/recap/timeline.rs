//! Monthly activity histogram and account age.
//!
//! Block timestamps are looked up once per distinct (network, block),
//! concurrently and bounded by `lookup_concurrency`. Results land in a map
//! keyed by block, and transfers are then walked in input order, so the
//! output never depends on which lookup finished first.
//!
//! A transfer whose block cannot be timed is skipped: it counts toward
//! neither the histogram nor the age.

use chrono::{DateTime, Datelike, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

use super::fallback::within;
use crate::chain::{BlockClock, Network, PerNetwork, RawTransfer};

/// Transfer count for one calendar month, labelled `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucketCount {
    pub bucket_label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    /// Exactly `window_months` entries, oldest first, zero-filled.
    pub history: Vec<TimeBucketCount>,
    /// Earliest resolved timestamp across all networks.
    pub first_seen: Option<DateTime<Utc>>,
    pub first_seen_by_network: PerNetwork<Option<DateTime<Utc>>>,
    /// Whole days between `first_seen` and now; 0 when nothing resolved.
    pub age_days: u64,
    /// Transfers dropped because their block could not be timed.
    pub skipped: usize,
}

/// Lookup parameters for `index_transfers`.
#[derive(Debug, Clone, Copy)]
pub struct TimelineSettings {
    pub window_months: u32,
    pub concurrency: usize,
    pub timeout: Duration,
}

pub async fn index_transfers(
    transfers: &PerNetwork<Vec<RawTransfer>>,
    clock: &dyn BlockClock,
    now: DateTime<Utc>,
    settings: TimelineSettings,
) -> Timeline {
    let timestamps = block_timestamps(transfers, clock, settings).await;

    let end = month_index(now);
    let start = end - i64::from(settings.window_months) + 1;
    let mut counts = vec![0u64; settings.window_months as usize];
    let mut first_seen_by_network: PerNetwork<Option<DateTime<Utc>>> = PerNetwork::default();
    let mut skipped = 0usize;

    for (network, list) in transfers.iter() {
        for transfer in list {
            let Some(at) = timestamps.get(&(network, transfer.block)).copied() else {
                skipped += 1;
                continue;
            };

            let earliest = first_seen_by_network.get_mut(network);
            if earliest.map_or(true, |e| at < e) {
                *earliest = Some(at);
            }

            let month = month_index(at);
            if (start..=end).contains(&month) {
                counts[(month - start) as usize] += 1;
            }
        }
    }

    let first_seen = [first_seen_by_network.primary, first_seen_by_network.secondary]
        .into_iter()
        .flatten()
        .min();
    let age_days = first_seen
        .map(|f| (now - f).num_days().max(0) as u64)
        .unwrap_or(0);

    let history = counts
        .into_iter()
        .enumerate()
        .map(|(offset, count)| TimeBucketCount {
            bucket_label: month_label(start + offset as i64),
            count,
        })
        .collect();

    info!(
        first_seen = ?first_seen,
        age_days,
        skipped,
        "indexed transfer timeline"
    );

    Timeline {
        history,
        first_seen,
        first_seen_by_network,
        age_days,
        skipped,
    }
}

/// Resolve each distinct block once. Failed or unknown blocks are absent
/// from the returned map.
async fn block_timestamps(
    transfers: &PerNetwork<Vec<RawTransfer>>,
    clock: &dyn BlockClock,
    settings: TimelineSettings,
) -> HashMap<(Network, u64), DateTime<Utc>> {
    let mut seen = HashSet::new();
    let keys: Vec<(Network, u64)> = transfers
        .iter()
        .flat_map(|(network, list)| list.iter().map(move |t| (network, t.block)))
        .filter(|key| seen.insert(*key))
        .collect();

    let results: Vec<_> = stream::iter(keys)
        .map(|(network, block)| async move {
            let res = within(settings.timeout, clock.block_timestamp(block, network)).await;
            ((network, block), res)
        })
        .buffer_unordered(settings.concurrency.max(1))
        .collect()
        .await;

    let mut timestamps = HashMap::with_capacity(results.len());
    for (key, res) in results {
        match res {
            Ok(Some(at)) => {
                timestamps.insert(key, at);
            }
            Ok(None) => debug!(network = %key.0, block = key.1, "block not found, skipping"),
            Err(e) => debug!(network = %key.0, block = key.1, error = %e, "block lookup failed, skipping"),
        }
    }
    timestamps
}

fn month_index(at: DateTime<Utc>) -> i64 {
    i64::from(at.year()) * 12 + i64::from(at.month0())
}

fn month_label(index: i64) -> String {
    format!("{:04}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1)
}
