//! Fetches incoming transfers for every network concurrently.
//!
//! Each network is isolated: an error, timeout, or unsupported query on one
//! network yields an empty list for that network and nothing else.
//!
//! `budget` bounds a network's whole fetch. Sources that page apply the
//! per-call timeout to each page themselves.

use std::time::Duration;
use tracing::{info, warn};

use super::fallback::within;
use crate::chain::{Network, PerNetwork, RawTransfer, TransferSource};

pub async fn collect_transfers(
    account: &str,
    source: &dyn TransferSource,
    max_count: usize,
    budget: Duration,
) -> PerNetwork<Vec<RawTransfer>> {
    let fetch = |network: Network| async move {
        match within(budget, source.incoming_transfers(account, network, max_count)).await {
            Ok(mut transfers) => {
                transfers.truncate(max_count);
                info!(network = %network, transfers = transfers.len(), "collected transfers");
                transfers
            }
            Err(e) => {
                warn!(
                    network = %network,
                    error = %e,
                    "transfer lookup unavailable, continuing without this network"
                );
                Vec::new()
            }
        }
    };

    let (primary, secondary) = tokio::join!(fetch(Network::Primary), fetch(Network::Secondary));
    PerNetwork::new(primary, secondary)
}
