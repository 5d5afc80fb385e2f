//! Scripted in-memory chain for tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{
    AssetDirectory, AssetKind, BlockClock, ChainError, ChainResult, NameService, Network,
    OwnedAsset, RawTransfer, TransferSource,
};

#[derive(Default)]
pub struct FakeChain {
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
    names_fail: bool,
    transfers: HashMap<Network, Vec<RawTransfer>>,
    failing_networks: HashSet<Network>,
    slow_networks: HashSet<Network>,
    timestamps: HashMap<(Network, u64), DateTime<Utc>>,
    failing_blocks: HashSet<(Network, u64)>,
    assets: HashMap<Network, Vec<OwnedAsset>>,
    failing_assets: HashSet<Network>,
    pub name_calls: AtomicUsize,
    pub transfer_calls: AtomicUsize,
    pub block_calls: AtomicUsize,
    pub asset_calls: AtomicUsize,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: &str, address: &str) -> Self {
        self.forward.insert(name.to_string(), address.to_string());
        self
    }

    pub fn with_reverse(mut self, address: &str, name: &str) -> Self {
        self.reverse.insert(address.to_string(), name.to_string());
        self
    }

    /// Every name lookup returns an error.
    pub fn failing_names(mut self) -> Self {
        self.names_fail = true;
        self
    }

    /// Register a transfer and, if given, the timestamp of its block.
    pub fn with_transfer(
        mut self,
        network: Network,
        block: u64,
        counterparty: Option<&str>,
        at: Option<DateTime<Utc>>,
    ) -> Self {
        self.transfers.entry(network).or_default().push(RawTransfer {
            block,
            counterparty: counterparty.map(str::to_string),
            network,
            kind: AssetKind::Fungible,
        });
        if let Some(at) = at {
            self.timestamps.insert((network, block), at);
        }
        self
    }

    pub fn failing_network(mut self, network: Network) -> Self {
        self.failing_networks.insert(network);
        self
    }

    /// Transfer lookups on `network` hang well past any test timeout.
    pub fn slow_network(mut self, network: Network) -> Self {
        self.slow_networks.insert(network);
        self
    }

    pub fn failing_block(mut self, network: Network, block: u64) -> Self {
        self.failing_blocks.insert((network, block));
        self
    }

    pub fn with_asset(mut self, network: Network, title: &str, collection: &str) -> Self {
        self.assets.entry(network).or_default().push(OwnedAsset {
            title: title.to_string(),
            collection_name: collection.to_string(),
        });
        self
    }

    pub fn failing_assets(mut self, network: Network) -> Self {
        self.failing_assets.insert(network);
        self
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NameService for FakeChain {
    async fn reverse_lookup(&self, address: &str) -> ChainResult<Option<String>> {
        self.name_calls.fetch_add(1, Ordering::SeqCst);
        if self.names_fail {
            return Err(ChainError::Transport("name service down".to_string()));
        }
        Ok(self.reverse.get(address).cloned())
    }

    async fn forward_lookup(&self, name: &str) -> ChainResult<Option<String>> {
        self.name_calls.fetch_add(1, Ordering::SeqCst);
        if self.names_fail {
            return Err(ChainError::Transport("name service down".to_string()));
        }
        Ok(self.forward.get(name).cloned())
    }
}

#[async_trait]
impl TransferSource for FakeChain {
    async fn incoming_transfers(
        &self,
        _account: &str,
        network: Network,
        max_count: usize,
    ) -> ChainResult<Vec<RawTransfer>> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        if self.slow_networks.contains(&network) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.failing_networks.contains(&network) {
            return Err(ChainError::Unsupported { network });
        }
        let mut transfers = self.transfers.get(&network).cloned().unwrap_or_default();
        transfers.truncate(max_count);
        Ok(transfers)
    }
}

#[async_trait]
impl BlockClock for FakeChain {
    async fn block_timestamp(
        &self,
        block: u64,
        network: Network,
    ) -> ChainResult<Option<DateTime<Utc>>> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_blocks.contains(&(network, block)) {
            return Err(ChainError::Transport(format!("block {block} unavailable")));
        }
        Ok(self.timestamps.get(&(network, block)).copied())
    }
}

#[async_trait]
impl AssetDirectory for FakeChain {
    async fn owned_assets(&self, _account: &str, network: Network) -> ChainResult<Vec<OwnedAsset>> {
        self.asset_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_assets.contains(&network) {
            return Err(ChainError::Unsupported { network });
        }
        Ok(self.assets.get(&network).cloned().unwrap_or_default())
    }
}

/// Midnight UTC on the given date.
pub fn day(year: i32, month: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, d, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
