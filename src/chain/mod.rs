//! Chain-side types and the read-only capabilities the recap pipeline
//! consumes.
//!
//! Every external lookup goes through one of four traits:
//! - `NameService`: forward and reverse name resolution
//! - `TransferSource`: incoming asset transfers per network
//! - `BlockClock`: block number → timestamp
//! - `AssetDirectory`: assets currently owned by an account
//!
//! Concrete adapters live next to the traits (`alchemy`, `ens`, `rpc`).
//! Each one is a stateless handle that is passed explicitly into the
//! pipeline, so tests swap in `fake::FakeChain`.

pub mod alchemy;
pub mod ens;
pub mod rpc;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub use alchemy::AlchemyClient;
pub use ens::EnsNameService;
pub use rpc::RpcBlockClock;

// ─── Networks ────────────────────────────────────────────────────────────────

/// The two networks a recap covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// L1 (Ethereum mainnet by default).
    Primary,
    /// L2 whose launch window drives the participation flag (Base by default).
    Secondary,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::Primary, Network::Secondary];
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

/// One value per supported network. Used for per-network results so that
/// each network's slot is written independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PerNetwork<T> {
    pub primary: T,
    pub secondary: T,
}

impl<T> PerNetwork<T> {
    pub fn new(primary: T, secondary: T) -> Self {
        Self { primary, secondary }
    }

    pub fn get(&self, network: Network) -> &T {
        match network {
            Network::Primary => &self.primary,
            Network::Secondary => &self.secondary,
        }
    }

    pub fn get_mut(&mut self, network: Network) -> &mut T {
        match network {
            Network::Primary => &mut self.primary,
            Network::Secondary => &mut self.secondary,
        }
    }

    /// Iterate in `Network::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = (Network, &T)> {
        Network::ALL.into_iter().map(move |n| (n, self.get(n)))
    }

    pub fn map<U>(&self, mut f: impl FnMut(Network, &T) -> U) -> PerNetwork<U> {
        PerNetwork {
            primary: f(Network::Primary, &self.primary),
            secondary: f(Network::Secondary, &self.secondary),
        }
    }
}

// ─── Transfers and assets ────────────────────────────────────────────────────

/// Transfer categories requested from the transfer source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Native,
    Fungible,
    NonFungible,
    MultiToken,
}

impl AssetKind {
    pub const ALL: [AssetKind; 4] = [
        AssetKind::Fungible,
        AssetKind::NonFungible,
        AssetKind::MultiToken,
        AssetKind::Native,
    ];
}

/// A single incoming transfer as reported by a `TransferSource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransfer {
    /// Block number on `network`.
    pub block: u64,
    /// Lower-cased 0x address of the contract or sender, if known.
    pub counterparty: Option<String>,
    pub network: Network,
    pub kind: AssetKind,
}

/// An asset held by an account, as reported by an `AssetDirectory`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OwnedAsset {
    pub title: String,
    pub collection_name: String,
}

impl OwnedAsset {
    /// Display form: the title, else the collection name, else nothing.
    pub fn display_name(&self) -> Option<String> {
        [&self.title, &self.collection_name]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Failures of a single external lookup. The pipeline never surfaces these;
/// they are logged and the affected data point is dropped.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("{network} network does not support this query")]
    Unsupported { network: Network },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub type ChainResult<T> = Result<T, ChainError>;

// ─── Capabilities ────────────────────────────────────────────────────────────

/// Name ↔ address resolution. Both directions are best-effort.
#[async_trait]
pub trait NameService: Send + Sync {
    /// Primary name for a canonical address, if one is set.
    async fn reverse_lookup(&self, address: &str) -> ChainResult<Option<String>>;
    /// Address a name points at, if any.
    async fn forward_lookup(&self, name: &str) -> ChainResult<Option<String>>;
}

/// Incoming transfers for an account, most recent first.
#[async_trait]
pub trait TransferSource: Send + Sync {
    async fn incoming_transfers(
        &self,
        account: &str,
        network: Network,
        max_count: usize,
    ) -> ChainResult<Vec<RawTransfer>>;
}

/// Block metadata lookups.
#[async_trait]
pub trait BlockClock: Send + Sync {
    /// `Ok(None)` when the node does not know the block.
    async fn block_timestamp(
        &self,
        block: u64,
        network: Network,
    ) -> ChainResult<Option<DateTime<Utc>>>;
}

/// Assets currently owned by an account.
#[async_trait]
pub trait AssetDirectory: Send + Sync {
    async fn owned_assets(&self, account: &str, network: Network) -> ChainResult<Vec<OwnedAsset>>;
}

/// True for `0x`-less 40-digit hex strings.
pub fn is_bare_hex_address(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Normalize a `0x`/`0X`-prefixed or bare 40-digit hex string to the
/// canonical lower-case `0x` form.
pub fn canonical_address(s: &str) -> Option<String> {
    let bare = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    is_bare_hex_address(bare).then(|| format!("0x{}", bare.to_ascii_lowercase()))
}
