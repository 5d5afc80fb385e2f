//! Block timestamp lookups over JSON-RPC.

use alloy::eips::BlockNumberOrTag;
use alloy::providers::{Provider, RootProvider};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use super::{BlockClock, ChainError, ChainResult, Network, PerNetwork};

/// Build an HTTP provider for `url`. No request is made until first use.
pub fn http_provider(url: &str) -> ChainResult<RootProvider> {
    let url = url
        .parse()
        .map_err(|e| ChainError::Decode(format!("invalid rpc url: {e}")))?;
    Ok(RootProvider::new_http(url))
}

/// Reads block headers from one provider per network.
#[derive(Clone)]
pub struct RpcBlockClock {
    providers: PerNetwork<RootProvider>,
}

impl RpcBlockClock {
    pub fn new(providers: PerNetwork<RootProvider>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl BlockClock for RpcBlockClock {
    async fn block_timestamp(
        &self,
        block: u64,
        network: Network,
    ) -> ChainResult<Option<DateTime<Utc>>> {
        let header = self
            .providers
            .get(network)
            .get_block_by_number(BlockNumberOrTag::Number(block))
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        Ok(header.and_then(|b| unix_to_utc(b.header.timestamp)))
    }
}

fn unix_to_utc(secs: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(secs).ok()?;
    Utc.timestamp_opt(secs, 0).single()
}
