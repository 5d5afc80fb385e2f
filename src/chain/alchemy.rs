//! Alchemy-backed transfer source and asset directory.
//!
//! Transfers come from the `alchemy_getAssetTransfers` JSON-RPC method,
//! paged 1000 at a time until `max_count` is reached or the cursor runs
//! out. Each page is its own call with its own timeout; a page that fails
//! after earlier pages succeeded ends paging but keeps what was fetched.
//! Owned assets come from the NFT API v3 `getNFTsForOwner` endpoint.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    canonical_address, AssetDirectory, AssetKind, ChainError, ChainResult, Network, OwnedAsset,
    PerNetwork, RawTransfer, TransferSource,
};

/// Largest page `alchemy_getAssetTransfers` will return.
const MAX_PAGE_SIZE: usize = 1000;

/// Owned assets requested per lookup. Only the first usable one is shown.
const NFT_PAGE_SIZE: usize = 10;

/// Endpoints for one network.
#[derive(Debug, Clone)]
pub struct AlchemyEndpoints {
    pub rpc_url: String,
    pub nft_api_url: String,
}

#[derive(Clone)]
pub struct AlchemyClient {
    http: Client,
    endpoints: PerNetwork<AlchemyEndpoints>,
    page_timeout: Duration,
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransfersPage {
    #[serde(default)]
    transfers: Vec<AlchemyTransfer>,
    #[serde(default)]
    page_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlchemyTransfer {
    block_num: String,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    category: String,
    #[serde(default)]
    raw_contract: Option<RawContract>,
}

#[derive(Debug, Deserialize)]
struct RawContract {
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnedNftsPage {
    #[serde(default)]
    owned_nfts: Vec<AlchemyNft>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlchemyNft {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    contract: Option<NftContract>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NftContract {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    open_sea_metadata: Option<OpenSeaMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenSeaMetadata {
    #[serde(default)]
    collection_name: Option<String>,
}

// ─── Client ──────────────────────────────────────────────────────────────────

impl AlchemyClient {
    pub fn new(
        http: Client,
        endpoints: PerNetwork<AlchemyEndpoints>,
        page_timeout: Duration,
    ) -> Self {
        Self {
            http,
            endpoints,
            page_timeout,
        }
    }

    async fn transfer_page(
        &self,
        account: &str,
        network: Network,
        page_size: usize,
        page_key: Option<String>,
    ) -> ChainResult<TransfersPage> {
        let mut params = json!({
            "fromBlock": "0x0",
            "toBlock": "latest",
            "toAddress": account,
            "category": AssetKind::ALL.iter().map(|k| category_name(*k)).collect::<Vec<_>>(),
            "order": "desc",
            "withMetadata": false,
            "excludeZeroValue": true,
            "maxCount": format!("{:#x}", page_size),
        });
        if let Some(key) = page_key {
            params["pageKey"] = json!(key);
        }
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "alchemy_getAssetTransfers",
            "params": [params],
        });

        let url = &self.endpoints.get(network).rpc_url;
        let resp = self.http.post(url).json(&body).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ChainError::Unsupported { network });
        }
        let text = resp.error_for_status()?.text().await?;
        parse_rpc_result(&text, network)
    }
}

#[async_trait]
impl TransferSource for AlchemyClient {
    async fn incoming_transfers(
        &self,
        account: &str,
        network: Network,
        max_count: usize,
    ) -> ChainResult<Vec<RawTransfer>> {
        collect_pages(network, max_count, self.page_timeout, |page_size, page_key| {
            self.transfer_page(account, network, page_size, page_key)
        })
        .await
    }
}

/// Drive `fetch_page(page_size, page_key)` until `max_count` transfers are
/// collected or the cursor runs out.
///
/// Every page gets `page_timeout` to itself. An error on the first page is
/// returned; a later error stops paging and keeps the pages already read.
async fn collect_pages<F, Fut>(
    network: Network,
    max_count: usize,
    page_timeout: Duration,
    mut fetch_page: F,
) -> ChainResult<Vec<RawTransfer>>
where
    F: FnMut(usize, Option<String>) -> Fut,
    Fut: Future<Output = ChainResult<TransfersPage>>,
{
    let mut transfers: Vec<RawTransfer> = Vec::new();
    let mut page_key: Option<String> = None;
    let mut pages = 0usize;

    while transfers.len() < max_count {
        let page_size = (max_count - transfers.len()).min(MAX_PAGE_SIZE);
        let result = tokio::time::timeout(page_timeout, fetch_page(page_size, page_key.take()))
            .await
            .unwrap_or_else(|_| Err(ChainError::Timeout(page_timeout)));

        let page = match result {
            Ok(page) => page,
            Err(e) if pages == 0 => return Err(e),
            Err(e) => {
                warn!(
                    network = %network,
                    pages,
                    kept = transfers.len(),
                    error = %e,
                    "transfer page failed, keeping earlier pages"
                );
                break;
            }
        };
        pages += 1;

        let before = transfers.len();
        transfers.extend(
            page.transfers
                .iter()
                .filter_map(|t| to_raw_transfer(t, network)),
        );
        debug!(
            network = %network,
            page = transfers.len() - before,
            total = transfers.len(),
            "fetched transfer page"
        );

        match page.page_key {
            Some(key) if !key.is_empty() => page_key = Some(key),
            _ => break,
        }
    }

    transfers.truncate(max_count);
    Ok(transfers)
}

#[async_trait]
impl AssetDirectory for AlchemyClient {
    async fn owned_assets(&self, account: &str, network: Network) -> ChainResult<Vec<OwnedAsset>> {
        let url = format!(
            "{}/getNFTsForOwner?owner={}&withMetadata=true&pageSize={}&excludeFilters[]=SPAM",
            self.endpoints.get(network).nft_api_url,
            account,
            NFT_PAGE_SIZE
        );
        let resp = self.http.get(&url).send().await?;
        if matches!(resp.status(), StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST) {
            return Err(ChainError::Unsupported { network });
        }
        let text = resp.error_for_status()?.text().await?;
        parse_owned_assets(&text)
    }
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

fn category_name(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::Native => "external",
        AssetKind::Fungible => "erc20",
        AssetKind::NonFungible => "erc721",
        AssetKind::MultiToken => "erc1155",
    }
}

fn parse_category(category: &str) -> Option<AssetKind> {
    match category {
        "external" => Some(AssetKind::Native),
        "erc20" => Some(AssetKind::Fungible),
        "erc721" => Some(AssetKind::NonFungible),
        "erc1155" => Some(AssetKind::MultiToken),
        _ => None,
    }
}

/// Unwrap a JSON-RPC envelope, mapping "not supported" errors to
/// `ChainError::Unsupported`.
fn parse_rpc_result<T: DeserializeOwned>(text: &str, network: Network) -> ChainResult<T> {
    let resp: RpcResponse<T> =
        serde_json::from_str(text).map_err(|e| ChainError::Decode(e.to_string()))?;

    if let Some(err) = resp.error {
        let msg = err.message.to_ascii_lowercase();
        if msg.contains("not supported") || msg.contains("unsupported") {
            return Err(ChainError::Unsupported { network });
        }
        return Err(ChainError::Rpc {
            code: err.code,
            message: err.message,
        });
    }

    resp.result
        .ok_or_else(|| ChainError::Decode("response has neither result nor error".to_string()))
}

/// Transfers with an unparseable block number or an unknown category are
/// dropped. The counterparty is the token contract, or the sender for
/// native transfers.
fn to_raw_transfer(t: &AlchemyTransfer, network: Network) -> Option<RawTransfer> {
    let kind = parse_category(&t.category)?;
    let block = u64::from_str_radix(t.block_num.trim_start_matches("0x"), 16).ok()?;
    let counterparty = t
        .raw_contract
        .as_ref()
        .and_then(|c| c.address.as_deref())
        .and_then(canonical_address)
        .or_else(|| t.from.as_deref().and_then(canonical_address));

    Some(RawTransfer {
        block,
        counterparty,
        network,
        kind,
    })
}

fn parse_owned_assets(text: &str) -> ChainResult<Vec<OwnedAsset>> {
    let page: OwnedNftsPage =
        serde_json::from_str(text).map_err(|e| ChainError::Decode(e.to_string()))?;

    Ok(page
        .owned_nfts
        .into_iter()
        .map(|nft| {
            let contract = nft.contract.unwrap_or(NftContract {
                name: None,
                open_sea_metadata: None,
            });
            let collection_name = contract
                .open_sea_metadata
                .and_then(|m| m.collection_name)
                .filter(|s| !s.is_empty())
                .or(contract.name)
                .unwrap_or_default();
            OwnedAsset {
                title: nft.name.or(nft.title).unwrap_or_default(),
                collection_name,
            }
        })
        .collect())
}
