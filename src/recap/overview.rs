//! Aggregate record assembly.
//!
//! Nothing here derives analytics; the pipeline hands in finished pieces
//! and this module only shapes them into `WalletRecap`. The notable asset
//! lookup sits here too since it only feeds the overview.

use futures::FutureExt;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;

use super::counterparties::CounterpartyRank;
use super::fallback::{first_some, Attempt};
use super::identity::AccountIdentity;
use super::timeline::TimeBucketCount;
use crate::chain::{AssetDirectory, ChainError, Network};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletOverview {
    pub age_in_days: u64,
    pub total_transactions: u64,
    pub estimated_cost_in_native_units: Decimal,
    pub secondary_network_transactions: u64,
    pub secondary_network_launch_participant: bool,
    pub notable_asset: String,
}

/// The one result shape handed to renderers and summarizers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecap {
    pub identity: AccountIdentity,
    pub overview: WalletOverview,
    pub history: Vec<TimeBucketCount>,
    pub top_counterparties: Vec<CounterpartyRank>,
}

/// Inputs for `build_recap`, already computed upstream.
#[derive(Debug, Clone)]
pub struct RecapParts {
    pub identity: AccountIdentity,
    pub total_transactions: u64,
    pub secondary_transactions: u64,
    pub estimated_cost: Decimal,
    pub history: Vec<TimeBucketCount>,
    pub age_in_days: u64,
    pub launch_participant: bool,
    pub top_counterparties: Vec<CounterpartyRank>,
    pub notable_asset: String,
}

pub fn build_recap(parts: RecapParts) -> WalletRecap {
    WalletRecap {
        identity: parts.identity,
        overview: WalletOverview {
            age_in_days: parts.age_in_days,
            total_transactions: parts.total_transactions,
            estimated_cost_in_native_units: parts.estimated_cost,
            secondary_network_transactions: parts.secondary_transactions,
            secondary_network_launch_participant: parts.launch_participant,
            notable_asset: parts.notable_asset,
        },
        history: parts.history,
        top_counterparties: parts.top_counterparties,
    }
}

/// Flat per-transaction estimate. Negative fees are treated as zero.
pub fn estimated_cost(total_transactions: u64, fee_per_transaction: Decimal) -> Decimal {
    let fee = fee_per_transaction.max(Decimal::ZERO);
    Decimal::from(total_transactions)
        .checked_mul(fee)
        .unwrap_or(Decimal::MAX)
}

/// First displayable owned asset, primary network before secondary, else
/// `fallback`.
pub async fn notable_asset(
    account: &str,
    assets: &dyn AssetDirectory,
    timeout: Duration,
    fallback: &str,
) -> String {
    let attempts: Vec<Attempt<'_, String>> = Network::ALL
        .into_iter()
        .map(|network| {
            async move {
                let owned = assets.owned_assets(account, network).await?;
                Ok::<_, ChainError>(owned.iter().find_map(|a| a.display_name()))
            }
            .boxed()
        })
        .collect();

    first_some("notable asset", attempts, timeout)
        .await
        .unwrap_or_else(|| fallback.to_string())
}
