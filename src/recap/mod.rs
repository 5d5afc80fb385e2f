//! Wallet recap pipeline.
//!
//! raw input → identity → per-network transfers → timeline, counterparty
//! ranking, launch participation → `WalletRecap`.
//!
//! Only identity resolution can fail the request. Every later stage
//! degrades: an unavailable network, block or asset lookup just drops the
//! affected data point.

pub mod collector;
pub mod counterparties;
pub mod fallback;
pub mod identity;
pub mod overview;
pub mod participation;
pub mod timeline;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::chain::{AssetDirectory, BlockClock, NameService, TransferSource};
use crate::config::RecapConfig;

pub use counterparties::CounterpartyRank;
pub use identity::AccountIdentity;
pub use overview::{WalletOverview, WalletRecap};
pub use timeline::TimeBucketCount;

#[derive(Error, Debug)]
pub enum RecapError {
    #[error("could not resolve an address for {input:?}")]
    UnresolvableIdentity { input: String },
}

/// External lookups the pipeline depends on. Name services are tried in
/// order.
#[derive(Clone)]
pub struct Capabilities {
    pub names: Vec<Arc<dyn NameService>>,
    pub transfers: Arc<dyn TransferSource>,
    pub clock: Arc<dyn BlockClock>,
    pub assets: Arc<dyn AssetDirectory>,
}

/// Stateless per request; one instance can serve concurrent recaps.
pub struct RecapPipeline {
    caps: Capabilities,
    settings: RecapConfig,
}

impl RecapPipeline {
    pub fn new(caps: Capabilities, settings: RecapConfig) -> Self {
        Self { caps, settings }
    }

    pub async fn run(&self, input: &str) -> Result<WalletRecap, RecapError> {
        self.run_at(input, Utc::now()).await
    }

    /// Same as `run` with an explicit clock for the history window and age.
    pub async fn run_at(&self, input: &str, now: DateTime<Utc>) -> Result<WalletRecap, RecapError> {
        let timeout = self.settings.request_timeout();

        let identity = match identity::resolve_identity(input, &self.caps.names, timeout).await {
            Ok(id) => id,
            Err(e) => {
                warn!(input = %input, "identity unresolved, skipping recap");
                return Err(e);
            }
        };
        let account = identity.canonical_address.as_str();

        let transfers = collector::collect_transfers(
            account,
            self.caps.transfers.as_ref(),
            self.settings.max_transfers,
            self.settings.collect_timeout(),
        )
        .await;

        let timeline_settings = timeline::TimelineSettings {
            window_months: self.settings.history_months,
            concurrency: self.settings.lookup_concurrency,
            timeout,
        };
        // Asset lookup only needs the address, so it overlaps with block lookups.
        let (timeline, notable_asset) = tokio::join!(
            timeline::index_transfers(&transfers, self.caps.clock.as_ref(), now, timeline_settings),
            overview::notable_asset(
                account,
                self.caps.assets.as_ref(),
                timeout,
                &self.settings.notable_asset_fallback,
            ),
        );

        let top_counterparties = counterparties::rank_counterparties(
            transfers.primary.iter().chain(transfers.secondary.iter()),
            self.settings.top_counterparties,
        );

        let launch_participant = participation::is_launch_participant(
            &transfers.secondary,
            timeline.first_seen_by_network.secondary,
            self.settings.secondary_launch,
            self.settings.launch_grace(),
        );

        let transfer_counts = transfers.map(|_, list| list.len() as u64);
        let total_transactions = transfer_counts.primary + transfer_counts.secondary;
        let estimated_cost =
            overview::estimated_cost(total_transactions, self.settings.fee_per_transaction);
        info!(
            account = %account,
            primary = transfer_counts.primary,
            secondary = transfer_counts.secondary,
            age_days = timeline.age_days,
            launch_participant,
            "recap complete"
        );

        Ok(overview::build_recap(overview::RecapParts {
            identity,
            total_transactions,
            secondary_transactions: transfer_counts.secondary,
            estimated_cost,
            history: timeline.history,
            age_in_days: timeline.age_days,
            launch_participant,
            top_counterparties,
            notable_asset,
        }))
    }
}
