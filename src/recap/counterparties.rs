use serde::Serialize;
use std::collections::HashMap;

use crate::chain::RawTransfer;

/// Characters of the identifier kept in a label (`0x` plus 8 hex digits).
const LABEL_PREFIX_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterpartyRank {
    pub counterparty_label: String,
    pub interaction_count: u64,
}

/// Count transfers per counterparty and keep the `top_k` busiest.
///
/// Ties keep the order in which the counterparty first appeared in
/// `transfers`. Transfers without a counterparty are ignored.
pub fn rank_counterparties<'a>(
    transfers: impl IntoIterator<Item = &'a RawTransfer>,
    top_k: usize,
) -> Vec<CounterpartyRank> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, u64> = HashMap::new();

    for counterparty in transfers.into_iter().filter_map(|t| t.counterparty.as_deref()) {
        let count = counts.entry(counterparty).or_insert_with(|| {
            order.push(counterparty);
            0
        });
        *count += 1;
    }

    let mut ranked: Vec<(&str, u64)> = order.into_iter().map(|c| (c, counts[c])).collect();
    // Stable, so first-seen order survives among equal counts.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    ranked
        .into_iter()
        .take(top_k)
        .map(|(counterparty, interaction_count)| CounterpartyRank {
            counterparty_label: short_label(counterparty),
            interaction_count,
        })
        .collect()
}

/// `0x1234abcd...` style label.
pub fn short_label(id: &str) -> String {
    let prefix: String = id.chars().take(LABEL_PREFIX_LEN).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{AssetKind, Network};

    fn transfer(counterparty: Option<&str>) -> RawTransfer {
        RawTransfer {
            block: 1,
            counterparty: counterparty.map(str::to_string),
            network: Network::Primary,
            kind: AssetKind::Native,
        }
    }

    const A: &str = "0xaaaaaaaa11111111111111111111111111111111";
    const B: &str = "0xbbbbbbbb22222222222222222222222222222222";
    const C: &str = "0xcccccccc33333333333333333333333333333333";

    #[test]
    fn test_short_label() {
        assert_eq!(short_label(A), "0xaaaaaaaa...");
        assert_eq!(short_label("0xab"), "0xab...");
    }

    #[test]
    fn test_ranking_descending_with_stable_ties() {
        let transfers = vec![
            transfer(Some(C)),
            transfer(Some(A)),
            transfer(None),
            transfer(Some(B)),
            transfer(Some(A)),
            transfer(Some(B)),
            transfer(None),
            transfer(None),
        ];

        let ranked = rank_counterparties(&transfers, 5);
        let got: Vec<(&str, u64)> = ranked
            .iter()
            .map(|r| (r.counterparty_label.as_str(), r.interaction_count))
            .collect();
        // A and B tie at 2; A was seen first.
        assert_eq!(
            got,
            vec![("0xaaaaaaaa...", 2), ("0xbbbbbbbb...", 2), ("0xcccccccc...", 1)]
        );
    }

    #[test]
    fn test_top_k_limit() {
        let ids: Vec<String> = (0..8).map(|i| format!("0x{i:040x}")).collect();
        let transfers: Vec<RawTransfer> = ids.iter().map(|id| transfer(Some(id))).collect();

        let ranked = rank_counterparties(&transfers, 5);
        assert_eq!(ranked.len(), 5);
        assert!(ranked.windows(2).all(|w| w[0].interaction_count >= w[1].interaction_count));
        assert!(rank_counterparties(&transfers, 0).is_empty());
    }

    #[test]
    fn test_no_counterparties() {
        let transfers = vec![transfer(None), transfer(None)];
        assert!(rank_counterparties(&transfers, 5).is_empty());
    }

    #[test]
    fn test_union_across_networks() {
        let primary = vec![transfer(Some(A))];
        let mut on_secondary = transfer(Some(A));
        on_secondary.network = Network::Secondary;
        let secondary = vec![on_secondary, transfer(Some(B))];

        let ranked = rank_counterparties(primary.iter().chain(secondary.iter()), 5);
        assert_eq!(ranked[0].interaction_count, 2);
        assert_eq!(ranked[1].counterparty_label, "0xbbbbbbbb...");
    }
}
