use chrono::{DateTime, Duration, Utc};

use crate::chain::RawTransfer;

/// Whether the account showed up on the secondary network during its launch
/// window `[launch, launch + grace)`.
///
/// `earliest` is the earliest resolved timestamp among `secondary_transfers`.
/// No transfers, or no resolvable timestamp, means no participation.
pub fn is_launch_participant(
    secondary_transfers: &[RawTransfer],
    earliest: Option<DateTime<Utc>>,
    launch: DateTime<Utc>,
    grace: Duration,
) -> bool {
    if secondary_transfers.is_empty() {
        return false;
    }
    match earliest {
        Some(at) => at >= launch && at < launch + grace,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fake::day;
    use crate::chain::{AssetKind, Network};

    fn one_transfer() -> Vec<RawTransfer> {
        vec![RawTransfer {
            block: 100,
            counterparty: None,
            network: Network::Secondary,
            kind: AssetKind::Fungible,
        }]
    }

    #[test]
    fn test_window_bounds() {
        let launch = day(2023, 8, 9);
        let grace = Duration::days(30);
        let transfers = one_transfer();

        assert!(is_launch_participant(&transfers, Some(launch), launch, grace));
        assert!(is_launch_participant(&transfers, Some(day(2023, 9, 7)), launch, grace));
        // Upper bound is exclusive.
        assert!(!is_launch_participant(&transfers, Some(day(2023, 9, 8)), launch, grace));
        assert!(!is_launch_participant(&transfers, Some(day(2023, 8, 8)), launch, grace));
    }

    #[test]
    fn test_absence_is_false() {
        let launch = day(2023, 8, 9);
        let grace = Duration::days(30);

        assert!(!is_launch_participant(&[], Some(launch), launch, grace));
        assert!(!is_launch_participant(&one_transfer(), None, launch, grace));
    }
}
