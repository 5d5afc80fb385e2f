//! Turns user input into a canonical account address plus an optional
//! display name.
//!
//! Order of checks, first match wins:
//! 1. `0x`-prefixed 40-digit hex → address as-is (lower-cased)
//! 2. bare 40-digit hex → prefixed and lower-cased
//! 3. anything else → a name, forward-resolved through each name service
//!    in turn
//!
//! Name lookups are best-effort in both directions. Only failing to end up
//! with an address at all is an error.

use futures::FutureExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::fallback::{first_some, Attempt};
use super::RecapError;
use crate::chain::{canonical_address, ChainError, NameService};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdentity {
    /// Lower-case, `0x`-prefixed, 40 hex digits.
    pub canonical_address: String,
    pub display_name: Option<String>,
}

impl AccountIdentity {
    /// Name if known, else the address.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.canonical_address)
    }
}

pub async fn resolve_identity(
    input: &str,
    names: &[Arc<dyn NameService>],
    timeout: Duration,
) -> Result<AccountIdentity, RecapError> {
    let trimmed = input.trim();

    // Prefixed and bare hex both normalize here.
    if let Some(address) = canonical_address(trimmed) {
        let display_name = reverse_lookup(&address, names, timeout).await;
        info!(address = %address, name = ?display_name, "resolved address input");
        return Ok(AccountIdentity {
            canonical_address: address,
            display_name,
        });
    }

    let name = trimmed.to_lowercase();
    if !name.is_empty() {
        if let Some(address) = forward_lookup(&name, names, timeout).await {
            info!(name = %name, address = %address, "resolved name input");
            return Ok(AccountIdentity {
                canonical_address: address,
                display_name: Some(name),
            });
        }
    }

    debug!(input = %input, "no address for input");
    Err(RecapError::UnresolvableIdentity {
        input: input.to_string(),
    })
}

async fn reverse_lookup(
    address: &str,
    names: &[Arc<dyn NameService>],
    timeout: Duration,
) -> Option<String> {
    let attempts: Vec<Attempt<'_, String>> = names
        .iter()
        .map(|service| {
            async move {
                let name = service.reverse_lookup(address).await?;
                Ok::<_, ChainError>(name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()))
            }
            .boxed()
        })
        .collect();
    first_some("reverse name", attempts, timeout).await
}

/// A resolved address only counts if it is itself a well-formed address.
async fn forward_lookup(
    name: &str,
    names: &[Arc<dyn NameService>],
    timeout: Duration,
) -> Option<String> {
    let attempts: Vec<Attempt<'_, String>> = names
        .iter()
        .map(|service| {
            async move {
                let address = service.forward_lookup(name).await?;
                Ok::<_, ChainError>(address.as_deref().and_then(canonical_address))
            }
            .boxed()
        })
        .collect();
    first_some("forward name", attempts, timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fake::FakeChain;

    const TIMEOUT: Duration = Duration::from_secs(1);
    const ADDR: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";

    fn services(chains: Vec<FakeChain>) -> Vec<Arc<dyn NameService>> {
        chains
            .into_iter()
            .map(|c| Arc::new(c) as Arc<dyn NameService>)
            .collect()
    }

    #[tokio::test]
    async fn test_prefixed_hex_is_lowercased() {
        let names = services(vec![FakeChain::new()]);
        let id = resolve_identity("0xD8dA6BF26964aF9D7eEd9e03E53415D37aA96045", &names, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(id.canonical_address, ADDR);
        assert_eq!(id.display_name, None);
        assert_eq!(id.label(), ADDR);
    }

    #[tokio::test]
    async fn test_bare_hex_gets_prefix() {
        let names = services(vec![FakeChain::new()]);
        let id = resolve_identity("  D8DA6BF26964AF9D7EED9E03E53415D37AA96045 ", &names, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(id.canonical_address, ADDR);
    }

    #[tokio::test]
    async fn test_reverse_name_attached_when_available() {
        let names = services(vec![
            FakeChain::new().failing_names(),
            FakeChain::new().with_reverse(ADDR, "vitalik.eth"),
        ]);
        let id = resolve_identity(ADDR, &names, TIMEOUT).await.unwrap();
        assert_eq!(id.display_name.as_deref(), Some("vitalik.eth"));
        assert_eq!(id.label(), "vitalik.eth");
    }

    #[tokio::test]
    async fn test_reverse_lookup_stops_at_first_name() {
        let first = Arc::new(FakeChain::new().failing_names());
        let second = Arc::new(FakeChain::new().with_reverse(ADDR, "vitalik.eth"));
        let third = Arc::new(FakeChain::new());
        let names: Vec<Arc<dyn NameService>> = vec![
            first.clone() as Arc<dyn NameService>,
            second.clone() as Arc<dyn NameService>,
            third.clone() as Arc<dyn NameService>,
        ];

        let id = resolve_identity(ADDR, &names, TIMEOUT).await.unwrap();
        assert_eq!(id.display_name.as_deref(), Some("vitalik.eth"));
        assert_eq!(FakeChain::calls(&first.name_calls), 1);
        assert_eq!(FakeChain::calls(&second.name_calls), 1);
        assert_eq!(FakeChain::calls(&third.name_calls), 0);
    }

    #[tokio::test]
    async fn test_reverse_failure_is_not_fatal() {
        let names = services(vec![FakeChain::new().failing_names()]);
        let id = resolve_identity(ADDR, &names, TIMEOUT).await.unwrap();
        assert_eq!(id.canonical_address, ADDR);
        assert_eq!(id.display_name, None);
    }

    #[tokio::test]
    async fn test_name_resolves_through_second_strategy() {
        let names = services(vec![
            FakeChain::new(),
            FakeChain::new().with_name("jesse.base.eth", "0xAAAAaaaaAAAAaaaaAAAAaaaaAAAAaaaaAAAAaaaa"),
        ]);
        let id = resolve_identity("Jesse.Base.eth", &names, TIMEOUT).await.unwrap();
        assert_eq!(
            id.canonical_address,
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        );
        assert_eq!(id.display_name.as_deref(), Some("jesse.base.eth"));
    }

    #[tokio::test]
    async fn test_malformed_forward_record_is_ignored() {
        let names = services(vec![FakeChain::new().with_name("broken.eth", "0x1234")]);
        let err = resolve_identity("broken.eth", &names, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, RecapError::UnresolvableIdentity { .. }));
    }

    #[tokio::test]
    async fn test_unresolvable_name_echoes_input() {
        let names = services(vec![FakeChain::new().failing_names(), FakeChain::new()]);
        let err = resolve_identity("nobody.eth", &names, TIMEOUT).await.unwrap_err();
        match err {
            RecapError::UnresolvableIdentity { input } => assert_eq!(input, "nobody.eth"),
        }

        let err = resolve_identity("   ", &names, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, RecapError::UnresolvableIdentity { .. }));
    }

    #[tokio::test]
    async fn test_short_hex_is_treated_as_name() {
        let names = services(vec![FakeChain::new().with_name("0xabc", ADDR)]);
        let id = resolve_identity("0xABC", &names, TIMEOUT).await.unwrap();
        assert_eq!(id.canonical_address, ADDR);
        assert_eq!(id.display_name.as_deref(), Some("0xabc"));
    }
}
