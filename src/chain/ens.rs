//! ENS-style name resolution over plain `eth_call`.
//!
//! Only three calls are needed, so the ABI is hand-encoded:
//! - registry `resolver(bytes32 node)` → resolver contract for a name
//! - resolver `addr(bytes32 node)` → forward record
//! - resolver `name(bytes32 node)` → reverse record on `<addr>.<namespace>`
//!
//! The reverse namespace is per registry: `addr.reverse` on mainnet ENS,
//! a coin-type namespace (ENSIP-11, e.g. `80002105.reverse` for Base) on L2
//! registries.
//!
//! A reverse name is only returned when it forward-resolves back to the
//! queried address; anyone can set an arbitrary reverse record.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use async_trait::async_trait;
use tracing::debug;

use super::{ChainError, ChainResult, NameService, Network};

// ─── Function selectors (first 4 bytes of keccak256 of the signature) ───────

/// keccak256("resolver(bytes32)")[..4]
pub const RESOLVER_SELECTOR: [u8; 4] = [0x01, 0x78, 0xb8, 0xbf];

/// keccak256("addr(bytes32)")[..4]
pub const ADDR_SELECTOR: [u8; 4] = [0x3b, 0x3b, 0x57, 0xde];

/// keccak256("name(bytes32)")[..4]
pub const NAME_SELECTOR: [u8; 4] = [0x69, 0x1f, 0x34, 0x31];

/// Compute keccak256 hash of a byte slice.
pub fn keccak256(data: &[u8]) -> B256 {
    use tiny_keccak::{Hasher, Keccak};
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    B256::from(output)
}

/// EIP-137 namehash. The empty name hashes to the zero node.
pub fn namehash(name: &str) -> B256 {
    let mut node = [0u8; 64];
    if name.is_empty() {
        return B256::ZERO;
    }
    for label in name.rsplit('.') {
        let label_hash = keccak256(label.as_bytes());
        node[32..].copy_from_slice(label_hash.as_slice());
        let next = keccak256(&node);
        node[..32].copy_from_slice(next.as_slice());
    }
    B256::from_slice(&node[..32])
}

/// Mainnet ENS reverse namespace.
pub const DEFAULT_REVERSE_NAMESPACE: &str = "addr.reverse";

/// Name whose resolver holds the reverse record for `address` under
/// `namespace`.
pub fn reverse_name(address: &str, namespace: &str) -> String {
    format!(
        "{}.{}",
        address.trim_start_matches("0x").to_ascii_lowercase(),
        namespace.trim_matches('.')
    )
}

fn encode_call(selector: [u8; 4], node: B256) -> Vec<u8> {
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&selector);
    data.extend_from_slice(node.as_slice());
    data
}

/// Decode a single ABI word holding an address. Zero means "unset".
fn decode_address_word(data: &[u8]) -> Option<Address> {
    if data.len() < 32 {
        return None;
    }
    let addr = Address::from_slice(&data[12..32]);
    (addr != Address::ZERO).then_some(addr)
}

/// Decode an ABI-encoded dynamic `string` return value.
fn decode_string(data: &[u8]) -> Option<String> {
    if data.len() < 64 {
        return None;
    }
    let offset_bytes: [u8; 32] = data[0..32].try_into().ok()?;
    let offset: usize = U256::from_be_bytes(offset_bytes).try_into().ok()?;
    let start = offset.checked_add(32)?;
    let len_bytes: [u8; 32] = data.get(offset..start)?.try_into().ok()?;
    let len: usize = U256::from_be_bytes(len_bytes).try_into().ok()?;
    if len == 0 {
        return None;
    }
    let end = start.checked_add(len)?;
    std::str::from_utf8(data.get(start..end)?)
        .ok()
        .map(|s| s.to_string())
}

fn format_address(addr: Address) -> String {
    format!("0x{}", alloy::hex::encode(addr.as_slice()))
}

// ─── Name service ────────────────────────────────────────────────────────────

/// Name service backed by a registry contract on one network.
#[derive(Clone)]
pub struct EnsNameService {
    provider: RootProvider,
    registry: Address,
    reverse_namespace: String,
    network: Network,
}

impl EnsNameService {
    pub fn new(
        provider: RootProvider,
        registry: Address,
        reverse_namespace: impl Into<String>,
        network: Network,
    ) -> Self {
        Self {
            provider,
            registry,
            reverse_namespace: reverse_namespace.into(),
            network,
        }
    }

    async fn eth_call(&self, to: Address, data: Vec<u8>) -> ChainResult<Vec<u8>> {
        let tx = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(Bytes::from(data)));
        let out = self
            .provider
            .call(tx)
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(out.to_vec())
    }

    async fn resolver(&self, node: B256) -> ChainResult<Option<Address>> {
        let out = self
            .eth_call(self.registry, encode_call(RESOLVER_SELECTOR, node))
            .await?;
        Ok(decode_address_word(&out))
    }

    async fn resolve_addr(&self, name: &str) -> ChainResult<Option<Address>> {
        let node = namehash(name);
        let Some(resolver) = self.resolver(node).await? else {
            return Ok(None);
        };
        let out = self.eth_call(resolver, encode_call(ADDR_SELECTOR, node)).await?;
        Ok(decode_address_word(&out))
    }
}

#[async_trait]
impl NameService for EnsNameService {
    async fn reverse_lookup(&self, address: &str) -> ChainResult<Option<String>> {
        let node = namehash(&reverse_name(address, &self.reverse_namespace));
        let Some(resolver) = self.resolver(node).await? else {
            return Ok(None);
        };
        let out = self.eth_call(resolver, encode_call(NAME_SELECTOR, node)).await?;
        let Some(name) = decode_string(&out) else {
            return Ok(None);
        };

        let forward = self.resolve_addr(&name).await?.map(format_address);
        if forward.as_deref() != Some(address) {
            debug!(
                network = %self.network,
                name = %name,
                "reverse record does not resolve back to address, ignoring"
            );
            return Ok(None);
        }
        Ok(Some(name))
    }

    async fn forward_lookup(&self, name: &str) -> ChainResult<Option<String>> {
        if name.is_empty() {
            return Err(ChainError::Decode("empty name".to_string()));
        }
        Ok(self.resolve_addr(name).await?.map(format_address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;

    #[test]
    fn test_selectors_match_signatures() {
        let checks = [
            ("resolver(bytes32)", RESOLVER_SELECTOR),
            ("addr(bytes32)", ADDR_SELECTOR),
            ("name(bytes32)", NAME_SELECTOR),
        ];
        for (sig, expected) in checks {
            assert_eq!(&keccak256(sig.as_bytes()).as_slice()[..4], &expected[..], "{}", sig);
        }
    }

    #[test]
    fn test_namehash_vectors() {
        assert_eq!(namehash(""), B256::ZERO);
        assert_eq!(
            namehash("eth"),
            b256!("93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae")
        );
        assert_eq!(
            namehash("foo.eth"),
            b256!("de9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f")
        );
    }

    #[test]
    fn test_reverse_name() {
        assert_eq!(
            reverse_name("0xDeaDbeefdEAdbeefdEadbEEFdeadbeEFdEaDbeeF", DEFAULT_REVERSE_NAMESPACE),
            "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef.addr.reverse"
        );
        assert_eq!(
            reverse_name("0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef", "80002105.reverse."),
            "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef.80002105.reverse"
        );
    }

    #[test]
    fn test_decode_address_word() {
        let mut word = [0u8; 32];
        assert_eq!(decode_address_word(&word), None);
        word[31] = 0x01;
        let addr = decode_address_word(&word).unwrap();
        assert_eq!(
            format_address(addr),
            "0x0000000000000000000000000000000000000001"
        );
        assert_eq!(decode_address_word(&word[..20]), None);
    }

    #[test]
    fn test_decode_string() {
        let mut data = vec![0u8; 96];
        data[31] = 0x20; // offset
        data[63] = 11; // length
        data[64..75].copy_from_slice(b"vitalik.eth");
        assert_eq!(decode_string(&data).as_deref(), Some("vitalik.eth"));

        // Zero-length reverse record means no name.
        data[63] = 0;
        assert_eq!(decode_string(&data), None);

        // Length running past the buffer.
        data[63] = 200;
        assert_eq!(decode_string(&data), None);
    }

    #[test]
    fn test_decode_string_rejects_overflowing_words() {
        let huge = (usize::MAX - 16) as u64;

        // Offset word near usize::MAX.
        let mut data = vec![0u8; 96];
        data[24..32].copy_from_slice(&huge.to_be_bytes());
        assert_eq!(decode_string(&data), None);

        // Valid offset, length word near usize::MAX.
        let mut data = vec![0u8; 96];
        data[31] = 0x20;
        data[56..64].copy_from_slice(&huge.to_be_bytes());
        assert_eq!(decode_string(&data), None);

        // Words wider than usize.
        let data = vec![0xffu8; 96];
        assert_eq!(decode_string(&data), None);
    }
}
