//! Address codec and argument parsers.
//!
//! The escrow contracts pack addresses into `uint256` words (the low 160
//! bits), and deploy escrows as deterministic clones whose addresses follow
//! the create2 rule:
//!
//! ```text
//! address = keccak256(0xff ++ deployer ++ salt ++ keccak256(init_code))[12..]
//! ```

use alloy_primitives::{Address, B256, U256};
use serde_json::Value;
use tiny_keccak::{Hasher, Keccak};

/// EIP-1167 clone creation code, up to the 20-byte implementation address.
const PROXY_PREFIX: [u8; 20] = [
    0x3d, 0x60, 0x2d, 0x80, 0x60, 0x0a, 0x3d, 0x39, 0x81, 0xf3, // creation
    0x36, 0x3d, 0x3d, 0x37, 0x3d, 0x3d, 0x3d, 0x36, 0x3d, 0x73, // runtime head
];

/// EIP-1167 runtime tail following the implementation address.
const PROXY_SUFFIX: [u8; 15] = [
    0x5a, 0xf4, 0x3d, 0x82, 0x80, 0x3e, 0x90, 0x3d, 0x91, 0x60, 0x2b, 0x57, 0xfd, 0x5b, 0xf3,
];

/// keccak256 of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// Decode an address packed into the low 160 bits of a `uint256`.
///
/// Higher bits are discarded, so every input yields an address.
pub fn decode_packed_address(value: U256) -> String {
    let word: [u8; 32] = value.to_be_bytes::<32>();
    format!("0x{}", hex::encode(&word[12..]))
}

/// Compute the create2 deployment address for `factory`, `salt` and the
/// hash of the deployed init code.
pub fn compute_deployment_address(factory: Address, salt: B256, init_code_hash: B256) -> String {
    let mut preimage = [0u8; 85];
    preimage[0] = 0xff;
    preimage[1..21].copy_from_slice(factory.as_slice());
    preimage[21..53].copy_from_slice(salt.as_slice());
    preimage[53..85].copy_from_slice(init_code_hash.as_slice());
    let digest = keccak256(&preimage);
    format!("0x{}", hex::encode(&digest[12..]))
}

/// Init code hash of an EIP-1167 minimal proxy pointing at `implementation`.
pub fn minimal_proxy_init_code_hash(implementation: Address) -> B256 {
    let mut code = Vec::with_capacity(55);
    code.extend_from_slice(&PROXY_PREFIX);
    code.extend_from_slice(implementation.as_slice());
    code.extend_from_slice(&PROXY_SUFFIX);
    B256::from(keccak256(&code))
}

/// Lowercase a `0x`-prefixed hex identifier so keys compare byte-for-byte.
pub fn normalize_hex(s: &str) -> String {
    let body = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    format!("0x{}", body.to_ascii_lowercase())
}

// ─── Argument parsers ────────────────────────────────────────────────────────

/// Parse an integer argument: JSON number, decimal string, or `0x` hex string.
pub fn parse_u256(value: &Value) -> Result<U256, String> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| format!("not an unsigned integer: {n}")),
        Value::String(s) => {
            let parsed = match s.strip_prefix("0x") {
                Some("") => return Err("empty hex integer".into()),
                Some(hex) => U256::from_str_radix(hex, 16),
                None => U256::from_str_radix(s, 10),
            };
            parsed.map_err(|e| format!("invalid integer '{s}': {e}"))
        }
        other => Err(format!("expected integer, got {other}")),
    }
}

/// Parse a 32-byte hash argument into canonical lowercase hex.
pub fn parse_b256(value: &Value) -> Result<String, String> {
    parse_fixed_hex(value, 32)
}

/// Parse a 20-byte address argument into canonical lowercase hex.
pub fn parse_address(value: &Value) -> Result<String, String> {
    parse_fixed_hex(value, 20)
}

fn parse_fixed_hex(value: &Value, len: usize) -> Result<String, String> {
    let s = value
        .as_str()
        .ok_or_else(|| format!("expected hex string, got {value}"))?;
    let body = s.strip_prefix("0x").unwrap_or(s);
    if body.len() != len * 2 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("expected {len}-byte hex value, got '{s}'"));
    }
    Ok(format!("0x{}", body.to_ascii_lowercase()))
}
