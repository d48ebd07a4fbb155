//! Key management
//!
//! Generates Nostr key pairs and converts secret keys between their bech32
//! `nsec` encoding and raw bytes. Encoding and derivation are done by
//! `nostr-sdk`; decode errors are passed through unchanged.

use anyhow::Result;
use nostr_sdk::prelude::*;

use crate::types::GeneratedKeys;

/// Generate a fresh key pair
pub fn generate_nsec() -> Result<GeneratedKeys> {
    let keys = Keys::generate();
    let nsec = keys.secret_key().to_bech32()?;
    let pubkey = keys.public_key().to_hex();
    Ok(GeneratedKeys { nsec, pubkey })
}

/// Decode an `nsec` into the 32 raw secret key bytes
pub fn resolve_sk(nsec: &str) -> Result<[u8; 32]> {
    let secret_key = SecretKey::from_bech32(nsec)?;
    Ok(secret_key.to_secret_bytes())
}

/// Derive the hex public key for an `nsec`
pub fn pubkey_from_nsec(nsec: &str) -> Result<String> {
    Ok(signing_keys(nsec)?.public_key().to_hex())
}

/// Build signing keys from an `nsec`
pub(crate) fn signing_keys(nsec: &str) -> Result<Keys> {
    let secret_key = SecretKey::from_slice(&resolve_sk(nsec)?)?;
    Ok(Keys::new(secret_key))
}
