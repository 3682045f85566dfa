//! secp256k1 key primitives.
//!
//! Public keys travel as the SEC1 uncompressed encoding: a `0x04` prefix
//! followed by the 32-byte X and Y coordinates, 65 bytes in total or 130
//! hex characters.

use crate::error::ExchangeError;
use k256::ecdh::diffie_hellman;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::zeroize::Zeroize;
use k256::{PublicKey, SecretKey};
use rand::{rngs::OsRng, RngCore};
use std::fmt;

/// Leading byte of an uncompressed SEC1 point.
pub const UNCOMPRESSED_PREFIX: u8 = 0x04;

/// Length in bytes of an uncompressed secp256k1 public key.
pub const UNCOMPRESSED_KEY_LEN: usize = 65;

/// Length of the hex form of an uncompressed public key.
pub const UNCOMPRESSED_KEY_HEX_LEN: usize = UNCOMPRESSED_KEY_LEN * 2;

/// A secp256k1 key pair. The private half is zeroized on drop.
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Uncompressed public key as lowercase hex.
    pub fn public_key_hex(&self) -> String {
        encode_public_key(&self.public)
    }

    /// ECDH with a peer's public key.
    ///
    /// Returns the X coordinate of the shared point as lowercase hex, the same
    /// value the peer computes from its own private key and our public key.
    pub fn diffie_hellman(&self, peer: &PublicKey) -> String {
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), peer.as_affine());
        hex::encode(shared.raw_secret_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Generate a fresh key pair from the OS random source.
pub fn generate_key_pair() -> Result<KeyPair, ExchangeError> {
    let mut bytes = [0u8; 32];
    loop {
        OsRng.try_fill_bytes(&mut bytes)?;
        // Zero or >= curve order; vanishingly rare, draw again.
        if let Ok(secret) = SecretKey::from_slice(&bytes) {
            bytes.zeroize();
            let public = secret.public_key();
            return Ok(KeyPair { secret, public });
        }
    }
}

/// Whether `bytes` is an uncompressed encoding of a point on secp256k1.
pub fn validate_public_key(bytes: &[u8]) -> bool {
    bytes.len() == UNCOMPRESSED_KEY_LEN
        && bytes[0] == UNCOMPRESSED_PREFIX
        && PublicKey::from_sec1_bytes(bytes).is_ok()
}

/// Parse a hex-encoded uncompressed public key supplied by a client.
pub fn parse_public_key_hex(encoded: &str) -> Result<PublicKey, ExchangeError> {
    if encoded.len() != UNCOMPRESSED_KEY_HEX_LEN || !encoded.starts_with("04") {
        return Err(ExchangeError::validation(format!(
            "Public key must be {} hex characters starting with 04",
            UNCOMPRESSED_KEY_HEX_LEN
        )));
    }

    let bytes = hex::decode(encoded)
        .map_err(|e| ExchangeError::validation(format!("Public key is not valid hex: {}", e)))?;

    if !validate_public_key(&bytes) {
        return Err(ExchangeError::validation(
            "Public key is not a point on secp256k1",
        ));
    }

    PublicKey::from_sec1_bytes(&bytes)
        .map_err(|_| ExchangeError::validation("Public key is not a point on secp256k1"))
}

/// Uncompressed hex encoding of a public key.
pub fn encode_public_key(key: &PublicKey) -> String {
    hex::encode(key.to_encoded_point(false).as_bytes())
}
