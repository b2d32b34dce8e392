use crate::foundation::util::encoding::parse_hex_32bytes;
use crate::foundation::{KeyId, MixError};
use rand::RngCore;
use secp256k1::{PublicKey, SecretKey, SECP256K1};
use zeroize::Zeroize;

const KEY_ID_DOMAIN: &[u8] = b"coinmix:key:v1:";

/// Identity of a public key, independent of how the key was encoded on the wire.
pub fn key_id(public_key: &PublicKey) -> KeyId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(KEY_ID_DOMAIN);
    hasher.update(&public_key.serialize());
    KeyId::new(*hasher.finalize().as_bytes())
}

#[derive(Clone)]
pub struct SigningKeypair {
    pub public_key: PublicKey,
    secret_bytes: [u8; 32],
}

impl SigningKeypair {
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Result<Self, MixError> {
        let secret = SecretKey::from_slice(&bytes).map_err(|err| MixError::key_operation("secret_key", err.to_string()))?;
        Ok(Self { public_key: PublicKey::from_secret_key(SECP256K1, &secret), secret_bytes: bytes })
    }

    pub fn from_secret_hex(hex: &str) -> Result<Self, MixError> {
        let mut bytes = parse_hex_32bytes(hex)?;
        let out = Self::from_secret_bytes(bytes);
        bytes.zeroize();
        out
    }

    pub fn generate<R: RngCore>(rng: &mut R) -> Self {
        loop {
            let mut bytes = [0u8; 32];
            rng.fill_bytes(&mut bytes);
            if let Ok(pair) = Self::from_secret_bytes(bytes) {
                bytes.zeroize();
                return pair;
            }
        }
    }

    pub fn to_secret_key(&self) -> Result<SecretKey, MixError> {
        SecretKey::from_slice(&self.secret_bytes).map_err(|err| MixError::key_operation("secret_key", err.to_string()))
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    pub fn key_id(&self) -> KeyId {
        key_id(&self.public_key)
    }
}

impl std::fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeypair").field("public_key", &self.public_key).finish_non_exhaustive()
    }
}

impl Drop for SigningKeypair {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl Zeroize for SigningKeypair {
    fn zeroize(&mut self) {
        self.secret_bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_secret_hex_when_zero_then_rejected() {
        assert!(SigningKeypair::from_secret_hex(&"00".repeat(32)).is_err());
        let pair = SigningKeypair::from_secret_hex(&"01".repeat(32)).expect("valid key");
        assert_eq!(pair.key_id(), key_id(&pair.public_key()));
    }

    #[test]
    fn test_key_id_differs_per_key() {
        let a = SigningKeypair::from_secret_bytes([7u8; 32]).expect("a");
        let b = SigningKeypair::from_secret_bytes([8u8; 32]).expect("b");
        assert_ne!(a.key_id(), b.key_id());
    }
}
