//! Compact recoverable signatures over protocol messages.
//!
//! A signature is 65 bytes: a header byte carrying the recovery id followed by the 64-byte
//! compact `r || s`. Verification recovers the signer's public key and compares its `KeyId`,
//! so callers only need to know the expected key identity.

use crate::domain::hashes::message_digest;
use crate::foundation::{key_id, KeyId, MixError, SigningKeypair};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, SECP256K1};

pub const COMPACT_SIGNATURE_LEN: usize = 65;
const HEADER_BASE: u8 = 27;
const HEADER_COMPRESSED: u8 = 4;

pub struct MessageSigner;

impl MessageSigner {
    pub fn sign(message: &[u8], keypair: &SigningKeypair) -> Result<Vec<u8>, MixError> {
        let digest = message_digest(message);
        let msg = Message::from_digest_slice(&digest)?;
        let secret = keypair.to_secret_key()?;
        let signature = SECP256K1.sign_ecdsa_recoverable(&msg, &secret);
        let (recovery_id, compact) = signature.serialize_compact();
        let recid = u8::try_from(recovery_id.to_i32()).map_err(|err| MixError::key_operation("recovery_id", err.to_string()))?;

        let mut out = Vec::with_capacity(COMPACT_SIGNATURE_LEN);
        out.push(HEADER_BASE + HEADER_COMPRESSED + recid);
        out.extend_from_slice(&compact);
        Ok(out)
    }

    /// Recover the identity of the key that produced `signature` over `message`.
    pub fn recover(message: &[u8], signature: &[u8]) -> Result<KeyId, MixError> {
        if signature.len() != COMPACT_SIGNATURE_LEN {
            return Err(MixError::InvalidSignature(format!("expected {} bytes, got {}", COMPACT_SIGNATURE_LEN, signature.len())));
        }
        let header = signature[0];
        if !(HEADER_BASE..HEADER_BASE + 8).contains(&header) {
            return Err(MixError::InvalidSignature(format!("bad header byte {}", header)));
        }
        let recovery_id = RecoveryId::from_i32(i32::from((header - HEADER_BASE) & 3))?;
        let signature = RecoverableSignature::from_compact(&signature[1..], recovery_id)?;
        let msg = Message::from_digest_slice(&message_digest(message))?;
        let public_key = SECP256K1.recover_ecdsa(&msg, &signature)?;
        Ok(key_id(&public_key))
    }

    /// `true` only when the signature recovers to exactly `expected`.
    pub fn verify(message: &[u8], signature: &[u8], expected: &KeyId) -> bool {
        match Self::recover(message, signature) {
            Ok(recovered) => recovered.ct_eq(expected),
            Err(_) => false,
        }
    }
}
