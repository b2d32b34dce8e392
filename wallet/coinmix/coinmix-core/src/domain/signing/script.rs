//! Input authorization for pay-to-key-id outputs.

use crate::domain::hashes::input_signature_hash;
use crate::domain::signing::message::MessageSigner;
use crate::domain::transaction::{extract_pay_to_key, Transaction};
use crate::foundation::{MixError, SigningKeypair};

/// Produce the script signature for `tx.inputs[input_index]`.
pub fn sign_input(tx: &Transaction, input_index: usize, keypair: &SigningKeypair) -> Result<Vec<u8>, MixError> {
    let digest = input_signature_hash(tx, input_index).ok_or(MixError::ScriptVerificationFailed { input_index })?;
    MessageSigner::sign(&digest, keypair)
}

/// Check `script_sig` unlocks `prev_script` for input `input_index` of `tx`.
pub fn verify_input_script(script_sig: &[u8], prev_script: &[u8], tx: &Transaction, input_index: usize) -> bool {
    let Some(expected) = extract_pay_to_key(prev_script) else {
        return false;
    };
    let Some(digest) = input_signature_hash(tx, input_index) else {
        return false;
    };
    MessageSigner::verify(&digest, script_sig, &expected)
}
