use crate::domain::transaction::{OutPoint, Transaction, TxIn, TxOut};
use crate::foundation::{BlockHash, Hash32, TxId};
use blake3::Hasher;

const TX_ID_DOMAIN_V1: &[u8] = b"coinmix:tx:v1:";
const SIGHASH_DOMAIN_V1: &[u8] = b"coinmix:sighash:v1:";
const MESSAGE_DOMAIN_V1: &[u8] = b"coinmix:sig:v1:";
const SCORE_DOMAIN_V1: &[u8] = b"coinmix:score:v1:";

pub fn transaction_id(tx: &Transaction) -> TxId {
    let mut buf = Vec::with_capacity(256);
    buf.extend_from_slice(TX_ID_DOMAIN_V1);
    buf.extend_from_slice(&tx.version.to_le_bytes());
    buf.extend_from_slice(&(tx.inputs.len() as u32).to_le_bytes());
    for input in &tx.inputs {
        encode_input_v1(input, true, &mut buf);
    }
    encode_outputs_v1(&tx.outputs, &mut buf);
    buf.extend_from_slice(&tx.lock_time.to_le_bytes());
    TxId::new(*blake3::hash(&buf).as_bytes())
}

/// Digest an input signature commits to: the signed input plus every output, in order.
///
/// Other inputs are excluded so each participant can sign independently of the rest.
pub fn input_signature_hash(tx: &Transaction, input_index: usize) -> Option<Hash32> {
    let input = tx.inputs.get(input_index)?;
    let mut buf = Vec::with_capacity(256);
    buf.extend_from_slice(SIGHASH_DOMAIN_V1);
    buf.extend_from_slice(&tx.version.to_le_bytes());
    encode_input_v1(input, false, &mut buf);
    encode_outputs_v1(&tx.outputs, &mut buf);
    buf.extend_from_slice(&tx.lock_time.to_le_bytes());
    Some(*blake3::hash(&buf).as_bytes())
}

/// Digest signed by `MessageSigner`.
pub fn message_digest(message: &[u8]) -> Hash32 {
    let mut hasher = Hasher::new();
    hasher.update(MESSAGE_DOMAIN_V1);
    hasher.update(&(message.len() as u64).to_le_bytes());
    hasher.update(message);
    *hasher.finalize().as_bytes()
}

/// Hash of an election reference block.
pub fn score_reference(block: &BlockHash) -> Hash32 {
    let mut hasher = Hasher::new();
    hasher.update(SCORE_DOMAIN_V1);
    hasher.update(block.as_hash());
    *hasher.finalize().as_bytes()
}

/// Hash of a relay node identity for payment scoring.
pub fn score_identity(collateral: &OutPoint) -> Hash32 {
    let mut hasher = Hasher::new();
    hasher.update(SCORE_DOMAIN_V1);
    hasher.update(collateral.txid.as_hash());
    *hasher.finalize().as_bytes()
}

fn encode_input_v1(input: &TxIn, with_script: bool, out: &mut Vec<u8>) {
    out.extend_from_slice(input.prevout.txid.as_hash());
    out.extend_from_slice(&input.prevout.index.to_le_bytes());
    if with_script {
        out.extend_from_slice(&(input.script_sig.len() as u32).to_le_bytes());
        out.extend_from_slice(&input.script_sig);
    }
    out.extend_from_slice(&input.sequence.to_le_bytes());
}

fn encode_outputs_v1(outputs: &[TxOut], out: &mut Vec<u8>) {
    out.extend_from_slice(&(outputs.len() as u32).to_le_bytes());
    for output in outputs {
        out.extend_from_slice(&output.value.to_le_bytes());
        out.extend_from_slice(&(output.script_pubkey.len() as u32).to_le_bytes());
        out.extend_from_slice(&output.script_pubkey);
    }
}
