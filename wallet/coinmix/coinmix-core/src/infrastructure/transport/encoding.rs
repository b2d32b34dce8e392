use super::messages::ProtocolMessage;
use crate::foundation::MixError;
use bincode::Options;

pub const WIRE_PROTOCOL_VERSION_V1: u16 = 1;

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

pub fn encode_message(message: &ProtocolMessage) -> Result<Vec<u8>, MixError> {
    let body = wire_options().serialize(message).map_err(|err| crate::serde_err!("bincode", err))?;
    let mut out = Vec::with_capacity(body.len() + 2);
    out.extend_from_slice(&WIRE_PROTOCOL_VERSION_V1.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

pub fn decode_message(bytes: &[u8]) -> Result<ProtocolMessage, MixError> {
    if bytes.len() < 2 {
        return Err(MixError::EncodingError("protocol message too short".to_string()));
    }
    let version = u16::from_le_bytes([bytes[0], bytes[1]]);
    if version != WIRE_PROTOCOL_VERSION_V1 {
        return Err(MixError::EncodingError(format!(
            "wire protocol version mismatch: expected {WIRE_PROTOCOL_VERSION_V1}, got {version}"
        )));
    }
    wire_options().deserialize(&bytes[2..]).map_err(|err| crate::serde_err!("bincode", err))
}
