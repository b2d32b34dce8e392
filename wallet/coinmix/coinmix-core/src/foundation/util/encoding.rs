use crate::foundation::{Hash32, MixError};

pub fn decode_hex(s: &str) -> Result<Vec<u8>, MixError> {
    hex::decode(s.trim().trim_start_matches("0x")).map_err(|e| e.into())
}

pub fn parse_hex_32bytes(s: &str) -> Result<Hash32, MixError> {
    let bytes = decode_hex(s)?;
    bytes.as_slice().try_into().map_err(|_| MixError::EncodingError(format!("expected 32 bytes, got {}", bytes.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_32bytes_accepts_prefix_and_rejects_short_input() {
        let hex = format!("0x{}", "11".repeat(32));
        assert_eq!(parse_hex_32bytes(&hex).expect("parse"), [0x11; 32]);
        assert!(parse_hex_32bytes("1122").is_err());
        assert!(parse_hex_32bytes("zz").is_err());
    }
}
