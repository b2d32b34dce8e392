//! Protocol messages, their wire framing, and the peer transport contract.

pub mod encoding;
pub mod messages;
pub mod mock;
pub mod traits;

pub use encoding::{decode_message, encode_message, WIRE_PROTOCOL_VERSION_V1};
pub use messages::ProtocolMessage;
pub use mock::RecordingTransport;
pub use traits::Transport;
