use super::messages::ProtocolMessage;
use crate::foundation::MixError;

/// Peer messaging as seen by the mixing core. Delivery is fire-and-forget; the session
/// timeout policy covers anything that never arrives.
pub trait Transport: Send + Sync {
    /// Open (or reuse) a connection. `Ok(false)` means the peer could not be reached.
    fn connect(&self, address: &str) -> Result<bool, MixError>;
    fn send(&self, peer: &str, message: ProtocolMessage) -> Result<(), MixError>;
    fn broadcast(&self, message: ProtocolMessage) -> Result<(), MixError>;
}
