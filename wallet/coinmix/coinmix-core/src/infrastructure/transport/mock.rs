use super::encoding::{decode_message, encode_message};
use super::messages::ProtocolMessage;
use super::traits::Transport;
use crate::foundation::MixError;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct RecordingInner {
    connected: Vec<String>,
    sent: Vec<(String, ProtocolMessage)>,
    broadcasts: Vec<ProtocolMessage>,
    unreachable: HashSet<String>,
}

/// In-memory transport that records traffic. Messages pass through the wire encoding so
/// anything recorded is also known to frame correctly.
#[derive(Default)]
pub struct RecordingTransport {
    inner: Mutex<RecordingInner>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, RecordingInner>, MixError> {
        self.inner.lock().map_err(|_| crate::storage_err!("recording_transport lock", "poisoned"))
    }

    fn through_wire(message: ProtocolMessage) -> Result<ProtocolMessage, MixError> {
        decode_message(&encode_message(&message)?)
    }

    pub fn set_unreachable(&self, address: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.unreachable.insert(address.to_string());
        }
    }

    pub fn connected(&self) -> Vec<String> {
        self.inner.lock().map(|inner| inner.connected.clone()).unwrap_or_default()
    }

    pub fn sent(&self) -> Vec<(String, ProtocolMessage)> {
        self.inner.lock().map(|inner| inner.sent.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, peer: &str) -> Vec<ProtocolMessage> {
        self.sent().into_iter().filter(|(to, _)| to == peer).map(|(_, message)| message).collect()
    }

    pub fn broadcasts(&self) -> Vec<ProtocolMessage> {
        self.inner.lock().map(|inner| inner.broadcasts.clone()).unwrap_or_default()
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> (Vec<(String, ProtocolMessage)>, Vec<ProtocolMessage>) {
        match self.inner.lock() {
            Ok(mut inner) => (std::mem::take(&mut inner.sent), std::mem::take(&mut inner.broadcasts)),
            Err(_) => (Vec::new(), Vec::new()),
        }
    }
}

impl Transport for RecordingTransport {
    fn connect(&self, address: &str) -> Result<bool, MixError> {
        let mut inner = self.lock_inner()?;
        inner.connected.push(address.to_string());
        Ok(!inner.unreachable.contains(address))
    }

    fn send(&self, peer: &str, message: ProtocolMessage) -> Result<(), MixError> {
        let message = Self::through_wire(message)?;
        self.lock_inner()?.sent.push((peer.to_string(), message));
        Ok(())
    }

    fn broadcast(&self, message: ProtocolMessage) -> Result<(), MixError> {
        let message = Self::through_wire(message)?;
        self.lock_inner()?.broadcasts.push(message);
        Ok(())
    }
}
