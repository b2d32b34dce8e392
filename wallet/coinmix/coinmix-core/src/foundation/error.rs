use secp256k1::Error as SecpError;
use std::io;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidInput,
    CollateralInvalid,
    EntriesFull,
    DuplicateInput,
    WrongState,
    IncompatibleMode,
    QueueFull,
    DenominationMismatch,
    InvalidStateTransition,
    DraftAlreadyPresent,
    DraftMismatch,
    SignatureDuplicate,
    InvalidSignature,
    ScriptVerificationFailed,
    MempoolRejected,
    NotCoordinator,
    NoCoordinator,
    ConnectFailed,
    RetriesExhausted,
    UnknownRelayNode,
    UnknownHeight,
    RelayAnnouncementRejected,
    PaymentRejected,
    QueueAnnouncementRejected,
    InsufficientFunds,
    WalletLocked,
    MissingKey,
    KeyOperationFailed,
    SerializationError,
    EncodingError,
    CryptoError,
    StorageError,
    ConfigError,
    Message,
}

#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub code: ErrorCode,
    pub message: String,
}

/// Errors raised by the mixing core.
///
/// Participant-facing rejections carry the exact reason text relayed back in status updates,
/// so their `Display` output is part of the protocol surface.
#[derive(Debug, Error)]
pub enum MixError {
    #[error("input not valid")]
    InvalidInput,

    #[error("collateral not valid")]
    CollateralInvalid,

    #[error("entries is full")]
    EntriesFull,

    #[error("already have that vin")]
    DuplicateInput,

    #[error("wrong state")]
    WrongState,

    #[error("incompatible mode")]
    IncompatibleMode,

    #[error("queue is full")]
    QueueFull,

    #[error("no matching denominations found for mixing")]
    DenominationMismatch,

    #[error("invalid session state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("already have a draft transaction")]
    DraftAlreadyPresent,

    #[error("draft transaction does not pay this entry as declared: {0}")]
    DraftMismatch(String),

    #[error("signature already present for input {0}")]
    SignatureDuplicate(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("script verification failed for input {input_index}")]
    ScriptVerificationFailed { input_index: usize },

    #[error("mempool rejected transaction {txid}")]
    MempoolRejected { txid: String },

    #[error("operation requires the coordinator role")]
    NotCoordinator,

    #[error("no coordinator selected for this session")]
    NoCoordinator,

    #[error("failed to connect to {address}")]
    ConnectFailed { address: String },

    #[error("no coordinator reachable after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("unknown relay node {0}")]
    UnknownRelayNode(String),

    #[error("no chain data for height {0}")]
    UnknownHeight(u64),

    #[error("relay announcement rejected: {0}")]
    RelayAnnouncementRejected(String),

    #[error("payment winner rejected: {0}")]
    PaymentRejected(String),

    #[error("queue announcement rejected: {0}")]
    QueueAnnouncementRejected(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("wallet is locked")]
    WalletLocked,

    #[error("missing key: {0}")]
    MissingKey(String),

    #[error("key operation failed: {operation}: {details}")]
    KeyOperationFailed { operation: String, details: String },

    #[error("serialization error ({format}): {details}")]
    SerializationError { format: String, details: String },

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("crypto error ({operation}): {details}")]
    CryptoError { operation: String, details: String },

    #[error("storage error ({operation}): {details}")]
    StorageError { operation: String, details: String },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, MixError>;

impl MixError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MixError::InvalidInput => ErrorCode::InvalidInput,
            MixError::CollateralInvalid => ErrorCode::CollateralInvalid,
            MixError::EntriesFull => ErrorCode::EntriesFull,
            MixError::DuplicateInput => ErrorCode::DuplicateInput,
            MixError::WrongState => ErrorCode::WrongState,
            MixError::IncompatibleMode => ErrorCode::IncompatibleMode,
            MixError::QueueFull => ErrorCode::QueueFull,
            MixError::DenominationMismatch => ErrorCode::DenominationMismatch,
            MixError::InvalidStateTransition { .. } => ErrorCode::InvalidStateTransition,
            MixError::DraftAlreadyPresent => ErrorCode::DraftAlreadyPresent,
            MixError::DraftMismatch(_) => ErrorCode::DraftMismatch,
            MixError::SignatureDuplicate(_) => ErrorCode::SignatureDuplicate,
            MixError::InvalidSignature(_) => ErrorCode::InvalidSignature,
            MixError::ScriptVerificationFailed { .. } => ErrorCode::ScriptVerificationFailed,
            MixError::MempoolRejected { .. } => ErrorCode::MempoolRejected,
            MixError::NotCoordinator => ErrorCode::NotCoordinator,
            MixError::NoCoordinator => ErrorCode::NoCoordinator,
            MixError::ConnectFailed { .. } => ErrorCode::ConnectFailed,
            MixError::RetriesExhausted { .. } => ErrorCode::RetriesExhausted,
            MixError::UnknownRelayNode(_) => ErrorCode::UnknownRelayNode,
            MixError::UnknownHeight(_) => ErrorCode::UnknownHeight,
            MixError::RelayAnnouncementRejected(_) => ErrorCode::RelayAnnouncementRejected,
            MixError::PaymentRejected(_) => ErrorCode::PaymentRejected,
            MixError::QueueAnnouncementRejected(_) => ErrorCode::QueueAnnouncementRejected,
            MixError::InsufficientFunds(_) => ErrorCode::InsufficientFunds,
            MixError::WalletLocked => ErrorCode::WalletLocked,
            MixError::MissingKey(_) => ErrorCode::MissingKey,
            MixError::KeyOperationFailed { .. } => ErrorCode::KeyOperationFailed,
            MixError::SerializationError { .. } => ErrorCode::SerializationError,
            MixError::EncodingError(_) => ErrorCode::EncodingError,
            MixError::CryptoError { .. } => ErrorCode::CryptoError,
            MixError::StorageError { .. } => ErrorCode::StorageError,
            MixError::ConfigError(_) => ErrorCode::ConfigError,
            MixError::Message(_) => ErrorCode::Message,
        }
    }

    pub fn context(&self) -> ErrorContext {
        ErrorContext { code: self.code(), message: self.to_string() }
    }

    /// Rejections of participant input that roll back the caller's participant-count reservation.
    pub fn is_protocol_rejection(&self) -> bool {
        matches!(
            self,
            MixError::InvalidInput
                | MixError::CollateralInvalid
                | MixError::EntriesFull
                | MixError::DuplicateInput
                | MixError::WrongState
                | MixError::IncompatibleMode
                | MixError::QueueFull
                | MixError::DenominationMismatch
        )
    }

    pub fn key_operation(operation: impl Into<String>, details: impl Into<String>) -> Self {
        MixError::KeyOperationFailed { operation: operation.into(), details: details.into() }
    }
}

impl From<hex::FromHexError> for MixError {
    fn from(err: hex::FromHexError) -> Self {
        MixError::EncodingError(format!("hex decode error: {}", err))
    }
}

impl From<toml::de::Error> for MixError {
    fn from(err: toml::de::Error) -> Self {
        MixError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<figment::Error> for MixError {
    fn from(err: figment::Error) -> Self {
        MixError::ConfigError(format!("config extraction failed: {}", err))
    }
}

impl From<bincode::Error> for MixError {
    fn from(err: bincode::Error) -> Self {
        MixError::SerializationError { format: "bincode".to_string(), details: err.to_string() }
    }
}

#[macro_export]
macro_rules! storage_err {
    ($op:expr, $err:expr) => {
        $crate::foundation::MixError::StorageError { operation: $op.into(), details: $err.to_string() }
    };
}

#[macro_export]
macro_rules! serde_err {
    ($fmt:expr, $err:expr) => {
        $crate::foundation::MixError::SerializationError { format: $fmt.into(), details: $err.to_string() }
    };
}

impl From<io::Error> for MixError {
    fn from(err: io::Error) -> Self {
        MixError::StorageError { operation: "io".to_string(), details: err.to_string() }
    }
}

impl From<serde_json::Error> for MixError {
    fn from(err: serde_json::Error) -> Self {
        MixError::SerializationError { format: "json".to_string(), details: err.to_string() }
    }
}

impl From<SecpError> for MixError {
    fn from(err: SecpError) -> Self {
        MixError::CryptoError { operation: "secp256k1".to_string(), details: err.to_string() }
    }
}
