//! Error types for transfer engine interactions.

use std::error::Error;

use thiserror::Error;

use crate::model::TransferId;

/// Primary error type for transfer engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Operation is not supported by the underlying engine.
    #[error("transfer operation not supported")]
    Unsupported {
        /// Operation identifier.
        operation: &'static str,
    },
    /// Operation failed in the underlying engine.
    #[error("transfer operation failed")]
    OperationFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Transfer identifier when available.
        transfer_id: Option<TransferId>,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Transfer was not found.
    #[error("transfer not found")]
    NotFound {
        /// Missing transfer identifier.
        transfer_id: TransferId,
    },
}

impl EngineError {
    /// Build an [`EngineError::OperationFailed`] from any error-like source.
    pub fn operation_failed(
        operation: &'static str,
        transfer_id: Option<TransferId>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::OperationFailed {
            operation,
            transfer_id,
            source: source.into(),
        }
    }

    /// Operation identifier associated with the failure, when known.
    #[must_use]
    pub const fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Unsupported { operation } | Self::OperationFailed { operation, .. } => {
                Some(operation)
            }
            Self::NotFound { .. } => None,
        }
    }
}

/// Convenience alias for engine operation results.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failures raised while deriving or decoding content hashes.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// Hex text could not be decoded into a hash.
    #[error("invalid hex content hash")]
    Hex {
        /// Underlying hex decoding error.
        #[source]
        source: hex::FromHexError,
    },
    /// Base32 text contained a character outside the RFC 4648 alphabet.
    #[error("invalid base32 character")]
    Base32Character {
        /// Offending character.
        character: char,
        /// Zero-based character position.
        position: usize,
    },
    /// Decoded payload had the wrong number of bytes.
    #[error("content hash has unexpected length")]
    Length {
        /// Expected byte count.
        expected: usize,
        /// Decoded byte count.
        actual: usize,
    },
    /// The engine could not produce a hash for the transfer.
    #[error("content hash unavailable")]
    Unavailable {
        /// Transfer whose hash could not be derived.
        transfer_id: TransferId,
    },
}
