// Copyright (c) 2024-2025 The Tapmint Project

//! Unified error taxonomy for the host agent
//!
//! Every layer attaches structured detail here; raw status words and
//! contract error codes travel alongside the diagnostic string so the UI
//! can distinguish e.g. "already claimed" from "bad signature". Human
//! strings are produced by [Error::user_message], never inside transports.

use tapmint_apdu::ApduError;

/// Host agent error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reader / device / network I/O failure
    #[error("transport: {0}")]
    Transport(String),

    /// Chip returned a non-success status word or a malformed response
    #[error("chip protocol: {detail}")]
    ChipProtocol {
        detail: String,
        /// Raw status word when the failure came from the chip
        sw: Option<u16>,
    },

    /// DER signature parsing failed
    #[error("signature parse: {0}")]
    Der(String),

    /// Curve-level failure (range, point validity)
    #[error("curve: {0}")]
    Curve(String),

    /// Auth message construction failed
    #[error("auth message: {0}")]
    Sep53(String),

    /// Contract simulation rejected the call
    #[error("contract simulation: {detail}")]
    ContractSimulation {
        detail: String,
        /// Contract error code when the diagnostic carried one
        code: Option<u32>,
    },

    /// Contract execution failed on chain
    #[error("contract execution: {detail}")]
    ContractExecution {
        detail: String,
        code: Option<u32>,
    },

    /// Contract rejected a non-increasing replay nonce
    #[error("replay nonce rejected by contract")]
    ReplayNonce,

    /// No recovery id reproduces the chip key from the signature
    #[error("signature does not match chip key")]
    RecoveryIdUnmatched,

    /// Operation or poll deadline exceeded
    #[error("operation timed out")]
    Timeout,

    /// Cancelled by the user
    #[error("cancelled by user")]
    UserCancelled,

    /// Input or state validation failure
    #[error("validation: {0}")]
    Validation(String),
}

impl Error {
    /// Short actionable message for the UI; the Display string carries the
    /// long diagnostic.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::Transport(_) => "Reader or network connection failed, try again",
            Error::ChipProtocol { .. } => "The chip rejected a command, re-present the tag",
            Error::Der(_) | Error::Curve(_) => "The chip returned an unusable signature",
            Error::Sep53(_) => "Could not construct the authorization message",
            Error::ContractSimulation { .. } => "The contract rejected this operation",
            Error::ContractExecution { .. } => "The operation failed on chain",
            Error::ReplayNonce => "This authorization was already used, retry the operation",
            Error::RecoveryIdUnmatched => "Signature does not match chip key",
            Error::Timeout => "Timed out, try again",
            Error::UserCancelled => "Cancelled",
            Error::Validation(_) => "Invalid input",
        }
    }

    /// Contract error code attached to this error, if any
    pub fn contract_code(&self) -> Option<u32> {
        match self {
            Error::ContractSimulation { code, .. } | Error::ContractExecution { code, .. } => {
                *code
            }
            _ => None,
        }
    }
}

impl From<tapmint_core::Error> for Error {
    fn from(e: tapmint_core::Error) -> Self {
        use tapmint_core::Error as CoreError;

        match e {
            CoreError::DerOuterTag
            | CoreError::DerIntegerTag
            | CoreError::DerLength
            | CoreError::DerIntegerTooLong
            | CoreError::DerTrailingBytes => Error::Der(e.to_string()),

            CoreError::PublicKeyLength
            | CoreError::PublicKeyPrefix
            | CoreError::PublicKeyInvalid => Error::Curve(e.to_string()),

            CoreError::ContractIdLength | CoreError::ArgEncoding => Error::Sep53(e.to_string()),

            CoreError::NoRecoveryMatch => Error::RecoveryIdUnmatched,

            CoreError::OddHexLength | CoreError::InvalidHexCharacter => {
                Error::Validation(e.to_string())
            }
        }
    }
}

impl From<ApduError> for Error {
    fn from(e: ApduError) -> Self {
        Error::ChipProtocol {
            detail: e.to_string(),
            sw: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn core_errors_map_to_kinds() {
        assert!(matches!(
            Error::from(tapmint_core::Error::DerOuterTag),
            Error::Der(_)
        ));
        assert!(matches!(
            Error::from(tapmint_core::Error::NoRecoveryMatch),
            Error::RecoveryIdUnmatched
        ));
        assert!(matches!(
            Error::from(tapmint_core::Error::PublicKeyPrefix),
            Error::Curve(_)
        ));
        assert!(matches!(
            Error::from(tapmint_core::Error::ContractIdLength),
            Error::Sep53(_)
        ));
    }

    #[test]
    fn recovery_failure_names_the_chip_key() {
        // This failure can only come from a bug or a swapped chip mid-flow,
        // the message must say so explicitly.
        assert_eq!(
            Error::RecoveryIdUnmatched.user_message(),
            "Signature does not match chip key"
        );
    }

    #[test]
    fn contract_code_surfaces() {
        let e = Error::ContractExecution {
            detail: "x".into(),
            code: Some(212),
        };
        assert_eq!(e.contract_code(), Some(212));
        assert_eq!(Error::Timeout.contract_code(), None);
    }
}
