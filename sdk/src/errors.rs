//! Error types and structured error codes.
//!
//! Error codes follow the format `FAI-XXXX` where the first digit is the category:
//! - 1: request (bad input, missing records, nothing to dispatch to)
//! - 2: configuration and collaborator wiring
//! - 4: chain (RPC, payments)
//! - 5: network and ledger

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Error Codes
// ============================================================================

/// Structured error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ErrorCode {
    // 1xxx - Request
    InvalidRequest,          // FAI-1000
    NotFound,                // FAI-1020
    NoOperatorsAvailable,    // FAI-1030
    PayloadRejected,         // FAI-1040

    // 2xxx - Configuration
    ConfigurationError,      // FAI-2000
    CollaboratorUnavailable, // FAI-2010

    // 4xxx - Chain
    ChainError,              // FAI-4000
    PaymentFailed,           // FAI-4001

    // 5xxx - Network / ledger
    NetworkError,            // FAI-5000
    LedgerError,             // FAI-5010
    DecodeError,             // FAI-5020
}

impl ErrorCode {
    /// Numeric code
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidRequest => 1000,
            Self::NotFound => 1020,
            Self::NoOperatorsAvailable => 1030,
            Self::PayloadRejected => 1040,
            Self::ConfigurationError => 2000,
            Self::CollaboratorUnavailable => 2010,
            Self::ChainError => 4000,
            Self::PaymentFailed => 4001,
            Self::NetworkError => 5000,
            Self::LedgerError => 5010,
            Self::DecodeError => 5020,
        }
    }

    /// String code (e.g. "FAI-1020")
    pub fn code_string(&self) -> String {
        format!("FAI-{:04}", self.code())
    }

    /// Parse from numeric code
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1000 => Self::InvalidRequest,
            1020 => Self::NotFound,
            1030 => Self::NoOperatorsAvailable,
            1040 => Self::PayloadRejected,
            2000 => Self::ConfigurationError,
            2010 => Self::CollaboratorUnavailable,
            4000 => Self::ChainError,
            4001 => Self::PaymentFailed,
            5000 => Self::NetworkError,
            5010 => Self::LedgerError,
            5020 => Self::DecodeError,
            _ => return None,
        })
    }

    /// Parse from string code (e.g. "FAI-1020")
    pub fn from_code_string(s: &str) -> Option<Self> {
        let s = s.trim().to_uppercase();
        let code: u16 = s.strip_prefix("FAI-")?.parse().ok()?;
        Self::from_code(code)
    }

    /// Transient failures worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::LedgerError | Self::ChainError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code_string())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> String {
        code.code_string()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        Self::from_code_string(&s).ok_or_else(|| format!("Unknown error code: {}", s))
    }
}

// ============================================================================
// Marketplace Error
// ============================================================================

/// Errors surfaced by the marketplace engine
#[derive(Error, Debug)]
pub enum MarketplaceError {
    /// A referenced solution, script or request record is absent from the ledger
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Discovery produced no eligible operator
    #[error("no operators available for solution {0}")]
    NoOperatorsAvailable(String),

    /// A collaborator handle was never configured
    #[error("{0} client not initialized")]
    CollaboratorUnavailable(&'static str),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// The uploader returned no content id
    #[error("could not publish request to the ledger")]
    PublishFailed,

    #[error("ledger query failed: {0}")]
    Ledger(String),

    #[error("chain error: {0}")]
    Chain(String),

    #[error("payment failed: {0}")]
    Payment(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl MarketplaceError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    /// Structured code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::NoOperatorsAvailable(_) => ErrorCode::NoOperatorsAvailable,
            Self::CollaboratorUnavailable(_) => ErrorCode::CollaboratorUnavailable,
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::InvalidConfig(_) => ErrorCode::ConfigurationError,
            Self::PublishFailed => ErrorCode::PayloadRejected,
            Self::Ledger(_) => ErrorCode::LedgerError,
            Self::Chain(_) => ErrorCode::ChainError,
            Self::Payment(_) => ErrorCode::PaymentFailed,
            Self::Decode(_) => ErrorCode::DecodeError,
            Self::Http(_) => ErrorCode::NetworkError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

impl From<serde_json::Error> for MarketplaceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Result type for marketplace operations
pub type Result<T> = std::result::Result<T, MarketplaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_string() {
        assert_eq!(ErrorCode::InvalidRequest.code_string(), "FAI-1000");
        assert_eq!(ErrorCode::CollaboratorUnavailable.code_string(), "FAI-2010");
        assert_eq!(ErrorCode::LedgerError.code_string(), "FAI-5010");
    }

    #[test]
    fn test_error_code_parse() {
        assert_eq!(ErrorCode::from_code_string("fai-1020"), Some(ErrorCode::NotFound));
        assert_eq!(ErrorCode::from_code_string("WZK-1020"), None);
        assert_eq!(ErrorCode::from_code_string("FAI-9999"), None);
    }

    #[test]
    fn test_error_code_serde() {
        let json = serde_json::to_string(&ErrorCode::NoOperatorsAvailable).unwrap();
        assert_eq!(json, r#""FAI-1030""#);
        let parsed: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ErrorCode::NoOperatorsAvailable);
    }

    #[test]
    fn test_error_code_try_from_string() {
        assert_eq!(
            ErrorCode::try_from("FAI-1020".to_string()),
            Ok(ErrorCode::NotFound)
        );
        assert_eq!(
            ErrorCode::try_from("nope".to_string()),
            Err("Unknown error code: nope".to_string())
        );
    }

    #[test]
    fn test_marketplace_error_codes() {
        let err = MarketplaceError::not_found("script", "abc");
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.to_string(), "script not found: abc");

        assert!(MarketplaceError::Ledger("timeout".into()).is_retryable());
        assert!(!MarketplaceError::NoOperatorsAvailable("s".into()).is_retryable());
        assert!(!MarketplaceError::CollaboratorUnavailable("ledger").is_retryable());
    }
}
