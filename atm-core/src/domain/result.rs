//! Result and error types for the core library

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
///
/// The first group of variants are user-facing outcomes of account and
/// ledger operations. None of them leave a partial mutation behind.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Username already exists: {0}")]
    DuplicateUsername(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds: balance is {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },

    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an invalid amount error
    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    /// Stable machine-readable code, used in event logs and JSON output
    pub fn code(&self) -> &'static str {
        match self {
            Error::DuplicateUsername(_) => "duplicate_username",
            Error::InvalidCredentials => "invalid_credentials",
            Error::InvalidAmount(_) => "invalid_amount",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::RecipientNotFound(_) => "recipient_not_found",
            Error::Unauthenticated => "unauthenticated",
            Error::Database(_) => "database",
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "validation",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Other(_) => "other",
        }
    }

    /// True for errors caused by the caller's input rather than the system
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::DuplicateUsername(_)
                | Error::InvalidCredentials
                | Error::InvalidAmount(_)
                | Error::InsufficientFunds { .. }
                | Error::RecipientNotFound(_)
                | Error::Unauthenticated
                | Error::Validation(_)
        )
    }
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Self::Database(e.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result envelope (for JSON output and embedding callers)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
        }
    }

    /// Create a failed result from a library error, keeping its code
    pub fn from_error(error: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            error_code: Some(error.code().to_string()),
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(&e),
        }
    }
}
