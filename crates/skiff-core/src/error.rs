// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for skiff-core.

use std::fmt;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors produced by the coordination substrate.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CoreError {
    /// No record exists for the given appid.
    RecordNotFound {
        /// The appid that was not found.
        appid: String,
    },

    /// A persisted value could not be decoded into its typed form.
    InvalidValue {
        /// The field being decoded (e.g. `phase`, `state`).
        field: &'static str,
        /// The offending raw value.
        value: String,
    },

    /// Store operation failed.
    Database {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordNotFound { appid } => {
                write!(f, "Record for '{}' not found", appid)
            }
            Self::InvalidValue { field, value } => {
                write!(f, "Invalid value for '{}': '{}'", field, value)
            }
            Self::Database { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Database {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = CoreError::RecordNotFound {
            appid: "app-1".to_string(),
        };
        assert_eq!(err.to_string(), "Record for 'app-1' not found");

        let err = CoreError::InvalidValue {
            field: "phase",
            value: "Bogus".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value for 'phase': 'Bogus'");

        let err = CoreError::Database {
            operation: "claim".to_string(),
            details: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Database error during 'claim': connection refused"
        );
    }
}
