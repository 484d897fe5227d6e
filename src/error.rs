//! Error types for the cache engine and fetch helper
//!
//! Provides unified error handling using thiserror. A missing or expired key
//! is never an error: lookups report absence through their return values.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache construction and mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Keys must contain at least one character
    #[error("Invalid key: keys must not be empty")]
    EmptyKey,

    /// Configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Fetch Error Enum ==
/// Failure of a remote operation wrapped by the retry helper.
///
/// `E` is the error type of the wrapped operation; the last one observed is
/// carried through unchanged and exposed as the error source when `E` is
/// itself a `std::error::Error`.
#[derive(Error, Debug)]
pub enum FetchError<E> {
    /// Every attempt failed
    #[error("Remote operation failed after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        #[source]
        last_error: E,
    },

    /// The caller cancelled while the helper was waiting to retry
    #[error("Remote operation cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl<E> FetchError<E> {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            FetchError::Exhausted { attempts, .. } | FetchError::Cancelled { attempts } => {
                *attempts
            }
        }
    }

    /// Returns the last underlying error, if the helper got that far.
    pub fn into_last_error(self) -> Option<E> {
        match self {
            FetchError::Exhausted { last_error, .. } => Some(last_error),
            FetchError::Cancelled { .. } => None,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_exposes_last_error() {
        let err: FetchError<String> = FetchError::Exhausted {
            attempts: 3,
            last_error: "connection reset".to_string(),
        };
        assert_eq!(err.attempts(), 3);
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(err.into_last_error().as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_fetch_error_chains_source() {
        use std::error::Error as _;

        let err: FetchError<std::io::Error> = FetchError::Exhausted {
            attempts: 2,
            last_error: std::io::Error::new(std::io::ErrorKind::TimedOut, "remote timed out"),
        };

        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("remote timed out"));

        let chained = anyhow::Error::new(err);
        assert_eq!(chained.chain().count(), 2);
    }

    #[test]
    fn test_cancelled_has_no_last_error() {
        let err: FetchError<String> = FetchError::Cancelled { attempts: 1 };
        assert_eq!(err.attempts(), 1);
        assert!(err.into_last_error().is_none());
    }
}
