//! Centralized error types for listmgr.
//!
//! [`ListError`] is fatal for the current request: it aborts the critical
//! section (after the lock has been released). The smaller enums below it are
//! per-item outcomes that batch operations record and then keep going.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Request-level failures produced by the listmgr library.
#[derive(Error, Debug)]
pub enum ListError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No list with this internal name exists.
    #[error("No such list: {0}")]
    ListNotFound(String),

    /// A list with this internal name already exists.
    #[error("List already exists: {0}")]
    ListExists(String),

    /// The address the request is about is not subscribed to the list.
    #[error("No such member: {0}")]
    NoSuchMember(String),

    /// The stored list state could not be decoded.
    #[error("Corrupt list state in '{path}': {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Another request held the list lock for longer than we were willing to wait.
    #[error("Timed out after {waited:?} waiting for the lock on list '{list}'")]
    LockTimeout { list: String, waited: Duration },

    /// A save was attempted without holding the list's lock.
    #[error("Lock for list '{0}' is not held by this request")]
    LockNotHeld(String),

    /// The authenticated role may not perform this operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(&'static str),

    /// Invalid argument supplied by the caller.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A member password change was refused.
    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Convenience alias for `Result<T, ListError>`.
pub type Result<T> = std::result::Result<T, ListError>;

impl ListError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the caller may retry the whole request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

/// Failures setting a single member option.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberError {
    #[error("Not a member of this list")]
    NotAMember,

    /// Digest delivery was requested but the list has digests turned off.
    #[error("The list administrator has disabled digest delivery for this list")]
    CantDigest,

    /// Regular delivery was requested but the list only delivers digests.
    #[error("The list administrator has disabled non-digest delivery for this list")]
    MustDigest,
}

/// Address syntax failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Bad/Invalid email address: {0:?}")]
    Bad(String),

    #[error("Hostile address (illegal characters): {0:?}")]
    Hostile(String),
}

/// Rejections of an address or name change request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressChangeError {
    #[error("Addresses may not be blank")]
    Blank,

    #[error("Addresses did not match")]
    Mismatch,

    #[error("You are already using that email address")]
    SameAddress,

    #[error("The new address is already a member: {0}")]
    AlreadyMember(String),

    #[error("{0} is banned from this list")]
    Banned(String),

    #[error("Invalid email address provided: {0}")]
    InvalidAddress(String),
}

/// Rejections of a password change request.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Passwords may not be blank")]
    Blank,

    #[error("Passwords did not match")]
    Mismatch,

    #[error("You must type in your new password twice")]
    MissingConfirmation,

    #[error("Incorrect administrator password")]
    BadCurrent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_timeout_is_retryable() {
        let err = ListError::LockTimeout {
            list: "dev".to_string(),
            waited: Duration::from_secs(1),
        };
        assert!(err.is_retryable());
        assert!(!ListError::ListNotFound("dev".to_string()).is_retryable());
    }

    #[test]
    fn test_io_error_mentions_path() {
        let err = ListError::io(
            "/tmp/lists/dev.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/lists/dev.json"));
    }
}
