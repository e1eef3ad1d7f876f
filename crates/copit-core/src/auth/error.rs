//! Auth error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while writing or removing the credential record.
///
/// Read-path failures never surface as a `VaultError`: the vault reports
/// them as "no credential" so that a corrupted record and a missing one lead
/// to the same remedy (log in again).
#[derive(Debug, Error)]
pub enum VaultError {
    /// Writing the record (or its directory) failed, e.g. disk full or
    /// permission denied. Until this is fixed every run will ask the user
    /// to log in again.
    #[error("Failed to save credentials to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Removing the record failed for a reason other than it being absent.
    #[error("Failed to remove credentials at {}: {source}", path.display())]
    Removal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Failed to encrypt token")]
    Encryption,

    #[error("Failed to serialize credential record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Credential task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors that end a device-authorization handshake.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The user declined the authorization request.
    #[error("Authorization was denied")]
    Denied,

    /// The device code expired before the user finished authorizing.
    #[error("Device code expired - please restart authentication")]
    Expired,

    /// The handshake was abandoned by the caller.
    #[error("Authentication cancelled")]
    Cancelled,

    /// A login is already being polled by this authenticator.
    #[error("A login is already in progress")]
    AlreadyInProgress,

    /// Network or endpoint failure while talking to the authorization server.
    #[error("Authentication request failed: {0}")]
    Transport(String),

    /// A token was issued but the account it belongs to could not be looked up.
    #[error("Failed to get user information: {0}")]
    IdentityResolution(String),

    /// The handshake succeeded but the credential could not be saved.
    #[error(transparent)]
    Persistence(#[from] VaultError),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Transport(err.to_string())
    }
}

/// Failure modes of resolving the account behind a token.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The server refused the token (revoked, expired or insufficient scope).
    #[error("Token was rejected")]
    Rejected,

    /// The server could not be reached or answered unexpectedly.
    #[error("{0}")]
    Transport(String),
}
