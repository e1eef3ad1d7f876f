//! Authentication module for obtaining and keeping a GitHub access token.
//!
//! This module provides:
//! - [`CredentialVault`]: encrypted credential storage on disk
//! - [`DeviceAuthenticator`]: the OAuth device-authorization handshake
//! - [`GitHubDeviceEndpoint`]: GitHub's device flow endpoints
//! - [`AuthManager`]: load + validate on startup, login, logout

mod credential;
pub mod device;
mod error;
mod github;
mod manager;
pub mod vault;

pub use credential::Credential;
pub use device::{
    DeviceAuthEndpoint, DeviceAuthenticator, DeviceSession, HandshakeState, IdentityResolver,
    PollOutcome, VerificationPrompt,
};
pub use error::{AuthError, IdentityError, VaultError};
pub use github::GitHubDeviceEndpoint;
pub use manager::AuthManager;
pub use vault::{CredentialVault, KdfParams, MachinePassphrase};
