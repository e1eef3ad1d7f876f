//! Entry point the application uses for everything login related.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::device::{DeviceAuthEndpoint, DeviceAuthenticator, IdentityResolver, VerificationPrompt};
use super::{AuthError, Credential, CredentialVault, IdentityError, VaultError};

/// Combines the vault with the device flow.
pub struct AuthManager<E, I> {
    vault: CredentialVault,
    authenticator: DeviceAuthenticator<E, I>,
}

impl<E, I> AuthManager<E, I>
where
    E: DeviceAuthEndpoint,
    I: IdentityResolver,
{
    pub fn new(vault: CredentialVault, authenticator: DeviceAuthenticator<E, I>) -> Self {
        Self {
            vault,
            authenticator,
        }
    }

    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    pub fn authenticator(&self) -> &DeviceAuthenticator<E, I> {
        &self.authenticator
    }

    /// Load the stored credential and confirm the server still accepts it.
    ///
    /// A token the server rejects is deleted. When the server cannot be
    /// reached the record is kept but `None` is returned.
    pub async fn get_valid_credential(&self) -> Option<Credential> {
        let stored = self.vault.load().await?;

        match self.authenticator.identity().resolve_identity(&stored.token).await {
            Ok(username) if username == stored.username => Some(stored),
            Ok(username) => {
                info!(old = %stored.username, new = %username, "Account was renamed, updating stored credentials");
                let renamed = Credential::new(stored.token, username);
                if let Err(e) = self.vault.save(&renamed).await {
                    warn!(error = %e, "Failed to update stored credentials");
                }
                Some(renamed)
            }
            Err(IdentityError::Rejected) => {
                info!(username = %stored.username, "Stored token was rejected, removing it");
                if let Err(e) = self.vault.clear().await {
                    warn!(error = %e, "Failed to remove rejected credentials");
                }
                None
            }
            Err(IdentityError::Transport(e)) => {
                warn!(error = %e, "Could not validate stored credentials");
                None
            }
        }
    }

    /// Run the device flow and persist the resulting credential.
    pub async fn run_device_authentication<V, P>(
        &self,
        cancel: &CancellationToken,
        on_verification: V,
        on_progress: P,
    ) -> Result<Credential, AuthError>
    where
        V: FnMut(&VerificationPrompt) + Send,
        P: FnMut(&str) + Send,
    {
        let credential = self
            .authenticator
            .authenticate(cancel, on_verification, on_progress)
            .await?;
        self.vault.save(&credential).await?;
        Ok(credential)
    }

    /// Forget the stored credential.
    pub async fn logout(&self) -> Result<(), VaultError> {
        self.vault.clear().await
    }
}
