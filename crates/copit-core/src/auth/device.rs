//! OAuth device-authorization handshake.
//!
//! The user is shown a short code and a URL, authorizes the app in a
//! browser, and meanwhile this side polls the token endpoint. No client
//! secret is involved and no local callback server is opened.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AuthError, Credential, IdentityError};

/// Added to the poll interval when the server asks us to slow down without
/// naming a new interval.
const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

/// Bounds on the poll interval, whatever the server says.
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Device codes live 15 minutes on GitHub; anything past a day is bogus.
const MAX_SESSION_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// One in-progress device authorization. Lives only in memory.
#[derive(Debug, Clone)]
pub struct DeviceSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_at: Instant,
    pub poll_interval_secs: u64,
}

impl DeviceSession {
    pub fn new(
        device_code: impl Into<String>,
        user_code: impl Into<String>,
        verification_uri: impl Into<String>,
        expires_in: Duration,
        poll_interval_secs: u64,
    ) -> Self {
        let now = Instant::now();
        Self {
            device_code: device_code.into(),
            user_code: user_code.into(),
            verification_uri: verification_uri.into(),
            expires_at: now
                .checked_add(expires_in.min(MAX_SESSION_LIFETIME))
                .unwrap_or(now),
            poll_interval_secs,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// What the user needs to see to finish logging in.
    pub fn prompt(&self) -> VerificationPrompt {
        let remaining = self.expires_at.saturating_duration_since(Instant::now());
        let expires_at = Utc::now()
            + chrono::Duration::from_std(remaining).unwrap_or_else(|_| chrono::Duration::zero());
        VerificationPrompt {
            user_code: self.user_code.clone(),
            verification_uri: self.verification_uri.clone(),
            expires_at,
        }
    }
}

/// Display data handed to the caller once a device code has been issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationPrompt {
    pub user_code: String,
    pub verification_uri: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a single token poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The user approved; here is the access token.
    Granted(String),
    /// The user has not acted yet.
    Pending,
    /// Polling too fast. Carries the new interval in seconds if the server sent one.
    SlowDown(Option<u64>),
    /// The user declined.
    Denied,
    /// The device code is no longer valid.
    Expired,
}

/// Authorization server operations the handshake needs.
#[async_trait]
pub trait DeviceAuthEndpoint: Send + Sync {
    async fn request_device_code(&self) -> Result<DeviceSession, AuthError>;

    async fn poll_for_token(&self, device_code: &str) -> Result<PollOutcome, AuthError>;
}

/// Looks up the account a token belongs to. Doubles as token validation.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_identity(&self, token: &str) -> Result<String, IdentityError>;
}

/// Where a handshake currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    Requesting,
    AwaitingUser,
    Polling,
    Succeeded,
    Expired,
    Denied,
    TransportError,
    Cancelled,
}

impl HandshakeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HandshakeState::Succeeded
                | HandshakeState::Expired
                | HandshakeState::Denied
                | HandshakeState::TransportError
                | HandshakeState::Cancelled
        )
    }
}

type BrowserOpener = Box<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// Drives the device flow against an endpoint and resolves the identity
/// behind the issued token.
pub struct DeviceAuthenticator<E, I> {
    endpoint: E,
    identity: I,
    open_browser: BrowserOpener,
    state: Mutex<HandshakeState>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag even if the handshake future is dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<E, I> DeviceAuthenticator<E, I>
where
    E: DeviceAuthEndpoint,
    I: IdentityResolver,
{
    pub fn new(endpoint: E, identity: I) -> Self {
        Self {
            endpoint,
            identity,
            open_browser: Box::new(|uri: &str| open::that(uri)),
            state: Mutex::new(HandshakeState::Idle),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Replace the handler used to open the verification page.
    pub fn with_browser_opener<F>(mut self, opener: F) -> Self
    where
        F: Fn(&str) -> std::io::Result<()> + Send + Sync + 'static,
    {
        self.open_browser = Box::new(opener);
        self
    }

    pub fn identity(&self) -> &I {
        &self.identity
    }

    pub fn state(&self) -> HandshakeState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run the full handshake.
    ///
    /// `on_verification` is called once with the code to show the user;
    /// `on_progress` receives short status messages. Stops as soon as the
    /// server reports a terminal answer, the device code expires, or
    /// `cancel` fires.
    pub async fn authenticate<V, P>(
        &self,
        cancel: &CancellationToken,
        mut on_verification: V,
        mut on_progress: P,
    ) -> Result<Credential, AuthError>
    where
        V: FnMut(&VerificationPrompt) + Send,
        P: FnMut(&str) + Send,
    {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(AuthError::AlreadyInProgress);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let result = self
            .run_handshake(cancel, &mut on_verification, &mut on_progress)
            .await;

        let terminal = match &result {
            Ok(_) => HandshakeState::Succeeded,
            Err(AuthError::Denied) => HandshakeState::Denied,
            Err(AuthError::Expired) => HandshakeState::Expired,
            Err(AuthError::Cancelled) => HandshakeState::Cancelled,
            Err(_) => HandshakeState::TransportError,
        };
        self.transition(terminal);
        result
    }

    async fn run_handshake<V, P>(
        &self,
        cancel: &CancellationToken,
        on_verification: &mut V,
        on_progress: &mut P,
    ) -> Result<Credential, AuthError>
    where
        V: FnMut(&VerificationPrompt) + Send,
        P: FnMut(&str) + Send,
    {
        self.transition(HandshakeState::Requesting);
        on_progress("Requesting device authorization...");

        let session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            session = self.endpoint.request_device_code() => session?,
        };

        self.transition(HandshakeState::AwaitingUser);
        on_verification(&session.prompt());
        if let Err(e) = (self.open_browser)(&session.verification_uri) {
            warn!(error = %e, "Could not open browser, waiting for manual authorization");
        }

        self.transition(HandshakeState::Polling);
        on_progress("Waiting for authorization in the browser...");
        let token = self.poll_until_granted(&session, cancel).await?;

        on_progress("Fetching user information...");
        let username = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            identity = self.identity.resolve_identity(&token) => identity
                .map_err(|e| AuthError::IdentityResolution(e.to_string()))?,
        };

        info!(username = %username, "Device authorization complete");
        Ok(Credential::new(token, username))
    }

    async fn poll_until_granted(
        &self,
        session: &DeviceSession,
        cancel: &CancellationToken,
    ) -> Result<String, AuthError> {
        let mut interval = clamp_interval(Duration::from_secs(session.poll_interval_secs));

        loop {
            if cancel.is_cancelled() {
                return Err(AuthError::Cancelled);
            }
            let now = Instant::now();
            if now >= session.expires_at {
                return Err(AuthError::Expired);
            }

            let wait = interval.min(session.expires_at - now);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AuthError::Cancelled),
                _ = sleep(wait) => {}
            }
            if session.is_expired() {
                return Err(AuthError::Expired);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AuthError::Cancelled),
                outcome = self.endpoint.poll_for_token(&session.device_code) => outcome?,
            };

            match outcome {
                PollOutcome::Granted(token) => return Ok(token),
                PollOutcome::Pending => debug!("Authorization pending"),
                PollOutcome::SlowDown(next) => {
                    interval = clamp_interval(match next {
                        Some(secs) => Duration::from_secs(secs).max(interval),
                        None => interval.saturating_add(SLOW_DOWN_INCREMENT),
                    });
                    debug!(interval_secs = interval.as_secs(), "Server asked to slow down");
                }
                PollOutcome::Denied => return Err(AuthError::Denied),
                PollOutcome::Expired => return Err(AuthError::Expired),
            }
        }
    }

    fn transition(&self, next: HandshakeState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        debug!(from = ?*state, to = ?next, "Device flow state change");
        *state = next;
    }
}

fn clamp_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
}
