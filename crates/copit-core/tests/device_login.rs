//! End-to-end login scenarios: device flow, persistence and startup validation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use copit_core::auth::{
    AuthError, AuthManager, Credential, CredentialVault, DeviceAuthEndpoint, DeviceAuthenticator,
    DeviceSession, IdentityError, IdentityResolver, KdfParams, MachinePassphrase, PollOutcome,
    VerificationPrompt,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const CHEAP_KDF: KdfParams = KdfParams {
    memory_kib: 64,
    iterations: 1,
    parallelism: 1,
};

struct ScriptedEndpoint {
    polls: Mutex<VecDeque<PollOutcome>>,
}

impl ScriptedEndpoint {
    fn new(polls: Vec<PollOutcome>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
        }
    }
}

#[async_trait]
impl DeviceAuthEndpoint for ScriptedEndpoint {
    async fn request_device_code(&self) -> Result<DeviceSession, AuthError> {
        Ok(DeviceSession::new(
            "D1",
            "ABCD-1234",
            "https://example/device",
            Duration::from_secs(600),
            5,
        ))
    }

    async fn poll_for_token(&self, device_code: &str) -> Result<PollOutcome, AuthError> {
        assert_eq!(device_code, "D1");
        Ok(self
            .polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PollOutcome::Pending))
    }
}

/// Fixed answer for every identity lookup.
enum ScriptedIdentity {
    User(&'static str),
    Rejected,
    Offline,
}

#[async_trait]
impl IdentityResolver for ScriptedIdentity {
    async fn resolve_identity(&self, _token: &str) -> Result<String, IdentityError> {
        match self {
            ScriptedIdentity::User(name) => Ok(name.to_string()),
            ScriptedIdentity::Rejected => Err(IdentityError::Rejected),
            ScriptedIdentity::Offline => Err(IdentityError::Transport("connection refused".into())),
        }
    }
}

fn vault(dir: &TempDir) -> CredentialVault {
    CredentialVault::new(dir.path().join("credentials.json"))
        .with_passphrase(MachinePassphrase::new("test-host:tester"))
        .with_kdf_params(CHEAP_KDF)
}

fn manager(
    dir: &TempDir,
    polls: Vec<PollOutcome>,
    identity: ScriptedIdentity,
) -> AuthManager<ScriptedEndpoint, ScriptedIdentity> {
    let authenticator = DeviceAuthenticator::new(ScriptedEndpoint::new(polls), identity)
        .with_browser_opener(|_| Ok(()));
    AuthManager::new(vault(dir), authenticator)
}

#[tokio::test(start_paused = true)]
async fn test_device_login_persists_credential() {
    let dir = TempDir::new().unwrap();
    let manager = manager(
        &dir,
        vec![
            PollOutcome::Pending,
            PollOutcome::Pending,
            PollOutcome::Granted("tok_abc".to_string()),
        ],
        ScriptedIdentity::User("alice"),
    );
    let prompts: Arc<Mutex<Vec<VerificationPrompt>>> = Arc::default();
    let seen = prompts.clone();

    let credential = manager
        .run_device_authentication(
            &CancellationToken::new(),
            move |prompt| seen.lock().unwrap().push(prompt.clone()),
            |_| {},
        )
        .await
        .unwrap();

    assert_eq!(credential, Credential::new("tok_abc", "alice"));
    {
        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].user_code, "ABCD-1234");
        assert_eq!(prompts[0].verification_uri, "https://example/device");
    }
    assert_eq!(
        manager.authenticator().state(),
        copit_core::auth::HandshakeState::Succeeded
    );

    // A fresh vault over the same file decrypts what the login stored.
    let reloaded = vault(&dir).load().await;
    assert_eq!(reloaded, Some(Credential::new("tok_abc", "alice")));

    let raw = std::fs::read_to_string(dir.path().join("credentials.json")).unwrap();
    assert!(!raw.contains("tok_abc"));
}

#[tokio::test(start_paused = true)]
async fn test_denied_login_stores_nothing() {
    let dir = TempDir::new().unwrap();
    let manager = manager(
        &dir,
        vec![PollOutcome::Pending, PollOutcome::Denied],
        ScriptedIdentity::User("alice"),
    );

    let result = manager
        .run_device_authentication(&CancellationToken::new(), |_| {}, |_| {})
        .await;

    assert!(matches!(result, Err(AuthError::Denied)));
    assert!(!dir.path().join("credentials.json").exists());
}

#[tokio::test]
async fn test_valid_credential_is_returned() {
    let dir = TempDir::new().unwrap();
    vault(&dir)
        .save(&Credential::new("tok", "alice"))
        .await
        .unwrap();
    let manager = manager(&dir, vec![], ScriptedIdentity::User("alice"));

    assert_eq!(
        manager.get_valid_credential().await,
        Some(Credential::new("tok", "alice"))
    );
}

#[tokio::test]
async fn test_rejected_credential_is_removed() {
    let dir = TempDir::new().unwrap();
    vault(&dir)
        .save(&Credential::new("revoked", "alice"))
        .await
        .unwrap();
    let manager = manager(&dir, vec![], ScriptedIdentity::Rejected);

    assert_eq!(manager.get_valid_credential().await, None);
    assert!(!dir.path().join("credentials.json").exists());
}

#[tokio::test]
async fn test_offline_validation_keeps_file() {
    let dir = TempDir::new().unwrap();
    vault(&dir)
        .save(&Credential::new("tok", "alice"))
        .await
        .unwrap();
    let manager = manager(&dir, vec![], ScriptedIdentity::Offline);

    assert_eq!(manager.get_valid_credential().await, None);
    assert_eq!(
        vault(&dir).load().await,
        Some(Credential::new("tok", "alice"))
    );
}

#[tokio::test]
async fn test_renamed_account_updates_record() {
    let dir = TempDir::new().unwrap();
    vault(&dir)
        .save(&Credential::new("tok", "alice"))
        .await
        .unwrap();
    let manager = manager(&dir, vec![], ScriptedIdentity::User("alice-renamed"));

    let credential = manager.get_valid_credential().await;

    assert_eq!(credential, Some(Credential::new("tok", "alice-renamed")));
    assert_eq!(vault(&dir).load().await, credential);
}

#[tokio::test]
async fn test_legacy_record_migrates_on_startup() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    std::fs::write(&path, r#"{"token":"legacy_tok","username":"alice"}"#).unwrap();
    let manager = manager(&dir, vec![], ScriptedIdentity::User("alice"));

    assert_eq!(
        manager.get_valid_credential().await,
        Some(Credential::new("legacy_tok", "alice"))
    );
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("legacy_tok"));
    assert!(raw.contains("cipherText"));
}

#[tokio::test]
async fn test_previous_install_token_migrates_on_startup() {
    let dir = TempDir::new().unwrap();
    let old_file = dir.path().join(".github-file-fetcher").join("config.json");
    std::fs::create_dir_all(old_file.parent().unwrap()).unwrap();
    std::fs::write(&old_file, r#"{"token":"old_tok","username":"alice"}"#).unwrap();

    let authenticator = DeviceAuthenticator::new(
        ScriptedEndpoint::new(vec![]),
        ScriptedIdentity::User("alice"),
    )
    .with_browser_opener(|_| Ok(()));
    let manager = AuthManager::new(vault(&dir).with_legacy_path(old_file.clone()), authenticator);

    assert_eq!(
        manager.get_valid_credential().await,
        Some(Credential::new("old_tok", "alice"))
    );
    assert!(!old_file.exists());

    let raw = std::fs::read_to_string(dir.path().join("credentials.json")).unwrap();
    assert!(!raw.contains("old_tok"));
    assert_eq!(
        vault(&dir).load().await,
        Some(Credential::new("old_tok", "alice"))
    );
}

#[tokio::test]
async fn test_logout_removes_credential() {
    let dir = TempDir::new().unwrap();
    vault(&dir)
        .save(&Credential::new("tok", "alice"))
        .await
        .unwrap();
    let manager = manager(&dir, vec![], ScriptedIdentity::User("alice"));

    manager.logout().await.unwrap();
    manager.logout().await.unwrap();

    assert_eq!(manager.get_valid_credential().await, None);
}
