//! Application state management for copit.
//!
//! This module contains the core `App` struct that owns all UI state, the
//! signed-in credential and the channel background tasks report through.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use copit_core::api::ApiClient;
use copit_core::auth::{
    AuthError, AuthManager, Credential, CredentialVault, DeviceAuthenticator,
    GitHubDeviceEndpoint, VerificationPrompt,
};
use copit_core::config::Config;
use copit_core::download::{download_history_entry, download_to};
use copit_core::local_files::{list_local_files, preview_lines, LocalEntry};
use copit_core::models::{parent_path, FileItem, Repository};
use copit_core::store::{DestinationExists, HistoryEntry, HistoryStore, Template, TemplateStore};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Number of items to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

/// Maximum length for a template name.
const MAX_TEMPLATE_NAME_LENGTH: usize = 60;

/// Lines shown in the file preview pane.
pub const PREVIEW_LINES: usize = 5;

type Auth = AuthManager<GitHubDeviceEndpoint, ApiClient>;

// ============================================================================
// UI State Types
// ============================================================================

/// Main navigation tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Repositories,
    Templates,
    History,
    Local,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Repositories, Tab::Templates, Tab::History, Tab::Local];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Repositories => "Repositories",
            Tab::Templates => "Templates",
            Tab::History => "History",
            Tab::Local => "Local",
        }
    }

    /// Get the next tab (wrapping around)
    pub fn next(&self) -> Self {
        match self {
            Tab::Repositories => Tab::Templates,
            Tab::Templates => Tab::History,
            Tab::History => Tab::Local,
            Tab::Local => Tab::Repositories,
        }
    }

    /// Get the previous tab (wrapping around)
    pub fn prev(&self) -> Self {
        match self {
            Tab::Repositories => Tab::Local,
            Tab::Templates => Tab::Repositories,
            Tab::History => Tab::Templates,
            Tab::Local => Tab::History,
        }
    }
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Validating the stored credential on startup.
    CheckingSession,
    /// Device flow running; the login overlay shows the user code.
    Authenticating,
    /// No credential; waiting for the user to start a login.
    SignedOut,
    Normal,
    ShowingHelp,
    ConfirmingQuit,
    /// Typing a name for the local file being registered as a template.
    NamingTemplate,
    /// Applying a template would replace an existing file.
    ConfirmingOverwrite,
    ConfirmingDelete,
    Quitting,
}

/// First lines of the file selected in the Templates or Local tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePreview {
    pub path: PathBuf,
    /// Lines, or the reason they could not be read.
    pub lines: Result<Vec<String>, String>,
}

/// A repository opened for browsing.
#[derive(Debug, Clone)]
pub struct RepoBrowser {
    pub repo: Repository,
    pub path: String,
    pub items: Vec<FileItem>,
    pub selection: usize,
    pub loading: bool,
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Messages sent from spawned tasks back to the main loop.
enum BackgroundResult {
    /// Startup validation finished
    SessionChecked(Option<Credential>),
    /// Device code issued; show it to the user
    Verification(VerificationPrompt),
    /// Status text from the running handshake
    LoginProgress(String),
    /// Device flow finished
    LoginFinished(Result<Credential, AuthError>),
    /// Stored credential removed
    LoggedOut,
    Repositories(Vec<Repository>),
    /// Directory listing (repository full name, path, entries)
    Contents(String, String, Vec<FileItem>),
    /// File written to this path
    Downloaded(PathBuf),
    /// An error occurred in a background task
    Error(String),
}

// ============================================================================
// Main Application Struct
// ============================================================================

/// Main application state container
pub struct App {
    // Core services
    api: ApiClient,
    auth: Arc<Auth>,
    history_store: HistoryStore,
    template_store: TemplateStore,

    /// Directory downloads and applied templates are written to.
    pub working_dir: PathBuf,

    // UI State
    pub state: AppState,
    /// State to return to when an overlay closes.
    resume_state: AppState,
    pub current_tab: Tab,

    // Session
    pub credential: Option<Credential>,
    pub verification: Option<VerificationPrompt>,
    pub login_progress: Option<String>,
    pub login_error: Option<String>,
    login_cancel: Option<CancellationToken>,
    shutdown: CancellationToken,

    // Repositories tab
    pub repositories: Vec<Repository>,
    pub repo_selection: usize,
    pub repos_loading: bool,
    pub browser: Option<RepoBrowser>,

    // Templates tab
    pub templates: Vec<Template>,
    pub template_selection: usize,

    // History tab
    pub history: Vec<HistoryEntry>,
    pub history_selection: usize,

    // Local tab
    pub local_dir: PathBuf,
    pub local_entries: Vec<LocalEntry>,
    pub local_selection: usize,
    pub template_name_input: String,
    pending_template: Option<LocalEntry>,

    /// Template awaiting an overwrite or delete confirmation.
    pub confirm_template: Option<Template>,
    pub preview: Option<FilePreview>,

    // Background task channel
    result_rx: mpsc::Receiver<BackgroundResult>,
    result_tx: mpsc::Sender<BackgroundResult>,

    // Status message
    pub status_message: Option<String>,
}

impl App {
    /// Create the application with the standard config locations.
    pub fn new(config: Config, working_dir: PathBuf) -> Result<Self> {
        let credentials_path = Config::credentials_path()?;
        let legacy_path = match Config::legacy_credentials_path() {
            Ok(path) => Some(path),
            Err(e) => {
                debug!(error = %e, "Skipping previous install credentials");
                None
            }
        };
        let data_dir = Config::config_dir()?;
        Self::with_paths(config, credentials_path, legacy_path, data_dir, working_dir)
    }

    /// # Arguments
    /// * `credentials_path` - Encrypted credential file
    /// * `legacy_credentials_path` - Plaintext token file of a previous install
    /// * `data_dir` - Directory for templates and history
    /// * `working_dir` - Target for downloads and applied templates
    pub fn with_paths(
        config: Config,
        credentials_path: PathBuf,
        legacy_credentials_path: Option<PathBuf>,
        data_dir: PathBuf,
        working_dir: PathBuf,
    ) -> Result<Self> {
        let api = ApiClient::new(&config.api_base_url)?;
        let endpoint = GitHubDeviceEndpoint::new(
            api.http_client(),
            config.auth_base_url.clone(),
            config.client_id.clone(),
            config.scope.clone(),
        );
        let authenticator = DeviceAuthenticator::new(endpoint, api.clone());
        let mut vault = CredentialVault::new(credentials_path);
        if let Some(path) = legacy_credentials_path {
            vault = vault.with_legacy_path(path);
        }
        let auth = Arc::new(AuthManager::new(vault, authenticator));

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let mut app = Self {
            api,
            auth,
            history_store: HistoryStore::new(data_dir.clone()),
            template_store: TemplateStore::new(data_dir),

            local_dir: working_dir.clone(),
            working_dir,

            state: AppState::CheckingSession,
            resume_state: AppState::CheckingSession,
            current_tab: Tab::Repositories,

            credential: None,
            verification: None,
            login_progress: None,
            login_error: None,
            login_cancel: None,
            shutdown: CancellationToken::new(),

            repositories: Vec::new(),
            repo_selection: 0,
            repos_loading: false,
            browser: None,

            templates: Vec::new(),
            template_selection: 0,

            history: Vec::new(),
            history_selection: 0,

            local_entries: Vec::new(),
            local_selection: 0,
            template_name_input: String::new(),
            pending_template: None,

            confirm_template: None,
            preview: None,

            result_rx: rx,
            result_tx: tx,

            status_message: None,
        };
        app.reload_templates();
        app.reload_history();
        app.reload_local();
        Ok(app)
    }

    /// Helper to send background results, logging any channel errors
    async fn send_result(tx: &mpsc::Sender<BackgroundResult>, result: BackgroundResult) {
        if let Err(e) = tx.send(result).await {
            error!(error = %e, "Failed to send background result - channel closed");
        }
    }

    // =========================================================================
    // Overlays
    // =========================================================================

    /// Show an overlay, remembering where to return when it closes.
    pub fn open_overlay(&mut self, overlay: AppState) {
        if !matches!(self.state, AppState::ShowingHelp | AppState::ConfirmingQuit) {
            self.resume_state = self.state;
        }
        self.state = overlay;
    }

    pub fn close_overlay(&mut self) {
        self.state = self.resume_state;
    }

    /// Stop every background task and leave the main loop.
    pub fn quit(&mut self) {
        self.shutdown.cancel();
        self.state = AppState::Quitting;
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    /// Validate the stored credential in the background.
    pub fn check_session(&mut self) {
        self.state = AppState::CheckingSession;
        let auth = Arc::clone(&self.auth);
        let tx = self.result_tx.clone();
        tokio::spawn(async move {
            let credential = auth.get_valid_credential().await;
            Self::send_result(&tx, BackgroundResult::SessionChecked(credential)).await;
        });
    }

    /// Start the device flow. Does nothing while one is already running.
    pub fn start_login(&mut self) {
        if self.login_cancel.is_some() {
            return;
        }
        self.state = AppState::Authenticating;
        self.verification = None;
        self.login_progress = Some("Requesting device code...".to_string());
        self.login_error = None;

        let cancel = self.shutdown.child_token();
        self.login_cancel = Some(cancel.clone());

        let auth = Arc::clone(&self.auth);
        let tx = self.result_tx.clone();
        tokio::spawn(async move {
            let prompt_tx = tx.clone();
            let progress_tx = tx.clone();
            let result = auth
                .run_device_authentication(
                    &cancel,
                    move |prompt| {
                        if let Err(e) =
                            prompt_tx.try_send(BackgroundResult::Verification(prompt.clone()))
                        {
                            warn!(error = %e, "Dropped verification prompt");
                        }
                    },
                    move |message| {
                        // Progress is best effort; a full channel just skips a line.
                        let _ = progress_tx
                            .try_send(BackgroundResult::LoginProgress(message.to_string()));
                    },
                )
                .await;
            Self::send_result(&tx, BackgroundResult::LoginFinished(result)).await;
        });
    }

    /// Abort a running device flow.
    pub fn cancel_login(&mut self) {
        if let Some(ref cancel) = self.login_cancel {
            info!("Cancelling login");
            cancel.cancel();
        }
    }

    /// Delete the stored credential and drop everything fetched with it.
    pub fn logout(&mut self) {
        self.credential = None;
        self.repositories.clear();
        self.repo_selection = 0;
        self.browser = None;
        self.verification = None;
        self.login_error = None;
        self.state = AppState::SignedOut;

        let auth = Arc::clone(&self.auth);
        let tx = self.result_tx.clone();
        tokio::spawn(async move {
            match auth.logout().await {
                Ok(()) => Self::send_result(&tx, BackgroundResult::LoggedOut).await,
                Err(e) => {
                    Self::send_result(&tx, BackgroundResult::Error(format!("Logout: {}", e))).await
                }
            }
        });
    }

    fn on_signed_in(&mut self, credential: Credential) {
        info!(username = %credential.username, "Signed in");
        self.status_message = Some(format!("Signed in as {}", credential.username));
        self.credential = Some(credential);
        self.verification = None;
        self.login_progress = None;
        self.login_error = None;
        self.state = AppState::Normal;
        self.refresh_repositories();
    }

    /// Request-scoped API client for the signed-in user.
    fn authed_api(&self) -> Option<ApiClient> {
        self.credential
            .as_ref()
            .map(|c| self.api.with_token(&c.token))
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    pub fn refresh_repositories(&mut self) {
        let (api, username) = match (self.authed_api(), self.credential.as_ref()) {
            (Some(api), Some(c)) => (api, c.username.clone()),
            _ => return,
        };
        self.repos_loading = true;
        let tx = self.result_tx.clone();
        tokio::spawn(async move {
            let result = match api.fetch_user_repositories(&username).await {
                Ok(repos) => BackgroundResult::Repositories(repos),
                Err(e) => BackgroundResult::Error(format!("Repositories: {:#}", e)),
            };
            Self::send_result(&tx, result).await;
        });
    }

    /// Open the selected repository at its root.
    pub fn open_selected_repository(&mut self) {
        let Some(repo) = self.repositories.get(self.repo_selection).cloned() else {
            return;
        };
        self.browser = Some(RepoBrowser {
            repo,
            path: String::new(),
            items: Vec::new(),
            selection: 0,
            loading: true,
        });
        self.fetch_browser_contents(String::new());
    }

    /// Enter the selected directory of the open repository.
    pub fn open_selected_item(&mut self) {
        let Some(item) = self.selected_item().cloned() else {
            return;
        };
        if item.is_dir() {
            self.fetch_browser_contents(item.path);
        } else {
            self.status_message = Some(format!("Press d to download {}", item.name));
        }
    }

    /// Go to the parent directory, or back to the repository list from the root.
    pub fn browse_up(&mut self) {
        let Some(ref browser) = self.browser else {
            return;
        };
        if browser.path.is_empty() {
            self.browser = None;
        } else {
            let parent = parent_path(&browser.path).to_string();
            self.fetch_browser_contents(parent);
        }
    }

    fn fetch_browser_contents(&mut self, path: String) {
        let Some(api) = self.authed_api() else {
            return;
        };
        let Some(ref mut browser) = self.browser else {
            return;
        };
        browser.loading = true;
        let owner = browser.repo.owner.clone();
        let name = browser.repo.name.clone();
        let full_name = browser.repo.full_name.clone();
        let tx = self.result_tx.clone();
        tokio::spawn(async move {
            let result = match api.fetch_repository_contents(&owner, &name, &path).await {
                Ok(items) => BackgroundResult::Contents(full_name, path, items),
                Err(e) => BackgroundResult::Error(format!("Contents: {:#}", e)),
            };
            Self::send_result(&tx, result).await;
        });
    }

    pub fn selected_item(&self) -> Option<&FileItem> {
        self.browser
            .as_ref()
            .and_then(|b| b.items.get(b.selection))
    }

    /// Download the selected file into the working directory.
    pub fn download_selected(&mut self) {
        let Some(api) = self.authed_api() else {
            return;
        };
        let target = match (&self.browser, self.selected_item()) {
            (Some(b), Some(item)) if !item.is_dir() => Some((b.repo.clone(), item.clone())),
            _ => None,
        };
        let Some((repo, item)) = target else {
            self.status_message = Some("Select a file to download".to_string());
            return;
        };
        self.status_message = Some(format!("Downloading {}...", item.path));

        let history = self.history_store.clone();
        let dest_dir = self.working_dir.clone();
        let tx = self.result_tx.clone();
        tokio::spawn(async move {
            let result = match download_to(&api, &history, &dest_dir, &repo, &item).await {
                Ok(path) => BackgroundResult::Downloaded(path),
                Err(e) => BackgroundResult::Error(format!("Download: {:#}", e)),
            };
            Self::send_result(&tx, result).await;
        });
    }

    // =========================================================================
    // Templates
    // =========================================================================

    pub fn reload_templates(&mut self) {
        self.preview = None;
        self.templates = self.template_store.load();
        clamp_selection(&mut self.template_selection, self.templates.len());
    }

    /// Copy the selected template into the working directory, asking first
    /// if that would replace an existing file.
    pub fn apply_selected_template(&mut self) {
        let Some(template) = self.templates.get(self.template_selection).cloned() else {
            return;
        };
        match self.template_store.apply(&template, &self.working_dir, false) {
            Ok(path) => {
                self.status_message = Some(format!("Created {}", path.display()));
                self.reload_local();
            }
            Err(e) if e.is::<DestinationExists>() => {
                self.confirm_template = Some(template);
                self.open_overlay(AppState::ConfirmingOverwrite);
            }
            Err(e) => {
                warn!(error = %e, "Failed to apply template");
                self.status_message = Some(format!("Error: {:#}", e));
            }
        }
    }

    /// Apply the template waiting in the overwrite prompt.
    pub fn confirm_overwrite(&mut self) {
        self.close_overlay();
        let Some(template) = self.confirm_template.take() else {
            return;
        };
        self.status_message = Some(
            match self.template_store.apply(&template, &self.working_dir, true) {
                Ok(path) => format!("Overwrote {}", path.display()),
                Err(e) => {
                    warn!(error = %e, "Failed to apply template");
                    format!("Error: {:#}", e)
                }
            },
        );
        self.reload_local();
    }

    /// Ask before deleting the selected template.
    pub fn delete_selected_template(&mut self) {
        let Some(template) = self.templates.get(self.template_selection).cloned() else {
            return;
        };
        self.confirm_template = Some(template);
        self.open_overlay(AppState::ConfirmingDelete);
    }

    pub fn confirm_delete(&mut self) {
        self.close_overlay();
        let Some(template) = self.confirm_template.take() else {
            return;
        };
        self.status_message = Some(match self.template_store.delete(&template.id) {
            Ok(()) => format!("Deleted template {}", template.name),
            Err(e) => format!("Error: {:#}", e),
        });
        self.reload_templates();
    }

    /// Dismiss an overwrite or delete prompt without acting.
    pub fn cancel_confirmation(&mut self) {
        self.confirm_template = None;
        self.close_overlay();
    }

    /// Ask for a name for the selected local file.
    pub fn begin_template_registration(&mut self) {
        match self.local_entries.get(self.local_selection) {
            Some(entry) if !entry.is_dir => {
                self.template_name_input = entry.name.clone();
                self.pending_template = Some(entry.clone());
                self.state = AppState::NamingTemplate;
            }
            _ => self.status_message = Some("Select a file to register".to_string()),
        }
    }

    pub fn cancel_template_registration(&mut self) {
        self.pending_template = None;
        self.template_name_input.clear();
        self.state = AppState::Normal;
    }

    pub fn confirm_template_registration(&mut self) {
        let Some(entry) = self.pending_template.take() else {
            self.state = AppState::Normal;
            return;
        };
        let relative = relative_path(&self.working_dir, &entry.path);
        let result = self.template_store.register(
            &entry.path,
            &relative,
            &self.template_name_input,
            Some(&self.working_dir),
        );
        self.status_message = Some(match result {
            Ok(template) => format!("Registered template {}", template.name),
            Err(e) => format!("Error: {:#}", e),
        });
        self.template_name_input.clear();
        self.state = AppState::Normal;
        self.reload_templates();
    }

    pub fn push_template_name_char(&mut self, c: char) {
        if can_add_name_char(self.template_name_input.chars().count(), c) {
            self.template_name_input.push(c);
        }
    }

    // =========================================================================
    // History
    // =========================================================================

    pub fn reload_history(&mut self) {
        self.history = self.history_store.load();
        clamp_selection(&mut self.history_selection, self.history.len());
    }

    /// Fetch the selected history entry again into the working directory.
    pub fn redownload_selected_history(&mut self) {
        let Some(api) = self.authed_api() else {
            return;
        };
        let Some(entry) = self.history.get(self.history_selection).cloned() else {
            return;
        };
        self.status_message = Some(format!("Downloading {}...", entry.file_path));

        let history = self.history_store.clone();
        let dest_dir = self.working_dir.clone();
        let tx = self.result_tx.clone();
        tokio::spawn(async move {
            let result = match download_history_entry(&api, &history, &dest_dir, &entry).await {
                Ok(path) => BackgroundResult::Downloaded(path),
                Err(e) => BackgroundResult::Error(format!("Download: {:#}", e)),
            };
            Self::send_result(&tx, result).await;
        });
    }

    pub fn clear_history(&mut self) {
        if let Err(e) = self.history_store.clear() {
            self.status_message = Some(format!("Error: {:#}", e));
        }
        self.reload_history();
    }

    // =========================================================================
    // Local files
    // =========================================================================

    pub fn reload_local(&mut self) {
        self.preview = None;
        match list_local_files(&self.local_dir) {
            Ok(entries) => self.local_entries = entries,
            Err(e) => {
                warn!(dir = %self.local_dir.display(), error = %e, "Failed to list directory");
                self.local_entries.clear();
                self.status_message = Some(format!("Error: {:#}", e));
            }
        }
        clamp_selection(&mut self.local_selection, self.local_entries.len());
    }

    /// Enter the selected local directory.
    pub fn open_selected_local(&mut self) {
        if let Some(entry) = self.local_entries.get(self.local_selection) {
            if entry.is_dir {
                self.local_dir = entry.path.clone();
                self.local_selection = 0;
                self.reload_local();
            }
        }
    }

    // =========================================================================
    // Preview
    // =========================================================================

    /// File whose head the current tab shows next to its list.
    fn preview_target(&self) -> Option<PathBuf> {
        match self.current_tab {
            Tab::Templates => self
                .templates
                .get(self.template_selection)
                .map(|t| self.template_store.template_file_path(t)),
            Tab::Local => self
                .local_entries
                .get(self.local_selection)
                .filter(|e| !e.is_dir)
                .map(|e| e.path.clone()),
            Tab::Repositories | Tab::History => None,
        }
    }

    /// Re-read the preview when the selected file changed.
    pub fn refresh_preview(&mut self) {
        let target = self.preview_target();
        if self.preview.as_ref().map(|p| &p.path) == target.as_ref() {
            return;
        }
        self.preview = target.map(|path| {
            let lines = preview_lines(&path, PREVIEW_LINES).map_err(|e| format!("{:#}", e));
            FilePreview { path, lines }
        });
    }

    // =========================================================================
    // Selection
    // =========================================================================

    fn current_list_len(&self) -> usize {
        match self.current_tab {
            Tab::Repositories => match self.browser {
                Some(ref b) => b.items.len(),
                None => self.repositories.len(),
            },
            Tab::Templates => self.templates.len(),
            Tab::History => self.history.len(),
            Tab::Local => self.local_entries.len(),
        }
    }

    fn current_selection_mut(&mut self) -> &mut usize {
        match self.current_tab {
            Tab::Repositories => match self.browser {
                Some(ref mut b) => &mut b.selection,
                None => &mut self.repo_selection,
            },
            Tab::Templates => &mut self.template_selection,
            Tab::History => &mut self.history_selection,
            Tab::Local => &mut self.local_selection,
        }
    }

    /// Move the current tab's selection, staying within the list.
    pub fn move_selection(&mut self, delta: isize) {
        let len = self.current_list_len();
        let selection = self.current_selection_mut();
        if len == 0 {
            *selection = 0;
            return;
        }
        let next = (*selection as isize + delta).clamp(0, len as isize - 1);
        *selection = next as usize;
    }

    pub fn select_first(&mut self) {
        *self.current_selection_mut() = 0;
    }

    pub fn select_last(&mut self) {
        let last = self.current_list_len().saturating_sub(1);
        *self.current_selection_mut() = last;
    }

    // =========================================================================
    // Background results
    // =========================================================================

    /// Check for completed background tasks and process results
    pub fn check_background_tasks(&mut self) {
        while let Ok(result) = self.result_rx.try_recv() {
            self.process_result(result);
        }
    }

    fn process_result(&mut self, result: BackgroundResult) {
        match result {
            BackgroundResult::SessionChecked(Some(credential)) => self.on_signed_in(credential),
            BackgroundResult::SessionChecked(None) => {
                debug!("No valid stored credential");
                self.start_login();
            }
            BackgroundResult::Verification(prompt) => {
                self.login_progress = Some("Waiting for approval in the browser...".to_string());
                self.verification = Some(prompt);
            }
            BackgroundResult::LoginProgress(message) => {
                self.login_progress = Some(message);
            }
            BackgroundResult::LoginFinished(result) => {
                self.login_cancel = None;
                match result {
                    Ok(credential) => self.on_signed_in(credential),
                    Err(e) => {
                        if !matches!(e, AuthError::Cancelled) {
                            warn!(error = %e, "Login failed");
                        }
                        self.verification = None;
                        self.login_progress = None;
                        self.login_error = Some(login_error_message(&e));
                        if self.state != AppState::Quitting {
                            self.state = AppState::SignedOut;
                        }
                    }
                }
            }
            BackgroundResult::LoggedOut => {
                self.status_message = Some("Signed out".to_string());
            }
            BackgroundResult::Repositories(repos) => {
                self.repos_loading = false;
                self.repositories = repos;
                clamp_selection(&mut self.repo_selection, self.repositories.len());
            }
            BackgroundResult::Contents(full_name, path, items) => {
                if let Some(ref mut browser) = self.browser {
                    // Ignore listings for a repository that was closed meanwhile.
                    if browser.repo.full_name == full_name {
                        browser.path = path;
                        browser.items = items;
                        browser.selection = 0;
                        browser.loading = false;
                    }
                }
            }
            BackgroundResult::Downloaded(path) => {
                self.status_message = Some(format!("Saved {}", path.display()));
                self.reload_history();
                self.reload_local();
            }
            BackgroundResult::Error(msg) => {
                error!(error = %msg, "Background task error");
                self.repos_loading = false;
                if let Some(ref mut browser) = self.browser {
                    browser.loading = false;
                }
                self.status_message = Some(user_error_message(&msg));
            }
        }
    }
}

/// Text for the login overlay after a failed device flow.
fn login_error_message(err: &AuthError) -> String {
    match err {
        AuthError::Cancelled => "Login cancelled.".to_string(),
        AuthError::Denied => "Access was denied in the browser.".to_string(),
        AuthError::Expired => "The code expired before it was approved.".to_string(),
        other => format!("Login failed: {}", other),
    }
}

/// Simplify common error messages for the status bar.
fn user_error_message(msg: &str) -> String {
    let lower = msg.to_lowercase();
    if lower.contains("rate limit") {
        "GitHub rate limit reached. Please wait a moment and try again.".to_string()
    } else if lower.contains("unauthorized") || lower.contains("401") {
        "Session expired. Press L to sign in again.".to_string()
    } else if lower.contains("network") || lower.contains("connect") {
        "Network error. Check your connection.".to_string()
    } else {
        format!("Error: {}", msg)
    }
}

fn clamp_selection(selection: &mut usize, len: usize) {
    if *selection >= len {
        *selection = len.saturating_sub(1);
    }
}

/// `path` relative to `base`, or just its file name when outside `base`.
pub fn relative_path(base: &Path, path: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
        Err(_) => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

/// Check if a character can be added to the template name.
pub fn can_add_name_char(current_len: usize, c: char) -> bool {
    current_len < MAX_TEMPLATE_NAME_LENGTH && !c.is_control()
}

// ============================================================================
// Tests
// ============================================================================
