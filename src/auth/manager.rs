use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

use super::client::AuthApi;
use super::decode::classify_locally;
use super::store::TokenStore;
use super::types::{
    DevTokenTerm, LegacyCredentials, LoginOutcome, LoginResponse, LoginRoute, TokenStatus,
};
use crate::config::{Config, Timings};
use crate::error::{AuthError, Result};
use crate::render::{StatusRenderer, StatusView};
use crate::ui::{
    ensure_prefix, wait_for, DocsUi, PrefixHandler, UiElement, PREFIX_HANDLER_MARKER,
};

/// User actions delivered to the lifecycle loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Apply the stored token to the documentation UI
    Apply,
    /// Log in again
    Relogin,
    /// The host UI opened its authorization dialog
    DialogOpened,
    /// Check the stored token now
    Refresh,
}

/// Step of the dialog automation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStage {
    DialogOpening,
    DialogFilled,
    Confirmed,
    Closed,
}

/// How a token application ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Token confirmed in the dialog
    Applied { dialog_closed: bool },
    /// An element was missing; the automation stopped before `stage`
    Aborted { stage: ApplyStage, missing: UiElement },
}

/// Clears the in-flight flag when a login finishes or is dropped
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Token lifecycle manager
/// Checks the stored token, logs in with fallback and applies the token to the docs UI
pub struct TokenLifecycleManager {
    /// Validation and login endpoints
    api: Arc<dyn AuthApi>,

    /// Persisted token
    store: Arc<dyn TokenStore>,

    /// Documentation UI whose authorization dialog gets filled
    ui: Arc<dyn DocsUi>,

    /// Status surface
    renderer: Arc<dyn StatusRenderer>,

    /// Required prefix, e.g. "Bearer "
    prefix: String,

    /// Fixed credentials for the legacy login
    legacy_credentials: LegacyCredentials,

    timings: Timings,

    /// Set while a login is running
    login_in_flight: AtomicBool,
}

impl TokenLifecycleManager {
    /// Create a manager with the default prefix, credentials and timings
    pub fn new(
        api: Arc<dyn AuthApi>,
        store: Arc<dyn TokenStore>,
        ui: Arc<dyn DocsUi>,
        renderer: Arc<dyn StatusRenderer>,
    ) -> Self {
        Self {
            api,
            store,
            ui,
            renderer,
            prefix: "Bearer ".to_string(),
            legacy_credentials: LegacyCredentials {
                email: "test@autocoin.com".to_string(),
                password: "Test1234!".to_string(),
            },
            timings: Timings::default(),
            login_in_flight: AtomicBool::new(false),
        }
    }

    /// Create a manager from loaded configuration
    pub fn from_config(
        config: &Config,
        api: Arc<dyn AuthApi>,
        store: Arc<dyn TokenStore>,
        ui: Arc<dyn DocsUi>,
        renderer: Arc<dyn StatusRenderer>,
    ) -> Self {
        Self::new(api, store, ui, renderer)
            .with_prefix(&config.token_prefix)
            .with_legacy_credentials(config.legacy_credentials.clone())
            .with_timings(config.timings.clone())
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn with_legacy_credentials(mut self, credentials: LegacyCredentials) -> Self {
        self.legacy_credentials = credentials;
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Stored token; unreadable storage counts as no token
    pub fn stored_token(&self) -> Option<String> {
        match self.store.load() {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::error!("Failed to read stored token: {:#}", e);
                None
            }
        }
    }

    /// Derive the status of the stored token and render it
    pub async fn check_status(&self) -> TokenStatus {
        let status = match self.stored_token() {
            None => TokenStatus::Absent,
            Some(token) => match self.api.validate(&token).await {
                Ok(data) => {
                    if !data.valid {
                        tracing::warn!(
                            "Validator rejected token: {}",
                            data.error.as_deref().unwrap_or("no reason given")
                        );
                    }
                    data.status()
                }
                Err(e) => {
                    tracing::warn!("Token validation failed, decoding locally: {}", e);
                    classify_locally(&token, &self.prefix, Utc::now())
                }
            },
        };

        self.renderer.render(&StatusView::Status(status.clone()));
        status
    }

    /// Periodic re-check
    pub async fn refresh_status(&self) -> TokenStatus {
        let status = self.check_status().await;
        tracing::debug!(status = ?status, "Token status refreshed");
        status
    }

    /// Log in via the test-login endpoint, falling back to the legacy login once
    pub async fn login(&self) -> LoginOutcome {
        let Some(_guard) = self.begin_login() else {
            return LoginOutcome::AlreadyInProgress;
        };

        self.renderer.render(&StatusView::LoggingIn);

        let error = match self.api.test_login().await {
            Ok(data) => match self.persist(data) {
                Ok((token, email)) => {
                    return self
                        .finish_login(LoginRoute::Primary, token, email)
                        .await
                }
                Err(e) => e,
            },
            Err(e) => e,
        };

        tracing::error!("Test login failed: {}", error);
        self.renderer.render(&StatusView::LoginFailed {
            message: failure_message(&error),
        });

        tracing::info!(
            "Trying legacy login in {}ms...",
            self.timings.legacy_fallback_delay.as_millis()
        );
        sleep(self.timings.legacy_fallback_delay).await;
        self.renderer.render(&StatusView::LegacyLoggingIn);

        let result = self
            .api
            .legacy_login(&self.legacy_credentials)
            .await
            .and_then(|data| self.persist(data));

        match result {
            Ok((token, email)) => self.finish_login(LoginRoute::Legacy, token, email).await,
            Err(e) => {
                tracing::error!("Legacy login failed: {}", e);
                self.renderer.render(&StatusView::AllLoginsFailed);
                LoginOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Obtain a development token instead of logging in
    pub async fn fetch_dev_token(&self, term: DevTokenTerm) -> LoginOutcome {
        let Some(_guard) = self.begin_login() else {
            return LoginOutcome::AlreadyInProgress;
        };

        self.renderer.render(&StatusView::LoggingIn);

        let result = self
            .api
            .dev_token(term)
            .await
            .and_then(|data| self.persist(data));

        match result {
            Ok((token, email)) => {
                self.finish_login(LoginRoute::DevToken(term), token, email)
                    .await
            }
            Err(e) => {
                tracing::error!("Dev token request failed: {}", e);
                let message = failure_message(&e);
                self.renderer.render(&StatusView::LoginFailed {
                    message: message.clone(),
                });
                LoginOutcome::Failed { message }
            }
        }
    }

    fn begin_login(&self) -> Option<InFlight<'_>> {
        if self.login_in_flight.swap(true, Ordering::SeqCst) {
            tracing::warn!("Login already in progress, ignoring request");
            return None;
        }
        Some(InFlight(&self.login_in_flight))
    }

    /// Store the token from a login response
    fn persist(&self, data: LoginResponse) -> Result<(String, Option<String>)> {
        let token = data
            .token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::NoTokenAvailable)?;

        self.store
            .save(&token)
            .map_err(|e| AuthError::Storage(format!("{:#}", e)))?;

        Ok((token, data.email))
    }

    /// Render success, then apply the freshly stored token
    async fn finish_login(
        &self,
        route: LoginRoute,
        token: String,
        email: Option<String>,
    ) -> LoginOutcome {
        tracing::info!(route = ?route, "Login succeeded");
        self.renderer.render(&StatusView::LoginSucceeded {
            email: email.clone(),
        });

        sleep(self.timings.apply_after_login_delay).await;
        if let ApplyOutcome::Aborted { .. } = self.apply_token(&token).await {
            self.check_status().await;
        }

        LoginOutcome::Success { route, email }
    }

    /// Apply the stored token, if any
    pub async fn apply_if_available(&self) -> Option<ApplyOutcome> {
        match self.stored_token() {
            Some(token) => Some(self.apply_token(&token).await),
            None => {
                tracing::debug!("Nothing to apply: {}", AuthError::NoTokenAvailable);
                None
            }
        }
    }

    /// Fill the documentation UI's authorization dialog with the prefixed token
    ///
    /// Missing elements stop the automation with a warning; nothing is raised.
    pub async fn apply_token(&self, token: &str) -> ApplyOutcome {
        let value = ensure_prefix(token, &self.prefix);

        if !self.ui.is_present(UiElement::AuthorizeTrigger).await {
            tracing::warn!("Authorize trigger not found, documentation UI may not be loaded yet");
            return ApplyOutcome::Aborted {
                stage: ApplyStage::DialogOpening,
                missing: UiElement::AuthorizeTrigger,
            };
        }
        if let Err(e) = self.ui.activate(UiElement::AuthorizeTrigger).await {
            tracing::warn!("Could not open authorization dialog: {}", e);
            return ApplyOutcome::Aborted {
                stage: ApplyStage::DialogOpening,
                missing: UiElement::AuthorizeTrigger,
            };
        }
        tracing::debug!(stage = ?ApplyStage::DialogOpening, "Authorization dialog opening");

        sleep(self.timings.dialog_open_delay).await;

        if let Err(e) = self.fill_input(&value).await {
            tracing::warn!("Could not fill token input: {}", e);
            return ApplyOutcome::Aborted {
                stage: ApplyStage::DialogFilled,
                missing: UiElement::TokenInput,
            };
        }
        tracing::debug!(stage = ?ApplyStage::DialogFilled, "Token input filled");

        self.ensure_prefix_handler().await;

        if !self.ui.is_present(UiElement::ConfirmButton).await
            || self.ui.activate(UiElement::ConfirmButton).await.is_err()
        {
            tracing::warn!("Authorization confirm button not found");
            return ApplyOutcome::Aborted {
                stage: ApplyStage::Confirmed,
                missing: UiElement::ConfirmButton,
            };
        }
        tracing::info!("Token applied to documentation UI ({} prefix)", self.prefix.trim());

        sleep(self.timings.dialog_close_delay).await;

        let dialog_closed = match self.ui.activate(UiElement::CloseButton).await {
            Ok(()) => {
                tracing::debug!(stage = ?ApplyStage::Closed, "Authorization dialog closed");
                true
            }
            Err(e) => {
                tracing::warn!("Could not close authorization dialog: {}", e);
                false
            }
        };

        self.renderer.render(&StatusView::TokenApplied);
        sleep(self.timings.applied_notice_duration).await;
        self.check_status().await;

        ApplyOutcome::Applied { dialog_closed }
    }

    async fn fill_input(&self, value: &str) -> Result<()> {
        wait_for(
            self.ui.as_ref(),
            UiElement::TokenInput,
            self.timings.element_poll_attempts,
            self.timings.element_poll_interval,
        )
        .await?;

        self.ui.set_input_value("").await?;
        self.ui.set_input_value(value).await?;
        self.ui.notify_input_changed().await
    }

    /// Host callback: the authorization dialog was (re)rendered
    ///
    /// Returns whether the token input carries the auto-prefix handler.
    pub async fn on_dialog_opened(&self) -> bool {
        let found = wait_for(
            self.ui.as_ref(),
            UiElement::TokenInput,
            self.timings.element_poll_attempts,
            self.timings.element_poll_interval,
        )
        .await;

        if let Err(e) = found {
            tracing::warn!("Dialog opened without a token input: {}", e);
            return false;
        }
        self.ensure_prefix_handler().await
    }

    /// Attach the auto-prefix handler unless the input is already marked
    async fn ensure_prefix_handler(&self) -> bool {
        if self
            .ui
            .has_attribute(UiElement::TokenInput, PREFIX_HANDLER_MARKER)
            .await
        {
            return true;
        }

        let handler = Arc::new(PrefixHandler::new(&self.prefix, self.timings.hint_duration));
        let attached = async {
            self.ui
                .set_attribute(UiElement::TokenInput, PREFIX_HANDLER_MARKER, "true")
                .await?;
            self.ui
                .set_attribute(UiElement::TokenInput, "placeholder", &handler.placeholder())
                .await?;
            self.ui.attach_input_handler(handler.clone()).await
        }
        .await;

        match attached {
            Ok(()) => {
                tracing::info!("Auto-prefix handler attached to token input");
                true
            }
            Err(e) => {
                tracing::warn!("Could not attach auto-prefix handler: {}", e);
                false
            }
        }
    }

    /// Handle one user action
    pub async fn dispatch(&self, action: Action) {
        tracing::debug!(action = ?action, "Handling action");
        match action {
            Action::Apply => {
                self.apply_if_available().await;
            }
            Action::Relogin => {
                self.login().await;
            }
            Action::DialogOpened => {
                self.on_dialog_opened().await;
            }
            Action::Refresh => {
                self.refresh_status().await;
            }
        }
    }

    /// Drive the lifecycle until `shutdown` resolves
    ///
    /// Settles, checks once, applies a stored token once, then re-checks on the
    /// status interval while handling actions one at a time.
    pub async fn run<F>(&self, mut actions: mpsc::Receiver<Action>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        tokio::select! {
            _ = &mut shutdown => return,
            _ = sleep(self.timings.initial_settle) => {}
        }

        tracing::info!("Token lifecycle started");
        self.refresh_status().await;

        let interval = self.timings.status_interval;
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let auto_apply = sleep(self.timings.auto_apply_delay);
        tokio::pin!(auto_apply);
        let mut auto_applied = false;
        let mut actions_open = true;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Token lifecycle stopped");
                    break;
                }
                _ = &mut auto_apply, if !auto_applied => {
                    auto_applied = true;
                    self.apply_if_available().await;
                }
                _ = ticker.tick() => {
                    self.refresh_status().await;
                }
                action = actions.recv(), if actions_open => match action {
                    Some(action) => self.dispatch(action).await,
                    None => actions_open = false,
                },
            }
        }
    }
}

/// Message shown for a failed login
fn failure_message(error: &AuthError) -> String {
    match error {
        AuthError::NetworkOrServer { message, .. } => message.clone(),
        AuthError::NoTokenAvailable => "response did not contain a token".to_string(),
        other => other.to_string(),
    }
}
