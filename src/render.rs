// Status surface
// What the lifecycle shows the user, and which actions it offers

use std::fmt;
use std::sync::Mutex;

use crate::auth::TokenStatus;

/// User actions offered next to a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    ApplyToken,
    Relogin,
}

/// One rendering of the status surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusView {
    Status(TokenStatus),
    LoggingIn,
    LegacyLoggingIn,
    LoginSucceeded { email: Option<String> },
    LoginFailed { message: String },
    AllLoginsFailed,
    TokenApplied,
}

impl StatusView {
    /// Actions attached for this view
    pub fn actions(&self) -> &'static [UserAction] {
        match self {
            StatusView::Status(status) if status.is_usable() => {
                &[UserAction::ApplyToken, UserAction::Relogin]
            }
            StatusView::Status(_) => &[UserAction::Relogin],
            _ => &[],
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StatusView::LoginFailed { .. }
                | StatusView::AllLoginsFailed
                | StatusView::Status(TokenStatus::Invalid)
                | StatusView::Status(TokenStatus::Absent)
        )
    }
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusView::Status(status) => write!(f, "{}", status),
            StatusView::LoggingIn => write!(f, "Logging in..."),
            StatusView::LegacyLoggingIn => write!(f, "Trying legacy login..."),
            StatusView::LoginSucceeded { email } => write!(
                f,
                "Login succeeded - {}",
                email.as_deref().unwrap_or(crate::auth::UNKNOWN_USER)
            ),
            StatusView::LoginFailed { message } => write!(f, "Login failed - {}", message),
            StatusView::AllLoginsFailed => write!(f, "All login methods failed"),
            StatusView::TokenApplied => write!(f, "Token applied"),
        }
    }
}

/// Render callback for the status surface
pub trait StatusRenderer: Send + Sync {
    fn render(&self, view: &StatusView);
}

/// Renders status views as log lines
#[derive(Debug, Default)]
pub struct TracingRenderer;

impl StatusRenderer for TracingRenderer {
    fn render(&self, view: &StatusView) {
        let actions = view.actions();
        if view.is_failure() {
            tracing::warn!(actions = ?actions, "{}", view);
        } else {
            tracing::info!(actions = ?actions, "{}", view);
        }
    }
}

/// Keeps every rendered view
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    views: Mutex<Vec<StatusView>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn views(&self) -> Vec<StatusView> {
        self.views
            .lock()
            .map(|views| views.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<StatusView> {
        self.views().pop()
    }
}

impl StatusRenderer for RecordingRenderer {
    fn render(&self, view: &StatusView) {
        if let Ok(mut views) = self.views.lock() {
            views.push(view.clone());
        }
    }
}
