// Documentation UI abstraction
// The host page exposes a fixed set of interactive elements that get operated programmatically

mod memory;
mod prefix;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AuthError, Result};

pub use memory::InMemoryDocsUi;
pub use prefix::{ensure_prefix, PrefixHandler, PREFIX_HANDLER_MARKER};

/// Elements of the documentation UI that the lifecycle operates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiElement {
    /// Opens the authorization dialog
    AuthorizeTrigger,
    /// Token text input inside the dialog
    TokenInput,
    /// Confirms the authorization inside the dialog
    ConfirmButton,
    /// Closes the dialog
    CloseButton,
}

impl UiElement {
    /// CSS selector of the element in Swagger UI
    pub fn selector(&self) -> &'static str {
        match self {
            UiElement::AuthorizeTrigger => ".swagger-ui .auth-wrapper .authorize",
            UiElement::TokenInput => ".swagger-ui .auth-container input[type=\"text\"]",
            UiElement::ConfirmButton => ".swagger-ui .auth-btn-wrapper .authorize",
            UiElement::CloseButton => ".swagger-ui .btn-done",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            UiElement::AuthorizeTrigger => "authorize trigger",
            UiElement::TokenInput => "token input",
            UiElement::ConfirmButton => "confirm button",
            UiElement::CloseButton => "close button",
        }
    }
}

impl fmt::Display for UiElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.selector())
    }
}

/// Transient inline hint shown next to the token input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputHint {
    pub text: String,
    pub duration: Duration,
}

/// Focus and blur callbacks attached to a token input
pub trait InputHandler: Send + Sync {
    /// Called when the input loses focus; `Some` rewrites the value
    fn on_blur(&self, value: &str) -> Option<String>;

    /// Called when the input gains focus
    fn on_focus(&self) -> Option<InputHint>;
}

/// Host documentation UI
///
/// Element operations fail with `UiElementMissing` when the element is not rendered.
#[async_trait]
pub trait DocsUi: Send + Sync {
    async fn is_present(&self, element: UiElement) -> bool;

    /// Simulated user activation (click)
    async fn activate(&self, element: UiElement) -> Result<()>;

    async fn set_input_value(&self, value: &str) -> Result<()>;

    /// Emit an input-changed notification so the UI's own state picks up the value
    async fn notify_input_changed(&self) -> Result<()>;

    async fn has_attribute(&self, element: UiElement, name: &str) -> bool;

    async fn set_attribute(&self, element: UiElement, name: &str, value: &str) -> Result<()>;

    async fn attach_input_handler(&self, handler: Arc<dyn InputHandler>) -> Result<()>;
}

/// Poll until `element` is rendered, giving up after `attempts`
pub async fn wait_for(
    ui: &dyn DocsUi,
    element: UiElement,
    attempts: u32,
    interval: Duration,
) -> Result<()> {
    for attempt in 0..attempts.max(1) {
        if ui.is_present(element).await {
            return Ok(());
        }
        tracing::debug!(attempt = attempt + 1, attempts, "Waiting for {}", element);
        tokio::time::sleep(interval).await;
    }
    Err(AuthError::UiElementMissing(element))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_gives_up() {
        let ui = InMemoryDocsUi::new();
        let err = wait_for(&ui, UiElement::TokenInput, 3, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UiElementMissing(UiElement::TokenInput)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_finds_late_input() {
        let ui = InMemoryDocsUi::new().with_input_render_delay(2);
        ui.activate(UiElement::AuthorizeTrigger).await.unwrap();
        wait_for(&ui, UiElement::TokenInput, 5, Duration::from_millis(100))
            .await
            .unwrap();
    }

    #[test]
    fn test_selectors() {
        assert_eq!(
            UiElement::AuthorizeTrigger.selector(),
            ".swagger-ui .auth-wrapper .authorize"
        );
        assert_eq!(UiElement::CloseButton.selector(), ".swagger-ui .btn-done");
    }
}
