// In-memory model of the documentation UI's authorization dialog

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;

use super::{DocsUi, InputHandler, UiElement};
use crate::error::{AuthError, Result};

#[derive(Default)]
struct DialogState {
    /// Elements forced absent
    missing: HashSet<UiElement>,

    dialog_open: bool,

    /// Presence checks that fail after the dialog opens before the input is rendered
    input_render_delay: u32,
    pending_render_polls: u32,

    /// Value shown in the input
    input_value: String,

    /// Value the UI's own state last picked up through an input-changed notification
    committed_value: String,

    input_attributes: HashMap<String, String>,
    handler: Option<Arc<dyn InputHandler>>,
    input_events: usize,

    /// Value confirmed through the dialog
    authorized_value: Option<String>,

    hint: Option<(String, Instant)>,
    activations: Vec<UiElement>,
}

/// Swagger-style authorization dialog kept in memory
///
/// Opening the dialog renders a fresh token input, so attributes and handlers
/// from a previous opening are gone, as they are when the real modal re-renders.
#[derive(Default)]
pub struct InMemoryDocsUi {
    state: Mutex<DialogState>,
}

impl InMemoryDocsUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a page where `element` is never rendered
    pub fn without(self, element: UiElement) -> Self {
        self.lock().missing.insert(element);
        self
    }

    /// Token input shows up only after `polls` presence checks
    pub fn with_input_render_delay(self, polls: u32) -> Self {
        self.lock().input_render_delay = polls;
        self
    }

    fn lock(&self) -> MutexGuard<'_, DialogState> {
        // State stays consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn rendered(state: &DialogState, element: UiElement) -> bool {
        if state.missing.contains(&element) {
            return false;
        }
        match element {
            UiElement::AuthorizeTrigger => true,
            UiElement::TokenInput => state.dialog_open && state.pending_render_polls == 0,
            UiElement::ConfirmButton | UiElement::CloseButton => state.dialog_open,
        }
    }

    fn require(state: &DialogState, element: UiElement) -> Result<()> {
        if Self::rendered(state, element) {
            Ok(())
        } else {
            Err(AuthError::UiElementMissing(element))
        }
    }

    /// Value the UI would send as the authorization header
    pub fn authorized_value(&self) -> Option<String> {
        self.lock().authorized_value.clone()
    }

    pub fn is_dialog_open(&self) -> bool {
        self.lock().dialog_open
    }

    pub fn current_input(&self) -> String {
        self.lock().input_value.clone()
    }

    pub fn input_attribute(&self, name: &str) -> Option<String> {
        self.lock().input_attributes.get(name).cloned()
    }

    pub fn input_events(&self) -> usize {
        self.lock().input_events
    }

    pub fn activations(&self) -> Vec<UiElement> {
        self.lock().activations.clone()
    }

    /// Hint text, if one is still showing
    pub fn visible_hint(&self) -> Option<String> {
        let state = self.lock();
        match &state.hint {
            Some((text, until)) if Instant::now() < *until => Some(text.clone()),
            _ => None,
        }
    }

    /// User typing into the input
    pub fn type_text(&self, text: &str) -> Result<()> {
        let mut state = self.lock();
        Self::require(&state, UiElement::TokenInput)?;
        state.input_value = text.to_string();
        state.committed_value = text.to_string();
        state.input_events += 1;
        Ok(())
    }

    /// Input gains focus
    pub fn focus(&self) -> Result<()> {
        let mut state = self.lock();
        Self::require(&state, UiElement::TokenInput)?;
        if let Some(hint) = state.handler.as_ref().and_then(|h| h.on_focus()) {
            if state.hint.is_none() || self.hint_expired(&state) {
                state.hint = Some((hint.text, Instant::now() + hint.duration));
            }
        }
        Ok(())
    }

    fn hint_expired(&self, state: &DialogState) -> bool {
        matches!(&state.hint, Some((_, until)) if Instant::now() >= *until)
    }

    /// Input loses focus
    pub fn blur(&self) -> Result<()> {
        let mut state = self.lock();
        Self::require(&state, UiElement::TokenInput)?;
        let rewritten = state
            .handler
            .as_ref()
            .and_then(|h| h.on_blur(&state.input_value));
        if let Some(value) = rewritten {
            state.input_value = value.clone();
            state.committed_value = value;
            state.input_events += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl DocsUi for InMemoryDocsUi {
    async fn is_present(&self, element: UiElement) -> bool {
        let mut state = self.lock();
        if element == UiElement::TokenInput && state.dialog_open && state.pending_render_polls > 0
        {
            state.pending_render_polls -= 1;
            return false;
        }
        Self::rendered(&state, element)
    }

    async fn activate(&self, element: UiElement) -> Result<()> {
        let mut state = self.lock();
        Self::require(&state, element)?;
        state.activations.push(element);

        match element {
            UiElement::AuthorizeTrigger => {
                state.dialog_open = true;
                state.pending_render_polls = state.input_render_delay;
                state.input_value.clear();
                state.committed_value.clear();
                state.input_attributes.clear();
                state.handler = None;
                state.hint = None;
            }
            UiElement::ConfirmButton => {
                let committed = state.committed_value.clone();
                state.authorized_value = Some(committed);
            }
            UiElement::CloseButton => {
                state.dialog_open = false;
            }
            UiElement::TokenInput => {}
        }
        Ok(())
    }

    async fn set_input_value(&self, value: &str) -> Result<()> {
        let mut state = self.lock();
        Self::require(&state, UiElement::TokenInput)?;
        state.input_value = value.to_string();
        Ok(())
    }

    async fn notify_input_changed(&self) -> Result<()> {
        let mut state = self.lock();
        Self::require(&state, UiElement::TokenInput)?;
        state.committed_value = state.input_value.clone();
        state.input_events += 1;
        Ok(())
    }

    async fn has_attribute(&self, element: UiElement, name: &str) -> bool {
        let state = self.lock();
        element == UiElement::TokenInput
            && Self::rendered(&state, element)
            && state.input_attributes.contains_key(name)
    }

    async fn set_attribute(&self, element: UiElement, name: &str, value: &str) -> Result<()> {
        let mut state = self.lock();
        Self::require(&state, element)?;
        if element == UiElement::TokenInput {
            state
                .input_attributes
                .insert(name.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn attach_input_handler(&self, handler: Arc<dyn InputHandler>) -> Result<()> {
        let mut state = self.lock();
        Self::require(&state, UiElement::TokenInput)?;
        state.handler = Some(handler);
        Ok(())
    }
}
