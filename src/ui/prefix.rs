// Auto-prefix handling for the token input

use std::time::Duration;

use super::{InputHandler, InputHint};

/// Attribute marking a token input that already carries the handler
pub const PREFIX_HANDLER_MARKER: &str = "data-bearer-handler";

/// Prepend `prefix` unless the token already starts with it
pub fn ensure_prefix(token: &str, prefix: &str) -> String {
    if token.starts_with(prefix) {
        token.to_string()
    } else {
        format!("{}{}", prefix, token)
    }
}

/// Rewrites the token input on blur so it always carries the prefix
pub struct PrefixHandler {
    prefix: String,
    hint_duration: Duration,
}

impl PrefixHandler {
    pub fn new(prefix: impl Into<String>, hint_duration: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            hint_duration,
        }
    }

    /// Placeholder set on inputs the handler is attached to
    pub fn placeholder(&self) -> String {
        format!(
            "Enter the token ({} prefix is added automatically)",
            self.prefix.trim()
        )
    }
}

impl InputHandler for PrefixHandler {
    fn on_blur(&self, value: &str) -> Option<String> {
        let value = value.trim();
        if value.is_empty() || value.starts_with(&self.prefix) {
            return None;
        }
        tracing::info!("Added {} prefix to token input", self.prefix.trim());
        Some(ensure_prefix(value, &self.prefix))
    }

    fn on_focus(&self) -> Option<InputHint> {
        Some(InputHint {
            text: format!(
                "Enter only the token. The {} prefix is added automatically.",
                self.prefix.trim()
            ),
            duration: self.hint_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn handler() -> PrefixHandler {
        PrefixHandler::new("Bearer ", Duration::from_secs(3))
    }

    #[test]
    fn test_ensure_prefix() {
        assert_eq!(ensure_prefix("abc", "Bearer "), "Bearer abc");
        assert_eq!(ensure_prefix("Bearer abc", "Bearer "), "Bearer abc");
    }

    #[test]
    fn test_blur_adds_prefix() {
        assert_eq!(handler().on_blur("abc").as_deref(), Some("Bearer abc"));
        assert_eq!(handler().on_blur("  abc  ").as_deref(), Some("Bearer abc"));
    }

    #[test]
    fn test_blur_leaves_empty_and_prefixed_values() {
        assert_eq!(handler().on_blur(""), None);
        assert_eq!(handler().on_blur("   "), None);
        assert_eq!(handler().on_blur("Bearer abc"), None);
    }

    #[test]
    fn test_focus_hint() {
        let hint = handler().on_focus().unwrap();
        assert_eq!(hint.duration, Duration::from_secs(3));
        assert!(hint.text.contains("Bearer"));
    }

    proptest! {
        #[test]
        fn prefix_added_exactly_once(token in "[A-Za-z0-9._-]{1,64}") {
            let once = ensure_prefix(&token, "Bearer ");
            prop_assert_eq!(&once, &format!("Bearer {}", token));
            prop_assert_eq!(ensure_prefix(&once, "Bearer "), once);
        }

        #[test]
        fn blur_is_idempotent(token in "[A-Za-z0-9._-]{1,64}") {
            let h = handler();
            let first = h.on_blur(&token).unwrap();
            prop_assert_eq!(h.on_blur(&first), None);
        }
    }
}
