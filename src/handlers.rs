use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Context;

/// Validates the user's answer and, on success, writes what it extracted into
/// the context. Must not touch the context when returning `false`.
pub type HandlerFn = fn(&str, &mut Context) -> bool;

#[derive(Clone, Copy)]
pub struct RegisteredHandler {
    pub name: &'static str,
    pub handler: HandlerFn,
    /// Context keys the handler writes on success.
    pub provides: &'static [&'static str],
}

impl std::fmt::Debug for RegisteredHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredHandler")
            .field("name", &self.name)
            .field("provides", &self.provides)
            .finish()
    }
}

const HANDLERS: &[RegisteredHandler] = &[
    RegisteredHandler {
        name: "capture_name",
        handler: capture_name,
        provides: &["name"],
    },
    RegisteredHandler {
        name: "capture_email",
        handler: capture_email,
        provides: &["email"],
    },
    // Names used by catalogs written for the first version of the bot.
    RegisteredHandler {
        name: "handle_name",
        handler: capture_name,
        provides: &["name"],
    },
    RegisteredHandler {
        name: "handle_email",
        handler: capture_email,
        provides: &["email"],
    },
];

pub fn lookup(name: &str) -> Option<&'static RegisteredHandler> {
    HANDLERS.iter().find(|entry| entry.name == name)
}

pub fn capture_name(text: &str, context: &mut Context) -> bool {
    let name = text.trim();
    if name.is_empty() {
        return false;
    }
    context.insert("name".to_string(), name.to_string());
    true
}

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\w+-][\w.+-]*@[\w-]+(?:\.[\w-]+)+").expect("valid email pattern")
});

pub fn capture_email(text: &str, context: &mut Context) -> bool {
    let Some(found) = EMAIL_PATTERN.find(text) else {
        return false;
    };
    context.insert("email".to_string(), found.as_str().to_string());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_trimmed_and_stored() {
        let mut context = Context::new();
        assert!(capture_name("  Вениамин \n", &mut context));
        assert_eq!(context.get("name").map(String::as_str), Some("Вениамин"));
    }

    #[test]
    fn blank_name_is_rejected_without_touching_context() {
        let mut context = Context::new();
        assert!(!capture_name("   ", &mut context));
        assert!(!capture_name("", &mut context));
        assert!(context.is_empty());
    }

    #[test]
    fn email_is_extracted_from_sentence() {
        for text in [
            "мой адрес email@email.ru.",
            "мой адрес:email@email.ru",
            "<email@email.ru>",
            "(email@email.ru)",
            "email: \"email@email.ru\"",
        ] {
            let mut context = Context::new();
            assert!(capture_email(text, &mut context), "{text} rejected");
            assert_eq!(
                context.get("email").map(String::as_str),
                Some("email@email.ru"),
                "{text}"
            );
        }
    }

    #[test]
    fn implausible_emails_are_rejected() {
        for text in ["not-an-email", "мой адрес email@email", "@email.ru", "a@.", "a@b.", "a@.ru"] {
            let mut context = Context::new();
            assert!(!capture_email(text, &mut context), "{text} accepted");
            assert!(context.is_empty());
        }
    }

    #[test]
    fn registry_resolves_known_names_only() {
        assert_eq!(lookup("capture_email").map(|entry| entry.provides), Some(&["email"][..]));
        assert!(lookup("handle_name").is_some());
        assert!(lookup("handle_phone").is_none());
    }
}
