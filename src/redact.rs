use regex::Regex;

use crate::event::{ErrorInfo, Properties, PropertyValue};

/// Fixed, non-reversible replacement for sensitive values.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Substrings that flag a property key, or a `key[:=]value` pair inside free
/// text, as sensitive. Matched case-insensitively.
const SENSITIVE_PATTERNS: [&str; 9] = [
    "password",
    "token",
    "secret",
    "apikey",
    "authorization",
    "bearer",
    "credential",
    "accesskey",
    "secretkey",
];

/// Scrubs sensitive values from free text and structured property maps before
/// an event is stored. Redaction never fails; text no pattern matches passes
/// through untouched.
pub(crate) struct Redactor {
    // None only if the pattern failed to compile, in which case free text
    // passes through as-is.
    pattern: Option<Regex>,
    replacement: String,
}

impl Default for Redactor {
    fn default() -> Self {
        let keys = SENSITIVE_PATTERNS.join("|");
        let pattern = Regex::new(&format!(
            r#"(?i)([\w.-]*(?:{keys})[\w.-]*"?\s*[:=]\s*)("[^"]*"|\S+)"#
        ))
        .ok();

        Self {
            pattern,
            replacement: format!("${{1}}{REDACTION_MARKER}"),
        }
    }
}

impl Redactor {
    /// Rewrite every `key[:=]value` occurrence with a sensitive key so that
    /// only the marker remains in place of the value. Idempotent: the marker
    /// itself redacts to the marker.
    pub fn redact(&self, message: &str) -> String {
        match &self.pattern {
            Some(pattern) => pattern
                .replace_all(message, self.replacement.as_str())
                .into_owned(),
            None => message.to_string(),
        }
    }

    /// Replace the entire value of any sensitive key, regardless of type.
    /// String values under other keys still go through the free-text
    /// redactor; nested maps are visited recursively.
    pub fn redact_properties(&self, properties: Properties) -> Properties {
        properties
            .into_iter()
            .map(|(key, value)| {
                let value = if key_is_sensitive(&key) {
                    PropertyValue::String(REDACTION_MARKER.to_string())
                } else {
                    self.redact_value(value)
                };

                (key, value)
            })
            .collect()
    }

    fn redact_value(&self, value: PropertyValue) -> PropertyValue {
        match value {
            PropertyValue::String(text) => PropertyValue::String(self.redact(&text)),
            PropertyValue::Map(nested) => PropertyValue::Map(self.redact_properties(nested)),
            other => other,
        }
    }

    /// Redact every message in an error cause chain.
    pub fn redact_error(&self, error: ErrorInfo) -> ErrorInfo {
        ErrorInfo {
            kind: error.kind,
            message: self.redact(&error.message),
            stack_trace: error.stack_trace,
            cause: error
                .cause
                .map(|cause| Box::new(self.redact_error(*cause))),
        }
    }
}

fn key_is_sensitive(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key.contains(pattern))
}
