use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of one log occurrence.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Debug,
    Information,
    Warning,
    Error,
    Critical,
}

impl Level {
    /// The value of the `level` stream label.
    pub const fn as_label(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Information => "information",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Critical => "critical",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

pub type Properties = BTreeMap<String, PropertyValue>;

/// A structured property value: string, number, boolean or a nested map.
///
/// Variant order matters for deserialization, `1` must come out as an
/// integer rather than a float.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Map(Properties),
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Integer(value as i64)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Integer(value as i64)
    }
}

impl From<u16> for PropertyValue {
    fn from(value: u16) -> Self {
        PropertyValue::Integer(value as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<Properties> for PropertyValue {
    fn from(value: Properties) -> Self {
        PropertyValue::Map(value)
    }
}

/// Build a [`Properties`] map.
///
/// ```
/// use lokiship::props;
///
/// let properties = props!(
///     "method" => "GET",
///     "status_code" => 200,
/// );
/// assert_eq!(properties.len(), 2);
/// ```
#[macro_export]
macro_rules! props {
    () => { $crate::event::Properties::new() };

    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::event::Properties::new();
        $(
            map.insert(($key).to_string(), $crate::event::PropertyValue::from($value));
        )+
        map
    }};
}

/// One link in an error cause chain.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub kind: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorInfo>>,
}

impl ErrorInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            stack_trace: None,
            cause: None,
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    pub fn caused_by(mut self, cause: ErrorInfo) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Capture an error and its `source()` chain.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self {
            kind: "error".to_string(),
            message: err.to_string(),
            stack_trace: None,
            cause: err.source().map(|cause| Box::new(Self::from_error(cause))),
        }
    }
}

/// One observed log occurrence.
///
/// Events are immutable once constructed; the message, properties and error
/// messages have already been redacted by then.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ErrorInfo>,

    pub hostname: String,
    pub service: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn level_labels() {
        assert_eq!(Level::Information.as_label(), "information");
        assert_eq!(Level::Critical.to_string(), "critical");
    }

    #[test]
    fn property_value_round_trip() {
        let properties = props!(
            "path" => "/api/users",
            "status_code" => 200,
            "duration" => 12.5,
            "cached" => false,
            "client" => props!("ip" => "10.0.0.1"),
        );

        let encoded = serde_json::to_value(&properties).unwrap();
        assert_eq!(
            encoded,
            json!({
                "path": "/api/users",
                "status_code": 200,
                "duration": 12.5,
                "cached": false,
                "client": { "ip": "10.0.0.1" },
            })
        );

        let decoded = serde_json::from_value::<Properties>(encoded).unwrap();
        assert_eq!(decoded, properties);
        assert_eq!(
            decoded["status_code"],
            PropertyValue::Integer(200),
            "integers must not decode as floats"
        );
    }

    #[test]
    fn error_chain_serialization() {
        let chain = ErrorInfo::new("TimeoutError", "request timed out")
            .with_stack_trace("at push()")
            .caused_by(ErrorInfo::new("IoError", "connection reset"));

        let encoded = serde_json::to_value(&chain).unwrap();
        assert_eq!(
            encoded,
            json!({
                "type": "TimeoutError",
                "message": "request timed out",
                "stackTrace": "at push()",
                "cause": { "type": "IoError", "message": "connection reset" },
            })
        );
    }

    #[test]
    fn from_error_walks_sources() {
        let source = std::io::Error::other("connection reset");
        let chain = ErrorInfo::from_error(&source);
        assert_eq!(chain.message, "connection reset");
        assert!(chain.cause.is_none());
    }

    #[test]
    fn event_serializes_camel_case_and_skips_empty() {
        let event = LogEvent {
            timestamp: Utc::now(),
            level: Level::Warning,
            message: "slow request".to_string(),
            correlation_id: Some("abc-123".to_string()),
            user_id: None,
            properties: Properties::new(),
            error_info: None,
            hostname: "web-1".to_string(),
            service: "orders".to_string(),
        };

        let encoded = serde_json::to_value(&event).unwrap();
        let object = encoded.as_object().unwrap();
        assert_eq!(object["level"], json!("warning"));
        assert_eq!(object["correlationId"], json!("abc-123"));
        assert!(!object.contains_key("userId"));
        assert!(!object.contains_key("properties"));
        assert!(!object.contains_key("errorInfo"));
    }
}
