use std::collections::{BTreeMap, HashMap};

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use tracing::error;

use crate::event::LogEvent;

pub(crate) type Labels = Vec<(String, String)>;

/// Canonical identity of a label set within one batch.
///
/// Joining the sorted pairs into a single string makes grouping independent
/// of map iteration order; the separators are unlikely to appear in either
/// name or value.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) struct StreamKey(String);

impl StreamKey {
    pub fn new(labels: &mut Labels) -> Self {
        labels.sort();
        StreamKey(
            labels
                .iter()
                .flat_map(|(key, value)| [key.as_str(), "→", value.as_str(), "∇"])
                .collect(),
        )
    }
}

/// One log line: serialized as `["<unix-nanoseconds-as-string>", "<line>"]`.
#[derive(Debug)]
pub(crate) struct LokiEntry {
    pub timestamp_nanos: i64,
    pub line: String,
}

impl Serialize for LokiEntry {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.timestamp_nanos.to_string())?;
        seq.serialize_element(&self.line)?;
        seq.end()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LokiStream {
    pub stream: BTreeMap<String, String>,
    pub values: Vec<LokiEntry>,
}

/// Push payload: https://grafana.com/docs/loki/latest/reference/loki-http-api
#[derive(Debug, Serialize)]
pub(crate) struct PushRequest {
    pub streams: Vec<LokiStream>,
}

// Label names follow the prometheus rules: [a-zA-Z_][a-zA-Z0-9_]*
pub(crate) fn sanitize_label_key(key: &str) -> String {
    key.replacen(invalid_label_key_start_char, "_", 1)
        .replace(invalid_label_key_char, "_")
}

#[inline]
const fn invalid_label_key_start_char(ch: char) -> bool {
    !(ch.is_ascii_alphabetic() || ch == '_')
}

#[inline]
const fn invalid_label_key_char(ch: char) -> bool {
    !(ch.is_ascii_alphanumeric() || ch == '_')
}

fn build_labels(event: &LogEvent, static_labels: &HashMap<String, String>) -> Labels {
    let mut labels: Labels = static_labels
        .iter()
        .map(|(key, value)| (sanitize_label_key(key), value.clone()))
        .collect();

    labels.push(("level".to_string(), event.level.as_label().to_string()));
    labels.push(("hostname".to_string(), event.hostname.clone()));
    labels.push(("service".to_string(), event.service.clone()));
    if let Some(id) = &event.correlation_id {
        labels.push(("correlation_id".to_string(), id.clone()));
    }

    labels
}

fn timestamp_nanos(event: &LogEvent) -> i64 {
    event.timestamp.timestamp_millis() * 1_000_000
}

/// Partition a batch into one stream per distinct label set. Streams appear
/// in first-occurrence order and hold their entries in arrival order; the
/// grouping is recomputed per batch. An event whose serialization fails is
/// dropped here, never surfaced to producers.
pub(crate) fn group_events(
    events: &[LogEvent],
    static_labels: &HashMap<String, String>,
) -> PushRequest {
    let mut streams: Vec<LokiStream> = Vec::new();
    let mut by_key: HashMap<StreamKey, usize> = HashMap::new();

    for event in events {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(err) => {
                error!(message = "failed to serialize event, dropping it", %err);
                continue;
            }
        };

        let mut labels = build_labels(event, static_labels);
        let key = StreamKey::new(&mut labels);
        let entry = LokiEntry {
            timestamp_nanos: timestamp_nanos(event),
            line,
        };

        match by_key.get(&key) {
            Some(&position) => streams[position].values.push(entry),
            None => {
                by_key.insert(key, streams.len());
                streams.push(LokiStream {
                    stream: labels.into_iter().collect(),
                    values: vec![entry],
                });
            }
        }
    }

    PushRequest { streams }
}
