//! Minimal parser for the adapter's SSE output

use serde_json::Value;

/// One parsed SSE event
#[derive(Debug, Clone)]
pub struct SseEvent {
    /// `event:` line, if any
    pub event: Option<String>,
    /// Joined `data:` lines
    pub data: String,
}

impl SseEvent {
    /// The data payload as JSON
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.data).unwrap_or_else(|e| panic!("invalid event JSON {:?}: {e}", self.data))
    }
}

/// Split a complete SSE body into events, skipping comments
pub fn parse(body: &str) -> Vec<SseEvent> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut event = None;
            let mut data = Vec::new();

            for line in block.lines() {
                if let Some(name) = line.strip_prefix("event:") {
                    event = Some(name.trim().to_owned());
                } else if let Some(payload) = line.strip_prefix("data:") {
                    data.push(payload.strip_prefix(' ').unwrap_or(payload).to_owned());
                }
            }

            (event.is_some() || !data.is_empty()).then(|| SseEvent {
                event,
                data: data.join("\n"),
            })
        })
        .collect()
}

/// Event names in order, `[DONE]` for the end marker
pub fn names(events: &[SseEvent]) -> Vec<String> {
    events
        .iter()
        .map(|e| match &e.event {
            Some(name) => name.clone(),
            None => e.data.clone(),
        })
        .collect()
}
