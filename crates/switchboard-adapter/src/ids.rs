//! Message and tool-use identifiers

use std::time::{SystemTime, UNIX_EPOCH};

/// Backend ids that carry no identity and must be replaced
const PLACEHOLDER_IDS: &[&str] = &[
    "null",
    "none",
    "nil",
    "undefined",
    "id",
    "0",
    "chatcmpl",
    "chatcmpl-",
    "chat-",
    "msg_",
];

/// Prefixes stripped from backend ids before re-prefixing with `msg_`
const BACKEND_PREFIXES: &[&str] = &["chatcmpl-", "chat-", "msg_"];

fn random_hex(len: usize) -> String {
    let mut hex = uuid::Uuid::new_v4().simple().to_string();
    hex.truncate(len);
    hex
}

/// Synthesize a fresh message identifier: `msg_<timestamp><random>`
pub fn message_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);

    format!("msg_{millis:x}{}", random_hex(16))
}

/// Synthesize a tool-use identifier
pub fn tool_use_id() -> String {
    format!("toolu_{}", random_hex(24))
}

/// Whether a backend id is empty or a known placeholder
pub fn is_degenerate(id: &str) -> bool {
    let trimmed = id.trim();
    trimmed.is_empty()
        || PLACEHOLDER_IDS.iter().any(|placeholder| trimmed.eq_ignore_ascii_case(placeholder))
        || trimmed.chars().all(|c| c == '0' || c == '-' || c == '_')
}

/// Derive the client message id from an optional backend id
///
/// Usable ids keep their identity (`chatcmpl-abc` becomes `msg_abc`);
/// missing or degenerate ones are replaced with a fresh identifier.
pub fn from_backend(id: Option<&str>) -> String {
    let Some(id) = id.map(str::trim).filter(|id| !is_degenerate(id)) else {
        return message_id();
    };

    let stripped = BACKEND_PREFIXES
        .iter()
        .find_map(|prefix| id.strip_prefix(prefix))
        .unwrap_or(id);

    if is_degenerate(stripped) {
        message_id()
    } else {
        format!("msg_{stripped}")
    }
}
