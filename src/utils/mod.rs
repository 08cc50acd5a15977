//! Small helpers shared by the application modules.

use serde_json::{json, Value};

/// Treat empty or whitespace-only input the same as a missing field.
pub fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Validation detail entry for a missing field.
pub fn required(field: &str) -> Value {
    json!({ "field": field, "error": "required" })
}

/// Generated avatar for users who never uploaded one.
pub fn default_avatar_url(username: &str) -> String {
    format!(
        "https://ui-avatars.com/api/?name={}&background=random",
        urlencoding::encode(username)
    )
}
