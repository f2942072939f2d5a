// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the platform's OAuth and messaging endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of the code, upgrade, and refresh token endpoints.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Sometimes numeric, sometimes a string.
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    pub fn user_id(&self) -> Option<String> {
        match self.user_id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
pub struct MeResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct SendRequest<'a> {
    pub recipient: Recipient<'a>,
    pub message: MessageText<'a>,
}

#[derive(Debug, Serialize)]
pub struct Recipient<'a> {
    pub id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct MessageText<'a> {
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub message_id: Option<String>,
}

/// Extracts a readable message from a platform error body.
///
/// Graph errors look like `{"error": {"message", "type", "code"}}`; the OAuth
/// host uses a flat `{"error_type", "code", "error_message"}`.
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    if let Some(err) = value.get("error").and_then(Value::as_object) {
        let message = err.get("message").and_then(Value::as_str).unwrap_or("");
        let kind = err.get("type").and_then(Value::as_str).unwrap_or("error");
        return Some(match err.get("code").and_then(Value::as_i64) {
            Some(code) => format!("{kind} (code {code}): {message}"),
            None => format!("{kind}: {message}"),
        });
    }
    let message = value.get("error_message").and_then(Value::as_str)?;
    let kind = value
        .get("error_type")
        .and_then(Value::as_str)
        .unwrap_or("error");
    Some(format!("{kind}: {message}"))
}

/// Graph error code, when the body carries one.
pub fn error_code(body: &str) -> Option<i64> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .or_else(|| value.get("code"))
        .and_then(Value::as_i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_accepts_number_or_string() {
        let numeric: TokenResponse =
            serde_json::from_str(r#"{"access_token":"t","user_id":17841400000000000}"#).unwrap();
        assert_eq!(numeric.user_id().as_deref(), Some("17841400000000000"));

        let text: TokenResponse =
            serde_json::from_str(r#"{"access_token":"t","user_id":"abc"}"#).unwrap();
        assert_eq!(text.user_id().as_deref(), Some("abc"));

        let missing: TokenResponse = serde_json::from_str(r#"{"access_token":"t"}"#).unwrap();
        assert!(missing.user_id().is_none());
    }

    #[test]
    fn reads_both_error_shapes() {
        let graph = r#"{"error":{"message":"Invalid OAuth access token","type":"OAuthException","code":190}}"#;
        assert_eq!(
            error_message(graph).unwrap(),
            "OAuthException (code 190): Invalid OAuth access token"
        );
        assert_eq!(error_code(graph), Some(190));

        let flat = r#"{"error_type":"OAuthException","code":400,"error_message":"This authorization code has been used"}"#;
        assert_eq!(
            error_message(flat).unwrap(),
            "OAuthException: This authorization code has been used"
        );
        assert_eq!(error_code(flat), Some(400));

        assert!(error_message("<html>bad gateway</html>").is_none());
    }
}
