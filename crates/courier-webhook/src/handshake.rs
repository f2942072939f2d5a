// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription verification handshake (`GET /webhook`).

use serde::Deserialize;

use courier_core::CourierError;

/// Query parameters sent by the platform when a subscription is registered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandshakeParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

impl HandshakeParams {
    /// Returns the challenge to echo verbatim, or `Unauthenticated`.
    ///
    /// Always rejects when no verify token is configured.
    pub fn verify(&self, expected: Option<&str>) -> Result<String, CourierError> {
        let expected = expected
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CourierError::Unauthenticated("no verify token configured".into()))?;
        if self.mode.as_deref() != Some("subscribe") {
            return Err(CourierError::Unauthenticated(
                "hub.mode must be subscribe".into(),
            ));
        }
        if self.verify_token.as_deref() != Some(expected) {
            return Err(CourierError::Unauthenticated("verify token mismatch".into()));
        }
        self.challenge
            .clone()
            .ok_or_else(|| CourierError::Unauthenticated("missing hub.challenge".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mode: &str, token: &str, challenge: &str) -> HandshakeParams {
        HandshakeParams {
            mode: Some(mode.into()),
            verify_token: Some(token.into()),
            challenge: Some(challenge.into()),
        }
    }

    #[test]
    fn echoes_challenge_verbatim() {
        let p = params("subscribe", "verify-me", "1158201444 ");
        assert_eq!(p.verify(Some("verify-me")).unwrap(), "1158201444 ");
    }

    #[test]
    fn rejects_wrong_token_mode_or_missing_config() {
        assert!(params("subscribe", "nope", "c").verify(Some("verify-me")).is_err());
        assert!(params("unsubscribe", "verify-me", "c").verify(Some("verify-me")).is_err());
        assert!(params("subscribe", "", "c").verify(Some("")).is_err());
        assert!(params("subscribe", "verify-me", "c").verify(None).is_err());
        assert!(HandshakeParams::default().verify(Some("verify-me")).is_err());
    }

    #[test]
    fn deserializes_dotted_names() {
        let p: HandshakeParams = serde_json::from_str(
            r#"{"hub.mode":"subscribe","hub.verify_token":"t","hub.challenge":"42"}"#,
        )
        .unwrap();
        assert_eq!(p.verify(Some("t")).unwrap(), "42");
    }
}
