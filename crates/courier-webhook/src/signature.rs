// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `X-Hub-Signature-256` verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use courier_core::CourierError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const PREFIX: &str = "sha256=";

/// Verifies HMAC-SHA256 signatures over raw webhook bodies.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[redacted]")
            .finish()
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self) -> Result<HmacSha256, CourierError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| CourierError::Internal(format!("hmac key: {e}")))
    }

    /// Header value the platform would send for `body`.
    pub fn sign(&self, body: &[u8]) -> Result<String, CourierError> {
        let mut mac = self.mac()?;
        mac.update(body);
        Ok(format!("{PREFIX}{}", hex::encode(mac.finalize().into_bytes())))
    }

    /// Checks `header` against `body` in constant time.
    pub fn verify(&self, body: &[u8], header: Option<&str>) -> Result<(), CourierError> {
        let header = header
            .ok_or_else(|| CourierError::Unauthenticated("missing signature header".into()))?;
        let hex_sig = header.trim().strip_prefix(PREFIX).ok_or_else(|| {
            CourierError::Unauthenticated("signature must use sha256=<hex> format".into())
        })?;
        let provided = hex::decode(hex_sig)
            .map_err(|_| CourierError::Unauthenticated("signature is not valid hex".into()))?;

        let mut mac = self.mac()?;
        mac.update(body);
        mac.verify_slice(&provided)
            .map_err(|_| CourierError::Unauthenticated("signature mismatch".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_own_signature() {
        let v = SignatureVerifier::new("app-secret");
        let body = br#"{"object":"instagram","entry":[]}"#;
        let header = v.sign(body).unwrap();
        assert!(header.starts_with("sha256="));
        v.verify(body, Some(&header)).unwrap();
    }

    #[test]
    fn known_vector() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let v = SignatureVerifier::new("key");
        let header = "sha256=f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8";
        v.verify(b"The quick brown fox jumps over the lazy dog", Some(header))
            .unwrap();
    }

    #[test]
    fn rejects_tampering_and_bad_headers() {
        let v = SignatureVerifier::new("app-secret");
        let header = v.sign(b"original").unwrap();
        for (body, header) in [
            (&b"tampered"[..], Some(header.as_str())),
            (&b"original"[..], None),
            (&b"original"[..], Some("sha1=abcd")),
            (&b"original"[..], Some("sha256=zz")),
        ] {
            let err = v.verify(body, header).unwrap_err();
            assert!(matches!(err, CourierError::Unauthenticated(_)), "{header:?}");
        }
    }

    #[test]
    fn other_secret_fails() {
        let header = SignatureVerifier::new("a").sign(b"body").unwrap();
        assert!(SignatureVerifier::new("b").verify(b"body", Some(&header)).is_err());
    }
}
