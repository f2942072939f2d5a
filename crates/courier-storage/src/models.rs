// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types and column conversions shared by the query modules.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use courier_core::{Credential, CourierError, RefreshState, TokenKind};
use rusqlite::types::Type;

use crate::crypto::TokenCipher;

/// A `credentials` row before the token is unsealed.
#[derive(Clone)]
pub struct CredentialRow {
    pub subject_id: String,
    pub token: Vec<u8>,
    pub nonce: Option<Vec<u8>>,
    pub token_kind: TokenKind,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub refresh_state: RefreshState,
    pub refresh_attempts: u32,
    pub next_refresh_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl CredentialRow {
    /// Seals the token when a cipher is configured.
    pub fn seal(credential: &Credential, cipher: Option<&TokenCipher>) -> Result<Self, CourierError> {
        let (token, nonce) = match cipher {
            Some(cipher) => {
                let (ct, nonce) = cipher.seal(credential.access_token.as_bytes())?;
                (ct, Some(nonce.to_vec()))
            }
            None => (credential.access_token.as_bytes().to_vec(), None),
        };
        Ok(Self {
            subject_id: credential.subject_id.clone(),
            token,
            nonce,
            token_kind: credential.token_kind,
            issued_at: credential.issued_at,
            expires_at: credential.expires_at,
            refresh_state: credential.refresh_state,
            refresh_attempts: credential.refresh_attempts,
            next_refresh_at: credential.next_refresh_at,
            last_error: credential.last_error.clone(),
        })
    }

    pub fn open(self, cipher: Option<&TokenCipher>) -> Result<Credential, CourierError> {
        let token = match (&self.nonce, cipher) {
            (Some(nonce), Some(cipher)) => cipher.open(nonce, &self.token)?,
            (Some(_), None) => {
                return Err(CourierError::store(format!(
                    "credential for {} is encrypted but no token_encryption_key is configured",
                    self.subject_id
                )));
            }
            (None, _) => self.token,
        };
        let access_token = String::from_utf8(token).map_err(CourierError::store)?;
        Ok(Credential {
            subject_id: self.subject_id,
            access_token,
            token_kind: self.token_kind,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            refresh_state: self.refresh_state,
            refresh_attempts: self.refresh_attempts,
            next_refresh_at: self.next_refresh_at,
            last_error: self.last_error,
        })
    }
}

/// Timestamps are stored as Unix milliseconds.
pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(idx: usize, millis: i64) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp out of range: {millis}").into(),
        )
    })
}

/// Parses a strum-backed TEXT column.
pub(crate) fn parse_enum<T>(idx: usize, value: String) -> Result<T, rusqlite::Error>
where
    T: FromStr<Err = strum::ParseError>,
{
    T::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn plaintext_row_keeps_token_bytes() {
        let cred = Credential::long_lived("u1", "tok", Utc::now(), Duration::days(60));
        let row = CredentialRow::seal(&cred, None).unwrap();
        assert!(row.nonce.is_none());
        assert_eq!(row.token, b"tok");
        assert_eq!(row.open(None).unwrap(), cred);
    }

    #[test]
    fn encrypted_row_needs_the_key() {
        let cipher = TokenCipher::generate().unwrap();
        let cred = Credential::long_lived("u1", "tok", Utc::now(), Duration::days(60));
        let row = CredentialRow::seal(&cred, Some(&cipher)).unwrap();
        assert!(row.nonce.is_some());
        assert_ne!(row.token, b"tok");
        assert!(row.clone().open(None).is_err());
        assert_eq!(row.open(Some(&cipher)).unwrap().access_token, "tok");
    }

    #[test]
    fn millis_round_trip_and_reject_out_of_range() {
        let now = DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap();
        assert_eq!(from_millis(0, to_millis(now)).unwrap(), now);
        assert!(from_millis(0, i64::MAX).is_err());
    }
}
