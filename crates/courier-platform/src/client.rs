// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the platform's Graph-style API.
//!
//! [`GraphClient`] builds requests, bounds them with the configured timeout,
//! and classifies every failure into the error taxonomy. It never retries;
//! retry policy belongs to the exchange, refresh, and dispatch components.

use std::time::Duration;

use async_trait::async_trait;
use courier_config::model::PlatformConfig;
use courier_core::{
    AdapterType, CourierError, HealthStatus, LongLivedGrant, OutboundMessageRequest,
    PlatformClient, PluginAdapter, SendReceipt, ShortLivedGrant,
};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::{
    MeResponse, MessageText, Recipient, SendRequest, SendResponse, TokenResponse, error_code,
    error_message,
};

/// Lifetime assumed when the platform omits `expires_in` on a long-lived token.
const DEFAULT_LONG_LIVED_SECS: i64 = 60 * 24 * 60 * 60;

/// Which call failed, for classification of non-success statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Code,
    Upgrade,
    Refresh,
    Send,
    Me,
}

/// reqwest-backed [`PlatformClient`].
#[derive(Clone)]
pub struct GraphClient {
    client: reqwest::Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    oauth_base_url: String,
    api_base_url: String,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("oauth_base_url", &self.oauth_base_url)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl GraphClient {
    pub fn new(config: &PlatformConfig) -> Result<Self, CourierError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.request_timeout().min(Duration::from_secs(5)))
            .user_agent(concat!("courier/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CourierError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            oauth_base_url: config.oauth_base_url.trim_end_matches('/').to_string(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn require<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, CourierError> {
        value
            .as_deref()
            .ok_or_else(|| CourierError::Config(format!("platform.{key} is not configured")))
    }

    fn url(base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url, CourierError> {
        Url::parse_with_params(&format!("{base}{path}"), params)
            .map_err(|e| CourierError::Config(format!("invalid platform URL {base}{path}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        url: Url,
        bearer: Option<&str>,
    ) -> Result<T, CourierError> {
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(transport_error)?;
        read_json(endpoint, response).await
    }

    /// Resolves the subject id when the code endpoint omits `user_id`.
    async fn me(&self, access_token: &str) -> Result<String, CourierError> {
        let url = Self::url(&self.api_base_url, "/me", &[("fields", "id")])?;
        let me: MeResponse = self.get_json(Endpoint::Me, url, Some(access_token)).await?;
        Ok(me.id)
    }
}

#[async_trait]
impl PlatformClient for GraphClient {
    async fn exchange_code(&self, code: &str) -> Result<ShortLivedGrant, CourierError> {
        let url = Self::url(
            &self.oauth_base_url,
            "/oauth/access_token",
            &[
                ("client_id", Self::require(&self.client_id, "client_id")?),
                (
                    "client_secret",
                    Self::require(&self.client_secret, "client_secret")?,
                ),
                (
                    "redirect_uri",
                    Self::require(&self.redirect_uri, "redirect_uri")?,
                ),
                ("code", code),
                ("grant_type", "authorization_code"),
            ],
        )?;
        let token: TokenResponse = self.get_json(Endpoint::Code, url, None).await?;

        let subject_id = match token.user_id() {
            Some(id) => id,
            None => {
                debug!("code response carried no user_id, resolving via /me");
                // The code is consumed at this point; a failure here is an
                // upgrade-stage failure, not an invalid code.
                self.me(&token.access_token)
                    .await
                    .map_err(|e| match e {
                        CourierError::InvalidCode { message } => {
                            CourierError::UpgradeFailed { message }
                        }
                        other => other,
                    })?
            }
        };

        Ok(ShortLivedGrant {
            access_token: token.access_token,
            subject_id,
            expires_in: token.expires_in.map(chrono::Duration::seconds),
        })
    }

    async fn upgrade(&self, short_lived_token: &str) -> Result<LongLivedGrant, CourierError> {
        let url = Self::url(
            &self.api_base_url,
            "/access_token",
            &[
                ("grant_type", "long_lived_exchange"),
                (
                    "client_secret",
                    Self::require(&self.client_secret, "client_secret")?,
                ),
                ("access_token", short_lived_token),
            ],
        )?;
        let token: TokenResponse = self.get_json(Endpoint::Upgrade, url, None).await?;
        Ok(long_lived(token))
    }

    async fn refresh(&self, long_lived_token: &str) -> Result<LongLivedGrant, CourierError> {
        let url = Self::url(
            &self.api_base_url,
            "/refresh_access_token",
            &[
                ("grant_type", "long_lived_refresh"),
                ("access_token", long_lived_token),
            ],
        )?;
        let token: TokenResponse = self.get_json(Endpoint::Refresh, url, None).await?;
        Ok(long_lived(token))
    }

    async fn send_message(
        &self,
        access_token: &str,
        request: &OutboundMessageRequest,
    ) -> Result<SendReceipt, CourierError> {
        let url = Self::url(&self.api_base_url, "/me/messages", &[])?;
        let body = SendRequest {
            recipient: Recipient {
                id: &request.recipient_id,
            },
            message: MessageText {
                text: &request.body,
            },
        };
        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .header("Idempotency-Key", &request.idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let sent: SendResponse = read_json(Endpoint::Send, response).await?;
        Ok(SendReceipt {
            platform_message_id: sent.message_id,
        })
    }
}

#[async_trait]
impl PluginAdapter for GraphClient {
    fn name(&self) -> &str {
        "graph"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        if self.client_id.is_none() || self.client_secret.is_none() {
            return Ok(HealthStatus::Degraded(
                "platform client credentials not configured; code exchange disabled".into(),
            ));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}

fn long_lived(token: TokenResponse) -> LongLivedGrant {
    let expires_in = token.expires_in.unwrap_or_else(|| {
        warn!("long-lived token response carried no expires_in, assuming 60 days");
        DEFAULT_LONG_LIVED_SECS
    });
    LongLivedGrant {
        access_token: token.access_token,
        expires_in: chrono::Duration::seconds(expires_in),
    }
}

/// Classifies a transport-level failure.
///
/// Only connection failures prove the request never reached the platform.
/// Timeouts and mid-flight errors may have been processed, so they are
/// marked ambiguous.
fn transport_error(e: reqwest::Error) -> CourierError {
    if e.is_connect() {
        CourierError::upstream(format!("connection failed: {e}"))
    } else if e.is_timeout() {
        CourierError::UpstreamUnavailable {
            message: format!("request timed out: {e}"),
            ambiguous: true,
        }
    } else {
        CourierError::UpstreamUnavailable {
            message: format!("HTTP request failed: {e}"),
            ambiguous: true,
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Maps a non-success response onto the taxonomy for the given endpoint.
fn status_error(endpoint: Endpoint, status: StatusCode, body: &str) -> CourierError {
    let message = error_message(body).unwrap_or_else(|| format!("platform returned {status}"));
    if is_transient_status(status) {
        return CourierError::upstream(format!("{status}: {message}"));
    }
    match endpoint {
        Endpoint::Code => CourierError::InvalidCode { message },
        Endpoint::Upgrade | Endpoint::Me => CourierError::UpgradeFailed { message },
        Endpoint::Refresh | Endpoint::Send => {
            // 190 is the platform's "access token invalid or expired" code.
            let message = match error_code(body) {
                Some(190) => format!("access token rejected: {message}"),
                _ => message,
            };
            CourierError::Rejected { message }
        }
    }
}

async fn read_json<T: DeserializeOwned>(
    endpoint: Endpoint,
    response: reqwest::Response,
) -> Result<T, CourierError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;
    debug!(?endpoint, status = %status, "platform response received");

    if !status.is_success() {
        return Err(status_error(endpoint, status, &body));
    }

    serde_json::from_str(&body).map_err(|e| {
        let message = format!("unexpected response body: {e}");
        match endpoint {
            Endpoint::Code => CourierError::InvalidCode { message },
            Endpoint::Upgrade | Endpoint::Me => CourierError::UpgradeFailed { message },
            // A 2xx with an unreadable body still means the platform acted.
            Endpoint::Refresh | Endpoint::Send => CourierError::UpstreamUnavailable {
                message,
                ambiguous: true,
            },
        }
    })
}
