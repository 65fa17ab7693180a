// Copyright 2025-Present Lumbertrace contributors
// SPDX-License-Identifier: Apache-2.0

//! Credential exchange: project id + API key + client details for a session token.
//!
//! ```text
//! POST {endpoint}/api/auth/session
//! {"projectId":"..","apiKey":"..","device":"..","platform":"..","version":".."}
//!
//! 200 "token"        -> SessionToken("token")
//! 4xx/5xx <message>  -> AuthError::Rejected { status, message }
//! ```

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::client_details::ClientMetadata;
use crate::config::Config;
use crate::error::AuthError;
use crate::http::get_client;

pub const AUTH_SESSION_PATH: &str = "/api/auth/session";

/// Opaque token embedded in the stream URI. Immutable once issued.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(Arc<str>);

impl SessionToken {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        SessionToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Exchanges credentials for a [`SessionToken`].
///
/// Any error is fatal to session startup; retrying is the caller's decision.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(
        &self,
        endpoint: &str,
        project_id: &str,
        api_key: &str,
        client: &ClientMetadata,
        cancel: &CancellationToken,
    ) -> Result<SessionToken, AuthError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequest<'a> {
    project_id: &'a str,
    api_key: &'a str,
    device: &'a str,
    platform: &'a str,
    version: &'a str,
}

/// [`Authenticator`] speaking the collector's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpAuthenticator {
    client: reqwest::Client,
}

impl HttpAuthenticator {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(get_client(config))
    }

    async fn exchange(
        &self,
        url: &str,
        body: &AuthRequest<'_>,
    ) -> Result<SessionToken, AuthError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        if status.is_success() {
            Ok(SessionToken::new(trim_quotes(&text)))
        } else {
            Err(AuthError::Rejected {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    async fn authenticate(
        &self,
        endpoint: &str,
        project_id: &str,
        api_key: &str,
        client: &ClientMetadata,
        cancel: &CancellationToken,
    ) -> Result<SessionToken, AuthError> {
        let url = format!("{}{}", endpoint.trim_end_matches('/'), AUTH_SESSION_PATH);
        let body = AuthRequest {
            project_id,
            api_key,
            device: &client.device,
            platform: &client.platform,
            version: &client.version,
        };

        debug!("AUTH | Requesting session token from {url}");
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            result = self.exchange(&url, &body) => result,
        };

        if let Err(e) = &result {
            error!("AUTH | Credential exchange failed: {e}");
        }
        result
    }
}

/// Strips one pair of surrounding double quotes, if present.
pub fn trim_quotes(input: &str) -> &str {
    if input.len() >= 2 && input.starts_with('"') && input.ends_with('"') {
        &input[1..input.len() - 1]
    } else {
        input
    }
}
