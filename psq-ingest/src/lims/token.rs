//! LIMS bearer credential
//!
//! The LIMS uses the OAuth2 JWT-bearer grant: a client assertion signed
//! with the client secret (HS256) is exchanged at `/oauth2/v1/token` for an
//! access token. The assertion lifetime is capped below one hour and its
//! issued-at claim is backdated by a leeway to tolerate clock skew.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use psq_common::time::unix_now;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::LimsSettings;

/// OAuth2 grant type for signed client assertions
pub const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Upper bound on assertion lifetime, seconds
pub const MAX_ASSERTION_LIFETIME_S: i64 = 3300;

const TOKEN_PATH: &str = "/oauth2/v1/token";
const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Credential could not be obtained
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Authentication failed: {0}")]
pub struct AuthError(pub String);

#[derive(Serialize)]
struct Claims<'a> {
    iat: i64,
    exp: i64,
    sub: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenResponse {
    fn error_message(&self) -> Option<String> {
        let error = self.error.as_deref().filter(|e| !e.is_empty())?;
        Some(match self.error_description.as_deref().filter(|d| !d.is_empty()) {
            Some(description) => format!("{}: {}", error, description),
            None => error.to_string(),
        })
    }
}

/// Issued access token and the instant it stops being usable
#[derive(Clone)]
pub struct Credential {
    access_token: String,
    /// Unix seconds
    pub expires_at: i64,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// `(iat, exp)` for an assertion signed at `now`
pub fn assertion_window(now: i64, leeway_s: i64, ttl_s: i64) -> (i64, i64) {
    let issued_at = now - leeway_s;
    (issued_at, issued_at + ttl_s.min(MAX_ASSERTION_LIFETIME_S))
}

/// Compact HS256 JWT with claims `{iat, exp, sub}`
pub fn sign_assertion(client_id: &str, secret: &str, issued_at: i64, expires_at: i64) -> Result<String, AuthError> {
    let claims = Claims {
        iat: issued_at,
        exp: expires_at,
        sub: client_id,
    };
    let claims_json =
        serde_json::to_vec(&claims).map_err(|e| AuthError(format!("Cannot encode assertion claims: {}", e)))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(JWT_HEADER),
        URL_SAFE_NO_PAD.encode(claims_json)
    );

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| AuthError(format!("Cannot use client secret as signing key: {}", e)))?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", signing_input, signature))
}

/// Owns the single active credential
///
/// Not internally synchronized; [`crate::lims::LimsClient`] keeps it behind
/// a mutex so concurrent callers never refresh twice.
pub struct TokenManager {
    http_client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    leeway_s: i64,
    ttl_s: i64,
    credential: Option<Credential>,
}

impl TokenManager {
    pub fn new(http_client: reqwest::Client, settings: &LimsSettings) -> Self {
        Self {
            http_client,
            token_url: format!("{}{}", settings.base_url, TOKEN_PATH),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            leeway_s: settings.jwt_leeway_s,
            ttl_s: settings.jwt_ttl_s,
            credential: None,
        }
    }

    /// True when no credential is held or the current one has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        match &self.credential {
            Some(credential) => credential.access_token.is_empty() || now >= credential.expires_at,
            None => true,
        }
    }

    /// Drop the current credential (e.g. after a 401)
    pub fn invalidate(&mut self) {
        if self.credential.take().is_some() {
            debug!("LIMS credential invalidated");
        }
    }

    /// Drop the credential only if `bearer` is still its header value
    ///
    /// Returns whether the credential was dropped. A rejection of a token
    /// that has since been replaced leaves the newer credential in place.
    pub fn invalidate_if_current(&mut self, bearer: &str) -> bool {
        if self.bearer_header().as_deref() == Some(bearer) {
            self.invalidate();
            true
        } else {
            debug!("Rejected credential already replaced");
            false
        }
    }

    /// `Authorization` header value for the current credential
    pub fn bearer_header(&self) -> Option<String> {
        self.credential
            .as_ref()
            .map(|c| format!("Bearer {}", c.access_token))
    }

    /// Exchange a fresh assertion for an access token
    ///
    /// On any failure the previous credential is cleared, so the next call
    /// re-authenticates instead of reusing a token the server may reject.
    pub async fn authenticate(&mut self) -> Result<(), AuthError> {
        let (issued_at, expires_at) = assertion_window(unix_now(), self.leeway_s, self.ttl_s);

        match self.exchange(issued_at, expires_at).await {
            Ok(access_token) => {
                self.credential = Some(Credential {
                    access_token,
                    expires_at,
                });
                info!(expires_at, "LIMS credential issued");
                Ok(())
            }
            Err(e) => {
                self.credential = None;
                warn!(error = %e, "LIMS authentication failed");
                Err(e)
            }
        }
    }

    async fn exchange(&self, issued_at: i64, expires_at: i64) -> Result<String, AuthError> {
        let assertion = sign_assertion(&self.client_id, &self.client_secret, issued_at, expires_at)?;

        debug!(url = %self.token_url, "Requesting LIMS access token");

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| AuthError(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError(format!("Token response unreadable: {}", e)))?;
        let parsed = serde_json::from_str::<TokenResponse>(&body);

        if !status.is_success() {
            let detail = parsed
                .ok()
                .and_then(|r| r.error_message())
                .unwrap_or(body);
            return Err(AuthError(format!("HTTP {}: {}", status.as_u16(), detail)));
        }

        let parsed = parsed.map_err(|e| AuthError(format!("Token response is not JSON: {}", e)))?;
        if let Some(message) = parsed.error_message() {
            return Err(AuthError(message));
        }

        parsed
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AuthError("No access_token in token response".to_string()))
    }
}
