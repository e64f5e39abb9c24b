//! Token authentication against the MOVEit token endpoint.

use std::fmt;

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::client::{api_error, MoveitClient};
use crate::error::Result;
use crate::models::TokenBundle;

/// Token endpoint, relative to the base URL.
const TOKEN_PATH: &str = "/api/v1/token";

/// Credentials sent to the token endpoint, passed through verbatim.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPayload(String);

impl CredentialPayload {
    /// Use an already-encoded payload as-is.
    pub fn raw(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    /// Password grant for a user.
    pub fn password(username: &str, password: &str) -> Self {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "password")
            .append_pair("username", username)
            .append_pair("password", password)
            .finish();
        Self(encoded)
    }

    /// Refresh-token grant, for exchanging the refresh token of an earlier bundle.
    pub fn refresh(refresh_token: &str) -> Self {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", refresh_token)
            .finish();
        Self(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CredentialPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialPayload(<redacted>)")
    }
}

impl MoveitClient {
    /// Exchange credentials for a token bundle.
    ///
    /// The bundle is returned as the server sent it and is not stored by the client.
    pub async fn authenticate(&self, credentials: &CredentialPayload) -> Result<TokenBundle> {
        let url = self.endpoint(TOKEN_PATH);
        debug!(%url, "requesting access token");

        let response = self
            .http()
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(credentials.as_str().to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "token request rejected");
            return Err(api_error(response).await);
        }

        let bundle: TokenBundle = response.json().await?;
        info!(expires_in = ?bundle.expires_in(), "authenticated");

        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_payload_is_form_encoded() {
        let payload = CredentialPayload::password("ops user", "p&ss=word");
        assert_eq!(
            payload.as_str(),
            "grant_type=password&username=ops+user&password=p%26ss%3Dword"
        );
    }

    #[test]
    fn test_refresh_payload() {
        let payload = CredentialPayload::refresh("r-123");
        assert_eq!(payload.as_str(), "grant_type=refresh_token&refresh_token=r-123");
    }

    #[test]
    fn test_raw_payload_passes_through() {
        let payload = CredentialPayload::raw("anything at all");
        assert_eq!(payload.as_str(), "anything at all");
    }

    #[test]
    fn test_debug_hides_payload() {
        let payload = CredentialPayload::password("user", "hunter2");
        assert!(!format!("{:?}", payload).contains("hunter2"));
    }
}
