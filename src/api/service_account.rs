//! Google service account authentication.
//!
//! A service account signs a short-lived JWT with its private key and trades it for an access token
//! at Google's token endpoint (the OAuth 2.0 JWT bearer grant). There is no browser and no refresh
//! token involved; a new token is requested for every fetch.

use crate::api::OAUTH_SCOPES;
use crate::config::Credentials;
use crate::error::{ErrorType, IntoResult, Res};
use crate::Result;
use anyhow::{bail, Context};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Google accepts assertions that are valid for at most one hour.
const ASSERTION_LIFETIME_MINUTES: i64 = 60;

/// The claims of the JWT assertion.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// A service account that can sign assertions.
pub(super) struct ServiceAccount {
    email: String,
    key: EncodingKey,
    token_uri: String,
}

impl ServiceAccount {
    /// Fails with `ErrorType::Config` when the private key is not an RSA PEM key.
    pub(super) fn new(credentials: &Credentials) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(credentials.private_key().as_bytes())
            .context("GOOGLE_PRIVATE_KEY is not a valid RSA private key in PEM format")
            .pub_result(ErrorType::Config)?;
        Ok(Self {
            email: credentials.email().to_string(),
            key,
            token_uri: TOKEN_URI.to_string(),
        })
    }

    pub(super) fn email(&self) -> &str {
        &self.email
    }

    /// Builds the signed assertion for a token request made at `now`.
    fn assertion(&self, now: DateTime<Utc>) -> Res<String> {
        let claims = Claims {
            iss: self.email.clone(),
            scope: OAUTH_SCOPES.join(" "),
            aud: self.token_uri.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(ASSERTION_LIFETIME_MINUTES)).timestamp(),
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .context("Unable to sign the service account assertion")
    }

    /// Requests an access token. Any failure here means the backend cannot be used, so it is
    /// reported as `ErrorType::Source`.
    pub(super) async fn access_token(&self, http: &reqwest::Client) -> Result<String> {
        self.request_token(http).await.pub_result(ErrorType::Source)
    }

    async fn request_token(&self, http: &reqwest::Client) -> Res<String> {
        let assertion = self.assertion(Utc::now())?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", JWT_BEARER_GRANT)
            .append_pair("assertion", &assertion)
            .finish();

        let response = http
            .post(&self.token_uri)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
            .context("Failed to send the token request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("The token request failed with status {status}: {body}");
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse the token response")?;
        debug!(
            "Obtained an access token for {}, expires in {:?}s",
            self.email, token.expires_in
        );
        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    const PRIVATE_KEY: &str = include_str!("testdata/service_account_key.pem");
    const PUBLIC_KEY: &str = include_str!("testdata/service_account_key.pub.pem");

    fn credentials(key: &str) -> Credentials {
        Credentials::new("lunch-bot@lunch-ledger.iam.gserviceaccount.com", key)
    }

    #[test]
    fn test_assertion_claims() {
        let account = ServiceAccount::new(&credentials(PRIVATE_KEY)).unwrap();
        let now = Utc::now();
        let jwt = account.assertion(now).unwrap();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[TOKEN_URI]);
        let decoded = decode::<Claims>(
            &jwt,
            &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();

        let claims = decoded.claims;
        assert_eq!(claims.iss, account.email());
        assert_eq!(
            claims.scope,
            "https://www.googleapis.com/auth/spreadsheets.readonly"
        );
        assert_eq!(claims.aud, TOKEN_URI);
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_escaped_key_is_accepted() {
        // This is how the key usually arrives from an environment variable.
        let escaped = PRIVATE_KEY.replace('\n', "\\n");
        assert!(ServiceAccount::new(&credentials(&escaped)).is_ok());
    }

    #[test]
    fn test_bad_key_is_a_config_error() {
        let err = ServiceAccount::new(&credentials("not a key")).err().unwrap();
        assert_eq!(err.error_type(), ErrorType::Config);
        assert!(err.to_string().contains("GOOGLE_PRIVATE_KEY"));
    }
}
