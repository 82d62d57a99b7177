use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

use super::session::{Identity, IdentityProvider, Session};

/// Claims
///
/// The payload this core expects inside a provider-issued JSON Web Token.
/// Claims are signed by the provider and validated locally on every token
/// verification, so session checks never need a provider round trip.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's UUID, also the key into `public.profiles`.
    pub sub: Uuid,
    /// The email the provider authenticated.
    pub email: String,
    /// Expiration timestamp. Tokens past this point must not be accepted.
    pub exp: usize,
    /// Issued-at timestamp.
    pub iat: usize,
}

/// decode_session
///
/// Verify a raw token against the shared provider secret and turn its claims
/// into a `Session`. Expiry validation is always active.
///
/// Classification matters here: an `ExpiredSignature` is the signal the
/// global interceptor acts on, every other decode failure is an ordinary
/// missing-session condition.
pub fn decode_session(token: &str, secret: &str) -> Result<Session, AuthError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::default();
    validation.validate_exp = true;

    let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
        match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::SessionUnavailable,
        }
    })?;

    let claims = token_data.claims;
    let expires_at: DateTime<Utc> = Utc
        .timestamp_opt(claims.exp as i64, 0)
        .single()
        .ok_or(AuthError::SessionUnavailable)?;

    Ok(Session {
        identity: Identity {
            id: claims.sub,
            email: claims.email,
        },
        token: token.to_string(),
        expires_at,
    })
}

/// Minimal view of the provider's password-grant response.
#[derive(Deserialize)]
struct TokenGrantResponse {
    access_token: String,
}

/// HttpIdentityProvider
///
/// The production `IdentityProvider`: sign-in and sign-out go to the hosted
/// auth API over HTTP, while token verification happens locally against the
/// shared JWT secret.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    jwt_secret: String,
}

impl HttpIdentityProvider {
    pub fn new(base_url: &str, api_key: &str, jwt_secret: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            jwt_secret: jwt_secret.to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify_token(&self, token: &str) -> Result<Session, AuthError> {
        decode_session(token, &self.jwt_secret)
    }

    /// password_sign_in
    ///
    /// Exchange credentials for a token through the provider's password
    /// grant, then verify the returned token exactly like any other before
    /// trusting it.
    async fn password_sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);

        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            // Wrong credentials and rejected accounts both land here.
            return Err(AuthError::SessionUnavailable);
        }

        let grant = response
            .json::<TokenGrantResponse>()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        decode_session(&grant.access_token, &self.jwt_secret)
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        let url = format!("{}/auth/v1/logout", self.base_url);

        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "logout returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
