//! Bearer-token checks for the HTTP API.
//!
//! Two tiers: `api_token` gates every endpoint, `admin_token` additionally
//! gates mutating operations (cache clear, conflict correction). Either token
//! may be unset; an unset `api_token` leaves the API open for local
//! development, and an unset `admin_token` means admin operations only require
//! the regular token.

use axum::http::{header, HeaderMap};
use secrecy::{ExposeSecret, SecretString};

use tarifario_core::config::AuthConfig;

#[derive(Clone, Default)]
pub struct AuthTokens {
    api_token: Option<SecretString>,
    admin_token: Option<SecretString>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthRejection {
    MissingToken,
    InvalidToken,
    AdminRequired,
}

/// Which credential the caller presented. Reported back on mutating
/// operations (the clear-cache envelope carries a `usuario` field).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthTier {
    Anonymous,
    Api,
    Admin,
}

impl AuthTier {
    pub fn label(self) -> &'static str {
        match self {
            AuthTier::Anonymous => "anonimo",
            AuthTier::Api => "api",
            AuthTier::Admin => "admin",
        }
    }
}

impl AuthTokens {
    pub fn from_config(auth: &AuthConfig) -> Self {
        Self { api_token: auth.api_token.clone(), admin_token: auth.admin_token.clone() }
    }

    #[cfg(test)]
    pub fn with_tokens(api_token: Option<&str>, admin_token: Option<&str>) -> Self {
        Self {
            api_token: api_token.map(|token| token.to_owned().into()),
            admin_token: admin_token.map(|token| token.to_owned().into()),
        }
    }

    pub fn authorize(&self, headers: &HeaderMap, admin: bool) -> Result<AuthTier, AuthRejection> {
        let presented = bearer_token(headers);

        let Some(expected) = &self.api_token else {
            return Ok(AuthTier::Anonymous);
        };

        let presented = presented.ok_or(AuthRejection::MissingToken)?;
        let is_api = presented == expected.expose_secret();
        let is_admin =
            self.admin_token.as_ref().is_some_and(|token| presented == token.expose_secret());
        if !is_api && !is_admin {
            return Err(AuthRejection::InvalidToken);
        }
        if admin && self.admin_token.is_some() && !is_admin {
            return Err(AuthRejection::AdminRequired);
        }

        Ok(if is_admin { AuthTier::Admin } else { AuthTier::Api })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
