use anyhow::{Result, ensure};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use wingrow_core::{CallerContext, DomainError, DomainResult, Role};

pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub user_id: String,
    pub role: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// HS256 bearer-token verification.
#[derive(Clone)]
pub struct TokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: Option<String>,
}

impl TokenVerifier {
    pub fn new(secret: &str, issuer: Option<String>) -> Result<Self> {
        ensure!(
            secret.len() >= MIN_SECRET_LEN,
            "JWT_SECRET must be at least {MIN_SECRET_LEN} bytes"
        );

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        })
    }

    /// Resolves an `Authorization` header value into the caller.
    pub fn verify_header(&self, header: Option<&str>) -> DomainResult<CallerContext> {
        let token = header
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| DomainError::unauthorized("missing bearer token"))?;
        self.verify(token)
    }

    pub fn verify(&self, token: &str) -> DomainResult<CallerContext> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => DomainError::unauthorized("token expired"),
                ErrorKind::InvalidSignature => DomainError::unauthorized("invalid token signature"),
                _ => DomainError::unauthorized(format!("invalid token: {err}")),
            }
        })?;

        let user_id = data.claims.user_id.trim();
        if user_id.is_empty() {
            return Err(DomainError::unauthorized("token has no user id"));
        }
        let role = data.claims.role.parse::<Role>()?;
        Ok(CallerContext::new(user_id, role))
    }

    /// Mints a token; used by operator tooling and tests.
    pub fn issue(&self, user_id: &str, role: Role, ttl: Duration) -> Result<String> {
        let claims = TokenClaims {
            user_id: user_id.to_string(),
            role: role.as_str().to_string(),
            exp: (Utc::now() + ttl).timestamp(),
            iss: self.issuer.clone(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }
}
