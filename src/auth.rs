use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use pairchat_error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header some clients use instead of `Authorization`
pub const TOKEN_HEADER: &str = "x-token";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // user_id
    pub exp: i64,
    pub iat: i64,
}

/// Turns a bearer token into a user id. Token issuance lives in the
/// external auth service; this side only verifies.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(&self, token: &str) -> AppResult<Uuid>;
}

/// HS256 tokens signed with the shared `JWT_SECRET`
pub struct JwtValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Sign a token for `user_id`. Used by local tooling and tests.
    pub fn issue(&self, user_id: Uuid, ttl: Duration) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }
}

#[async_trait]
impl CredentialValidator for JwtValidator {
    async fn validate(&self, token: &str) -> AppResult<Uuid> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims.sub)
    }
}

/// Pull a token from `x-token`, `Authorization: Bearer ...`, or a `token`
/// query parameter (browsers cannot set headers on a websocket upgrade).
pub fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    let from_header = headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = from_header {
        return Some(token.to_string());
    }

    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    query_token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Resolve the caller of a request or upgrade, rejecting missing tokens
pub async fn authenticate(
    validator: &dyn CredentialValidator,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> AppResult<Uuid> {
    let token = extract_token(headers, query_token)
        .ok_or_else(|| AppError::auth("Missing authentication token"))?;
    validator.validate(&token).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret-that-is-at-least-32-characters";

    #[tokio::test]
    async fn test_issued_token_validates() {
        let validator = JwtValidator::new(SECRET);
        let user = Uuid::new_v4();
        let token = validator.issue(user, Duration::hours(1)).unwrap();
        assert_eq!(validator.validate(&token).await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_expired_and_foreign_tokens_rejected() {
        let validator = JwtValidator::new(SECRET);
        let user = Uuid::new_v4();

        let expired = validator.issue(user, Duration::hours(-2)).unwrap();
        assert!(matches!(
            validator.validate(&expired).await,
            Err(AppError::Jwt(_))
        ));

        let other = JwtValidator::new("another-secret-that-is-also-32-characters");
        let foreign = other.issue(user, Duration::hours(1)).unwrap();
        assert!(validator.validate(&foreign).await.is_err());
    }

    #[test]
    fn test_extract_token_precedence() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers, None), None);
        assert_eq!(extract_token(&headers, Some("q")), Some("q".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer bearer-token"));
        assert_eq!(
            extract_token(&headers, Some("q")),
            Some("bearer-token".to_string())
        );

        headers.insert(TOKEN_HEADER, HeaderValue::from_static("header-token"));
        assert_eq!(
            extract_token(&headers, Some("q")),
            Some("header-token".to_string())
        );
    }

    #[tokio::test]
    async fn test_authenticate_without_token_is_auth_error() {
        let validator = JwtValidator::new(SECRET);
        let result = authenticate(&validator, &HeaderMap::new(), None).await;
        assert!(matches!(result, Err(AppError::Auth(_))));
    }
}
