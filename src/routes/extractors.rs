// ============================================================================
// Axum Extractors
// ============================================================================
//
// - AuthenticatedUser: caller id from `x-token` or `Authorization: Bearer`
//
// ============================================================================

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::authenticate;
use crate::context::AppContext;

/// Extractor for the authenticated user id
///
/// Usage:
/// ```rust,ignore
/// async fn handler(AuthenticatedUser(user_id): AuthenticatedUser) { /* ... */ }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Uuid);

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for AuthenticatedUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = authenticate(state.validator.as_ref(), &parts.headers, None)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Request authentication failed");
                e.into_response()
            })?;

        Ok(AuthenticatedUser(user_id))
    }
}
