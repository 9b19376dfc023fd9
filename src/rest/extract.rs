// rest/extract.rs — Bearer-token extractor.
//
// Resolves the Authorization header to a loaded user row. Routes under
// /api/{user_id}/... additionally call `ensure_owner` so a valid token can
// never read or mutate another user's resources.

use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use super::error::ApiError;
use crate::{storage::UserRow, AppContext};

pub struct AuthUser(pub UserRow);

impl FromRequestParts<Arc<AppContext>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;
        let claims = ctx
            .tokens
            .verify_access(token)
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))?;
        let user = ctx
            .storage
            .get_user(claims.user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;
        Ok(AuthUser(user))
    }
}

/// Reject access to another user's resources.
pub fn ensure_owner(user: &UserRow, path_user_id: i64) -> Result<(), ApiError> {
    if user.id != path_user_id {
        tracing::warn!(
            user_id = user.id,
            path_user_id,
            "cross-user access attempt rejected"
        );
        return Err(ApiError::Forbidden("Access denied".to_string()));
    }
    Ok(())
}
