// rest/routes/auth.rs — Signup, signin, signout, token refresh.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth;
use crate::rest::error::ApiError;
use crate::rest::extract::AuthUser;
use crate::AppContext;

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

pub async fn signup(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    auth::validate_email(&body.email).map_err(|m| ApiError::BadRequest(m.to_string()))?;
    auth::validate_password(&body.password).map_err(|m| ApiError::BadRequest(m.to_string()))?;

    if ctx.storage.find_user_by_email(&body.email).await?.is_some() {
        warn!(email = %body.email, "signup rejected: email already registered");
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let hashed = auth::hash_password(&body.password, ctx.config.auth.bcrypt_cost)?;
    let user = ctx
        .storage
        .create_user(&body.email, &hashed, body.name.as_deref())
        .await
        .map_err(|e| {
            // Lost the insert race against a concurrent signup for the same
            // email: the UNIQUE constraint is authoritative.
            if e.to_string().contains("UNIQUE constraint failed") {
                ApiError::Conflict("Email already registered".to_string())
            } else {
                ApiError::Internal(e)
            }
        })?;

    info!(user_id = user.id, "user created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "user": {
                "id": user.id,
                "email": user.email,
                "created_at": user.created_at,
            },
            "message": "Account created successfully",
        })),
    ))
}

#[derive(Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

pub async fn signin(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<SigninRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = ctx.storage.find_user_by_email(&body.email).await?;
    let user = match user {
        Some(u) if auth::verify_password(&body.password, &u.hashed_password) => u,
        _ => {
            warn!(email = %body.email, "failed signin attempt");
            return Err(ApiError::Unauthorized(
                "Incorrect email or password".to_string(),
            ));
        }
    };

    let token = ctx.tokens.issue_access(user.id, &user.email)?;
    let refresh_token = ctx.tokens.issue_refresh(user.id, &user.email)?;
    info!(user_id = user.id, "successful signin");

    Ok(Json(json!({
        "success": true,
        "user": { "id": user.id, "email": user.email },
        "token": token,
        "refresh_token": refresh_token,
        "expires_in": ctx.tokens.access_ttl_secs(),
    })))
}

/// Tokens are stateless, so signout is an acknowledgement: the client
/// discards its copy.
pub async fn signout(AuthUser(_user): AuthUser) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Signed out successfully",
    }))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<Value>, ApiError> {
    let claims = ctx
        .tokens
        .verify_refresh(&body.refresh_token)
        .ok_or_else(|| ApiError::Unauthorized("Invalid refresh token".to_string()))?;

    let token = ctx.tokens.issue_access(claims.user_id, &claims.email)?;
    info!(user_id = claims.user_id, "token refreshed");

    Ok(Json(json!({
        "token": token,
        "token_type": "bearer",
        "expires_in": ctx.tokens.access_ttl_secs(),
    })))
}
