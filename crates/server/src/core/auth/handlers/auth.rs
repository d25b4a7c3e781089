//! Auth handlers

use crate::core::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::Result;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: i64,
    pub username: String,
}

/// POST /auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    info!("POST /auth/signup - {}", req.email);

    let user = state
        .auth
        .signup(&req.email, &req.username, &req.password)
        .await
        .inspect_err(|e| warn!("Signup failed for {}: {}", req.email, e))?;

    let (_, session) = state.auth.login(&user.email, &req.password).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token: session.token,
            user_id: user.id,
            username: user.username,
        }),
    ))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    info!("POST /auth/login - {}", req.email);

    let (user, session) = state
        .auth
        .login(&req.email, &req.password)
        .await
        .inspect_err(|e| warn!("Login failed for {}: {}", req.email, e))?;

    Ok(Json(AuthResponse {
        token: session.token,
        user_id: user.id,
        username: user.username,
    }))
}

/// POST /auth/logout
pub async fn logout(State(state): State<AppState>, ctx: Ctx) -> Result<StatusCode> {
    info!("POST /auth/logout - user {}", ctx.user_id());
    state.auth.logout(ctx.token()).await?;
    Ok(StatusCode::NO_CONTENT)
}
