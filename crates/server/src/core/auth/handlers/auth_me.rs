use crate::core::auth::{IdentityProvider, User};
use crate::core::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::{Error, Result};
use axum::extract::State;
use axum::Json;

/// GET /auth/me
pub async fn me(State(state): State<AppState>, ctx: Ctx) -> Result<Json<User>> {
    let user = state
        .auth
        .load_by_id(ctx.user_id())
        .await?
        .ok_or_else(|| Error::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}
