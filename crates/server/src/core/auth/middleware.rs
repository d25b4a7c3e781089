use crate::core::config::AppState;
use crate::core::ctx::{Ctx, CtxExtResult};
use crate::core::error::{Error, Result};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;

/// Resolve the bearer token (if any) into a [`Ctx`].
///
/// Never rejects: the outcome is stored in the request extensions and the
/// `Ctx` extractor turns a failure into a 401 for handlers that need it.
pub async fn mw_ctx_resolve(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = bearer_token(req.headers());
    let result = match token {
        Ok(token) => resolve(&state, token).await,
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        debug!("MIDDLEWARE: ctx_resolve - {:?}", e);
    }
    req.extensions_mut().insert::<CtxExtResult>(result);

    next.run(req).await
}

/// Format: "Bearer <token>"
pub fn bearer_token(headers: &HeaderMap) -> Result<String> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or(Error::AuthFailNoToken)?
        .to_str()
        .map_err(|_| Error::AuthFailTokenWrongFormat)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or(Error::AuthFailTokenWrongFormat)
}

async fn resolve(state: &AppState, token: String) -> CtxExtResult {
    let user = state
        .auth
        .validate_session(&token)
        .await
        .map_err(|_| Error::LoginFail)?;

    Ok(Ctx::new(user.id, token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(Error::AuthFailNoToken)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(
            bearer_token(&headers),
            Err(Error::AuthFailTokenWrongFormat)
        ));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer  "));
        assert!(matches!(
            bearer_token(&headers),
            Err(Error::AuthFailTokenWrongFormat)
        ));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok-123"));
        assert_eq!(bearer_token(&headers).unwrap(), "tok-123");
    }
}
