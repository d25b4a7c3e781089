use crate::core::error::{Error, Result};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use std::convert::Infallible;

/// Authenticated request identity.
#[derive(Clone, Debug)]
pub struct Ctx {
    user_id: i64,
    token: String,
}

/// What the auth resolver left in the request extensions.
pub type CtxExtResult = core::result::Result<Ctx, Error>;

impl Ctx {
    pub fn new(user_id: i64, token: String) -> Self {
        Self { user_id, token }
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<CtxExtResult>()
            .ok_or(Error::AuthFailCtxNotInRequestExt)?
            .clone()
    }
}

impl<S> OptionalFromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> core::result::Result<Option<Self>, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CtxExtResult>()
            .and_then(|res| res.as_ref().ok())
            .cloned())
    }
}
