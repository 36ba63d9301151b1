use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use taxi_types::domain::identity::Identity;
use taxi_types::ports::order_repository::OrderRepository;
use taxi_types::ports::user_repository::UserRepository;

use super::server::AppState;
use crate::errors::AppError;

/// The authenticated caller, taken from an `Authorization: Bearer` header.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Identity);

impl<R> FromRequestParts<AppState<R>> for Caller
where
    R: UserRepository + OrderRepository,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<R>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(AUTHORIZATION).ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided.".into())
        })?;
        let value = header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid header string".into()))?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Expected a Bearer token".into()))?;
        let identity = state.accounts.authenticate(token.trim()).await?;
        Ok(Caller(identity))
    }
}
