//! Authentication middleware and extractors.
//!
//! Sessions are resolved upstream. The [`Authenticator`] turns request headers
//! into an [`AuthenticatedUser`], the middleware stores it in the request
//! extensions, and handlers require it through [`RequireUser`].

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use common::UserId;
use thiserror::Error;

use crate::error::ApiError;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the authenticated user's display name.
pub const USER_NAME_HEADER: &str = "x-user-name";

/// The user a request is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub name: Option<String>,
}

/// Authentication failed for a reason other than a missing session.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Malformed header: {0}")]
    MalformedHeader(&'static str),
}

/// Resolves the user behind a request.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns `None` when the request carries no session.
    async fn authenticate(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<AuthenticatedUser>, AuthError>;
}

/// Trusts identity headers set by an upstream gateway.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustedHeaderAuthenticator;

#[async_trait]
impl Authenticator for TrustedHeaderAuthenticator {
    async fn authenticate(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<AuthenticatedUser>, AuthError> {
        let Some(raw_id) = headers.get(USER_ID_HEADER) else {
            return Ok(None);
        };
        let id = raw_id
            .to_str()
            .map_err(|_| AuthError::MalformedHeader(USER_ID_HEADER))?
            .trim();
        if id.is_empty() {
            return Ok(None);
        }

        let name = headers
            .get(USER_NAME_HEADER)
            .map(|v| {
                v.to_str()
                    .map_err(|_| AuthError::MalformedHeader(USER_NAME_HEADER))
            })
            .transpose()?
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from);

        Ok(Some(AuthenticatedUser {
            id: UserId::new(id),
            name,
        }))
    }
}

/// Middleware placing the [`AuthenticatedUser`] into request extensions.
///
/// Requests without a session pass through unchanged. Authenticator errors
/// are rejected with 401.
pub async fn authenticate(
    State(authenticator): State<Arc<dyn Authenticator>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticator.authenticate(request.headers()).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(error = %e, "authentication failed");
            metrics::counter!("auth_failures_total").increment(1);
            return ApiError::Unauthorized("Authentication failed".to_string()).into_response();
        }
    }

    next.run(request).await
}

/// Extractor that requires an authenticated user.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user): RequireUser) -> String {
///     format!("Hello, {}!", user.id)
/// }
/// ```
pub struct RequireUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(Self)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}
