//! Authentication extractors.
//!
//! A visitor is logged in when the session holds a [`CurrentUser`] (set at
//! login from the backend token and `/api/me/info`).

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::CurrentUser;
use crate::models::session::keys;

/// Login page anonymous visitors are sent to.
pub const LOGIN_PATH: &str = "/auth";

/// Logged-in visitor; anonymous requests are redirected to [`LOGIN_PATH`].
pub struct RequireAuth(pub CurrentUser);

/// Logged-in visitor, if any.
pub struct OptionalAuth(pub Option<CurrentUser>);

/// Why [`RequireAuth`] turned a request away.
pub enum AuthRejection {
    Anonymous,
    /// Route is mounted outside the session layer.
    MissingSession,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Anonymous => Redirect::to(LOGIN_PATH).into_response(),
            Self::MissingSession => {
                tracing::error!("Auth extractor used on a route without sessions");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Read the session user. A session that fails to load counts as anonymous.
async fn session_user(parts: &Parts) -> Result<Option<CurrentUser>, AuthRejection> {
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AuthRejection::MissingSession)?;

    match session.get::<CurrentUser>(keys::CURRENT_USER).await {
        Ok(user) => Ok(user),
        Err(e) => {
            tracing::warn!("Failed to read session user: {e}");
            Ok(None)
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_user(parts)
            .await?
            .map(Self)
            .ok_or(AuthRejection::Anonymous)
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_user(parts).await.ok().flatten()))
    }
}

/// Store `user` as the logged-in visitor.
///
/// # Errors
///
/// Returns the session store error if the write fails.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CURRENT_USER, user).await
}
