//! Authentication route handlers.
//!
//! Login exchanges credentials for a backend bearer token and keeps it in the
//! server-side session; the browser only ever sees the session cookie.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use marketmate_core::{Credentials, Registration};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::backend::BackendError;
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::auth::LOGIN_PATH;
use crate::middleware::{Layout, set_current_user};
use crate::models::session as session_data;
use crate::models::{CurrentUser, Flash};
use crate::state::AppState;

const REGISTER_PATH: &str = "/auth?mode=register";

// =============================================================================
// Forms
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AuthPageQuery {
    pub mode: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login / register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth.html")]
pub struct AuthTemplate {
    pub layout: Layout,
    pub register_mode: bool,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the login form, or the registration form with `?mode=register`.
#[instrument(skip(layout))]
pub async fn page(layout: Layout, Query(query): Query<AuthPageQuery>) -> impl IntoResponse {
    AuthTemplate {
        layout,
        register_mode: query.mode.as_deref() == Some("register"),
    }
}

/// Handle login form submission.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Redirect {
    match sign_in(&state, &session, &form).await {
        Ok(user) => {
            tracing::info!(username = %user.username, "User logged in");
            set_sentry_user(&user.username, user.email.as_deref());
            let welcome = Flash::success(format!("Welcome, {}!", user.username));
            session_data::push_flash(&session, welcome).await;
            Redirect::to("/")
        }
        Err(e) => {
            tracing::warn!("Login failed: {e}");
            session_data::push_flash(&session, Flash::error("Invalid username or password")).await;
            Redirect::to(LOGIN_PATH)
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum SignInError {
    #[error("invalid credentials: {0}")]
    Credentials(#[from] marketmate_core::CredentialsError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

async fn sign_in(
    state: &AppState,
    session: &Session,
    form: &LoginForm,
) -> Result<CurrentUser, SignInError> {
    let credentials = Credentials::parse(&form.email, &form.password)?;
    let token = state.backend().login(&credentials).await?;
    let info = state.backend().user_info(&token).await?;
    let user = CurrentUser::from_info(token, &info);

    session.cycle_id().await?;
    set_current_user(session, &user).await?;

    match state.backend().basket(&user.token).await {
        Ok(basket) => session_data::set_basket(session, &basket).await?,
        Err(e) => tracing::warn!("Failed to load basket for {}: {e}", user.username),
    }

    Ok(user)
}

/// Handle registration form submission.
#[instrument(skip(state, session, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Redirect {
    let registration = match Registration::parse(&form.username, &form.email, &form.password) {
        Ok(registration) => registration,
        Err(e) => {
            session_data::push_flash(&session, Flash::error(e.to_string())).await;
            return Redirect::to(REGISTER_PATH);
        }
    };

    match state.backend().register(&registration).await {
        Ok(_) => {
            tracing::info!(username = %registration.username, "User registered");
            session_data::push_flash(
                &session,
                Flash::success("Registration successful. Please log in."),
            )
            .await;
            Redirect::to(LOGIN_PATH)
        }
        Err(e) => {
            tracing::warn!("Registration failed: {e}");
            let message = e
                .visitor_message()
                .unwrap_or("Registration failed. Please try again.")
                .to_string();
            session_data::push_flash(&session, Flash::error(message)).await;
            Redirect::to(REGISTER_PATH)
        }
    }
}

/// Handle logout.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Redirect {
    if let Err(e) = session.flush().await {
        tracing::error!("Failed to clear session: {e}");
    }
    clear_sentry_user();
    session_data::push_flash(&session, Flash::success("Logged out successfully.")).await;
    Redirect::to("/")
}
