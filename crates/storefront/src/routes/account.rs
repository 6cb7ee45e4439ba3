//! Account route handlers.
//!
//! The profile page and avatar upload require authentication. Avatar images
//! are proxied so pages only reference same-origin URLs.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use crate::backend::BackendError;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{Layout, RequireAuth, set_current_user};
use crate::models::session as session_data;
use crate::models::{CurrentUser, Flash};
use crate::state::AppState;

pub const ACCOUNT_PATH: &str = "/account";

/// Largest accepted avatar image.
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Account page template.
#[derive(Template, WebTemplate)]
#[template(path = "account.html")]
pub struct AccountTemplate {
    pub layout: Layout,
    pub username: String,
    pub email: Option<String>,
    pub avatar_url: String,
    pub max_avatar_mib: usize,
}

/// Display the account page.
#[instrument(skip(layout, user))]
pub async fn index(RequireAuth(user): RequireAuth, layout: Layout) -> impl IntoResponse {
    AccountTemplate {
        layout,
        avatar_url: user.avatar_url(),
        username: user.username,
        email: user.email,
        max_avatar_mib: MAX_AVATAR_BYTES / (1024 * 1024),
    }
}

/// An image pulled out of the upload form.
struct AvatarUpload {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// Handle avatar upload.
#[instrument(skip(state, session, user, multipart))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Redirect {
    let flash = match read_avatar(multipart).await {
        Ok(upload) => match replace_avatar(&state, &session, &user, upload).await {
            Ok(()) => Flash::success("Your avatar has been updated."),
            Err(e) => {
                tracing::warn!("Failed to update avatar for {}: {e}", user.username);
                Flash::error("Failed to upload your avatar.")
            }
        },
        Err(message) => Flash::error(message),
    };
    session_data::push_flash(&session, flash).await;
    Redirect::to(ACCOUNT_PATH)
}

async fn read_avatar(mut multipart: Multipart) -> Result<AvatarUpload, &'static str> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err("Please choose an image to upload."),
            Err(e) => {
                tracing::warn!("Malformed avatar upload: {e}");
                return Err("The upload could not be read.");
            }
        };
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err("Avatars must be image files.");
        }
        let file_name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or("avatar")
            .to_string();
        let bytes = field.bytes().await.map_err(|e| {
            tracing::warn!("Failed to read avatar upload: {e}");
            "The upload could not be read."
        })?;

        if bytes.is_empty() {
            return Err("Please choose an image to upload.");
        }
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err("Avatars must be 5 MiB or smaller.");
        }
        return Ok(AvatarUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
}

async fn replace_avatar(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    upload: AvatarUpload,
) -> Result<(), AppError> {
    state
        .backend()
        .upload_avatar(&user.token, upload.file_name, &upload.content_type, upload.bytes)
        .await?;

    let info = state.backend().user_info(&user.token).await?;
    let refreshed = CurrentUser::from_info(user.token.clone(), &info);
    set_current_user(session, &refreshed).await?;
    Ok(())
}

/// Serve an avatar image from the backend.
#[instrument(skip(state))]
pub async fn avatar(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, AppError> {
    if !is_plain_file_name(&file) {
        return Err(AppError::BadRequest(format!("invalid avatar name {file:?}")));
    }

    let (content_type, bytes) = state.backend().avatar(&file).await.map_err(|e| match e {
        BackendError::NotFound(_) => AppError::NotFound(format!("avatar {file}")),
        e => AppError::Backend(e),
    })?;

    let content_type = content_type
        .filter(|ct| ct.starts_with("image/"))
        .and_then(|ct| HeaderValue::from_str(&ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, HeaderValue::from_static("private, max-age=300")),
        ],
        bytes,
    )
        .into_response())
}

/// A single path segment with no traversal.
fn is_plain_file_name(file: &str) -> bool {
    !file.is_empty() && !file.contains(['/', '\\']) && !file.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_plain_file_name() {
        assert!(is_plain_file_name("user_default.png"));
        assert!(is_plain_file_name("ana-1712.jpeg"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name("../secrets"));
        assert!(!is_plain_file_name("a/b.png"));
        assert!(!is_plain_file_name("a\\b.png"));
    }
}
