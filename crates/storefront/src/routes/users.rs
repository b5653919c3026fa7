//! Account routes: registration, session login/logout and the profile.

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireUser, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::routes::extract::ApiJson;
use crate::services::auth::{AuthService, ProfileChanges, Registration};
use crate::services::uploads;
use crate::state::AppState;

/// Multipart field holding the avatar image.
const AVATAR_FIELD: &str = "file";

/// Registration form.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Login form. `identifier` is an e-mail address or phone number.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

/// Profile update; omitted fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
}

/// Password change form.
#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Create an account.
#[tracing::instrument(skip(state, form), fields(username = %form.username))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(form): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = AuthService::new(state.pool())
        .register(Registration {
            username: &form.username,
            email: &form.email,
            password: &form.password,
            phone: form.phone.as_deref(),
        })
        .await?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in and start a session.
#[tracing::instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(form): ApiJson<LoginRequest>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool())
        .login(&form.identifier, &form.password)
        .await?;
    start_session(&session, &user).await?;
    Ok(Json(user))
}

/// Log in to the admin console. Non-admin accounts get 403.
#[tracing::instrument(skip(state, session, form))]
pub async fn admin_login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(form): ApiJson<LoginRequest>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool())
        .admin_login(&form.identifier, &form.password)
        .await?;
    start_session(&session, &user).await?;
    Ok(Json(user))
}

async fn start_session(session: &Session, user: &User) -> Result<()> {
    set_current_user(session, &CurrentUser::from(user)).await?;
    set_sentry_user(&user.id, &user.username);
    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
    Ok(())
}

/// End the session.
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in user's profile.
pub async fn me(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool()).get_user(current.id).await?;
    Ok(Json(user))
}

/// Update the logged-in user's profile.
#[tracing::instrument(skip(state, session, current, form), fields(user_id = %current.id))]
pub async fn update_me(
    State(state): State<AppState>,
    session: Session,
    RequireUser(current): RequireUser,
    ApiJson(form): ApiJson<ProfileRequest>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool())
        .update_profile(
            current.id,
            ProfileChanges {
                username: form.username.as_deref(),
                email: form.email.as_deref(),
                phone: form.phone.as_deref(),
                avatar: form.avatar.as_deref(),
            },
        )
        .await?;

    // Keep the session's display name in step with the profile.
    if user.username != current.username {
        set_current_user(&session, &CurrentUser::from(&user)).await?;
    }
    Ok(Json(user))
}

/// Change the logged-in user's password.
#[tracing::instrument(skip(state, current, form), fields(user_id = %current.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    ApiJson(form): ApiJson<PasswordRequest>,
) -> Result<StatusCode> {
    AuthService::new(state.pool())
        .change_password(current.id, &form.old_password, &form.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upload a new avatar image (multipart field `file`).
#[tracing::instrument(skip(state, current, multipart), fields(user_id = %current.id))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    mut multipart: Multipart,
) -> Result<Json<User>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        let url = uploads::store_image(&state.config().upload_dir, "avatars", &content_type, &bytes)
            .await?;
        let user = AuthService::new(state.pool())
            .set_avatar(current.id, url)
            .await?;
        tracing::info!(avatar = ?user.avatar, "Avatar updated");
        return Ok(Json(user));
    }

    Err(AppError::Validation(format!(
        "multipart field `{AVATAR_FIELD}` is required"
    )))
}
