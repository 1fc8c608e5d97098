use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use tracing::instrument;

use super::{
    dto::{
        AdminUserUpdate, BearerResponse, EmailRequest, LoginForm, RegisterRequest,
        ResetPasswordRequest, UserRead, UserUpdate, VerifyRequest,
    },
    extractors::{CurrentUser, SuperUser},
    services,
};
use crate::{error::ApiError, state::AppState};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/jwt/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/request-verify-token", post(request_verify_token))
        .route("/auth/verify", post(verify))
}

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me).patch(patch_me))
        .route("/users/:id", get(get_user).patch(patch_user))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<BearerResponse>, ApiError> {
    let access_token = services::authenticate(&state, &form.username, &form.password).await?;
    Ok(Json(BearerResponse {
        access_token,
        token_type: "bearer",
    }))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserRead>), ApiError> {
    let user = services::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<(StatusCode, Json<()>), ApiError> {
    services::forgot_password(&state, &payload.email).await?;
    Ok((StatusCode::ACCEPTED, Json(())))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<()>, ApiError> {
    services::reset_password(&state, &payload.token, payload.password).await?;
    Ok(Json(()))
}

#[instrument(skip(state, payload))]
pub async fn request_verify_token(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<(StatusCode, Json<()>), ApiError> {
    services::request_verify(&state, &payload.email).await?;
    Ok((StatusCode::ACCEPTED, Json(())))
}

#[instrument(skip(state, payload))]
pub async fn verify(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<UserRead>, ApiError> {
    let user = services::verify(&state, &payload.token).await?;
    Ok(Json(user.into()))
}

#[instrument(skip_all)]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<UserRead> {
    Json(user.into())
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn patch_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UserUpdate>,
) -> Result<Json<UserRead>, ApiError> {
    let user = services::update_user(&state, user, payload.into(), false).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, _admin))]
pub async fn get_user(
    State(state): State<AppState>,
    _admin: SuperUser,
    Path(id): Path<String>,
) -> Result<Json<UserRead>, ApiError> {
    let user = services::get_user(&state, &id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, _admin, payload))]
pub async fn patch_user(
    State(state): State<AppState>,
    _admin: SuperUser,
    Path(id): Path<String>,
    Json(payload): Json<AdminUserUpdate>,
) -> Result<Json<UserRead>, ApiError> {
    let user = services::get_user(&state, &id).await?;
    let user = services::update_user(&state, user, payload, true).await?;
    Ok(Json(user.into()))
}
