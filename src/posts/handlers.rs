use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{instrument, warn};

use super::{
    repo::Post,
    services::{self, UploadItem},
};
use crate::{auth::extractors::CurrentUser, error::ApiError, state::AppState};

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: &'static str,
}

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/feed", get(get_feed))
        .route("/feed/mine", get(get_my_feed))
        .route("/posts/:post_id", delete(delete_post))
}

pub fn write_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// POST /upload (multipart): `file` plus an optional `caption`.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn upload(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let bad_body = |e: axum::extract::multipart::MultipartError| {
        warn!(error = %e, "unreadable multipart body");
        ApiError::bad_request("Invalid multipart body")
    };

    let mut file = None;
    let mut caption = None;
    while let Some(field) = mp.next_field().await.map_err(bad_body)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "upload".into());
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field.bytes().await.map_err(bad_body)?;
                file = Some((body, content_type, file_name));
            }
            Some("caption") => {
                let text = field.text().await.map_err(bad_body)?;
                caption = Some(text.trim().to_string()).filter(|c| !c.is_empty());
            }
            _ => {}
        }
    }

    let Some((body, content_type, file_name)) = file else {
        return Err(ApiError::bad_request("file is required"));
    };
    if body.is_empty() {
        return Err(ApiError::bad_request("file is empty"));
    }

    let post = services::upload_post(
        &state,
        &user,
        UploadItem {
            body,
            content_type,
            file_name,
            caption,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[instrument(skip_all)]
pub async fn get_feed(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<Vec<Post>>, ApiError> {
    Ok(Json(services::feed(&state).await?))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_my_feed(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Post>>, ApiError> {
    Ok(Json(services::feed_for(&state, &user).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    services::delete_post(&state, &user, &post_id).await?;
    Ok(Json(DeleteResponse {
        success: true,
        message: "Post deleted successfully",
    }))
}
