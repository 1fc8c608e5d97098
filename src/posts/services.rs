use bytes::Bytes;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::repo::{NewPost, Post};
use crate::{
    auth::repo::User,
    error::ApiError,
    state::AppState,
    storage::{ResourceType, UploadOptions},
};

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
    pub file_name: String,
    pub caption: Option<String>,
}

/// Uploads the asset, then records the post. A failed insert removes the
/// freshly uploaded asset again.
pub async fn upload_post(st: &AppState, user: &User, item: UploadItem) -> Result<Post, ApiError> {
    let opts = UploadOptions {
        folder: st.config.assets.folder.clone(),
        content_type: item.content_type.clone(),
    };
    let asset = st
        .assets
        .upload(item.body, opts)
        .await
        .map_err(ApiError::AssetStore)?;

    let new = NewPost {
        caption: item.caption,
        url: asset.secure_url,
        file_type: item.content_type,
        file_name: item.file_name,
        public_id: asset.public_id.clone(),
        user_id: user.id,
    };
    match st.posts.insert(new).await {
        Ok(post) => {
            info!(user_id = %user.id, post_id = %post.id, public_id = %post.public_id, "post created");
            Ok(post)
        }
        Err(e) => {
            if let Err(cleanup) = st.assets.delete(&asset.public_id, asset.resource_type).await {
                error!(error = %cleanup, public_id = %asset.public_id, "orphaned asset after failed insert");
            }
            Err(ApiError::Database(e))
        }
    }
}

pub async fn feed(st: &AppState) -> Result<Vec<Post>, ApiError> {
    st.posts.list_all().await.map_err(ApiError::Database)
}

pub async fn feed_for(st: &AppState, user: &User) -> Result<Vec<Post>, ApiError> {
    st.posts.list_by_user(user.id).await.map_err(ApiError::Database)
}

/// Deletes a post owned by `user`: remote asset first, then the row.
pub async fn delete_post(st: &AppState, user: &User, raw_id: &str) -> Result<(), ApiError> {
    let not_found = || ApiError::not_found("Post not found!");
    let post_id = Uuid::parse_str(raw_id).map_err(|_| not_found())?;
    let post = st
        .posts
        .find_by_id(post_id)
        .await
        .map_err(ApiError::Database)?
        .ok_or_else(not_found)?;

    if post.user_id != user.id {
        warn!(user_id = %user.id, %post_id, owner = %post.user_id, "delete of foreign post refused");
        return Err(ApiError::Forbidden);
    }

    let resource_type = ResourceType::detect(&post.file_type);
    st.assets
        .delete(&post.public_id, resource_type)
        .await
        .map_err(ApiError::AssetStore)?;

    if let Err(e) = st.posts.delete(post_id).await {
        error!(%post_id, public_id = %post.public_id, "row left behind after asset delete");
        return Err(ApiError::Database(e));
    }
    info!(user_id = %user.id, %post_id, "post deleted");
    Ok(())
}
