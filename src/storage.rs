use anyhow::Context;
use axum::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use crate::config::AssetStoreConfig;

/// Kind of asset, detected from the content type. Objects are namespaced by
/// it, so uploads and deletes both classify through [`ResourceType::detect`]
/// on the same stored content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Image,
    Video,
    Raw,
}

impl ResourceType {
    /// Any type mentioning "video" is a video; `image/*` is an image; the
    /// rest is raw.
    pub fn detect(content_type: &str) -> Self {
        let ct = content_type.trim().to_ascii_lowercase();
        if ct.contains("video") {
            ResourceType::Video
        } else if ct.starts_with("image/") {
            ResourceType::Image
        } else {
            ResourceType::Raw
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Image => "image",
            ResourceType::Video => "video",
            ResourceType::Raw => "raw",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub folder: String,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct UploadedAsset {
    pub secure_url: String,
    pub public_id: String,
    pub resource_type: ResourceType,
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn upload(&self, body: Bytes, opts: UploadOptions) -> anyhow::Result<UploadedAsset>;
    async fn delete(&self, public_id: &str, resource_type: ResourceType) -> anyhow::Result<()>;
}

/// Fresh public id inside `folder`, keeping a file extension when the
/// content type has a well-known one.
pub fn new_public_id(folder: &str, content_type: &str) -> String {
    let id = Uuid::new_v4();
    let folder = folder.trim_matches('/');
    match ext_from_mime(content_type) {
        Some(ext) => format!("{}/{}.{}", folder, id, ext),
        None => format!("{}/{}", folder, id),
    }
}

pub(crate) fn object_key(public_id: &str, resource_type: ResourceType) -> String {
    format!("{}/{}", resource_type.as_str(), public_id)
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        _ => None,
    }
}

/// S3-compatible object store (AWS, MinIO, R2, ...).
#[derive(Clone)]
pub struct S3AssetStore {
    client: Client,
    bucket: String,
    public_url: String,
}

impl S3AssetStore {
    pub async fn new(cfg: &AssetStoreConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            public_url: cfg.public_url.clone(),
        })
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn upload(&self, body: Bytes, opts: UploadOptions) -> anyhow::Result<UploadedAsset> {
        let resource_type = ResourceType::detect(&opts.content_type);
        let public_id = new_public_id(&opts.folder, &opts.content_type);
        let key = object_key(&public_id, resource_type);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(&opts.content_type)
            .send()
            .await
            .with_context(|| format!("s3 put_object {}", key))?;
        debug!(%key, "asset uploaded");

        Ok(UploadedAsset {
            secure_url: format!("{}/{}", self.public_url, key),
            public_id,
            resource_type,
        })
    }

    async fn delete(&self, public_id: &str, resource_type: ResourceType) -> anyhow::Result<()> {
        let key = object_key(public_id, resource_type);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .with_context(|| format!("s3 delete_object {}", key))?;
        debug!(%key, "asset deleted");
        Ok(())
    }
}
