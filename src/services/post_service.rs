// src/services/post_service.rs - submit and list posts against the injected backends
use std::sync::Arc;

use log::{error, info};
use thiserror::Error;
use uuid::Uuid;

use crate::models::post::{NewPost, Post};
use crate::repositories::post_repository::{PostTable, TableError};
use crate::repositories::storage::{ObjectStorage, StorageError, UploadOptions};

pub const TITLE_REQUIRED: &str = "タイトルは必須です";

#[derive(Debug, Error)]
pub enum PostError {
    #[error("{0}")]
    Validation(String),
    #[error("image upload failed: {0}")]
    Upload(#[source] StorageError),
    #[error("public url lookup failed: {0}")]
    PublicUrl(#[source] StorageError),
    #[error("insert failed: {0}")]
    Insert(#[source] TableError),
}

/// File attached to a submission.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Raw form input, untrimmed.
#[derive(Debug, Clone, Default)]
pub struct PostSubmission {
    pub title: String,
    pub body: Option<String>,
    pub image: Option<ImageUpload>,
}

#[derive(Clone)]
pub struct PostService {
    storage: Arc<dyn ObjectStorage>,
    table: Arc<dyn PostTable>,
}

impl PostService {
    pub fn new(storage: Arc<dyn ObjectStorage>, table: Arc<dyn PostTable>) -> Self {
        Self { storage, table }
    }

    /// Validates, uploads the image if any, then inserts one row.
    ///
    /// The steps run one after another and are not transactional: when the insert
    /// fails after a successful upload the stored object is left behind.
    pub async fn submit(&self, submission: PostSubmission) -> Result<NewPost, PostError> {
        let title = submission.title.trim();
        if title.is_empty() {
            return Err(PostError::Validation(TITLE_REQUIRED.to_string()));
        }
        let body = submission.body.as_deref().unwrap_or("").trim();

        let mut image_url = None;
        if let Some(image) = submission.image {
            let object_name = object_name_for(&image.file_name);
            info!(
                "Uploading image {:?} as {} ({} bytes)",
                image.file_name,
                object_name,
                image.bytes.len()
            );

            self.storage
                .upload(
                    &object_name,
                    image.bytes,
                    UploadOptions {
                        content_type: image.content_type,
                        upsert: false,
                    },
                )
                .await
                .map_err(PostError::Upload)?;

            let url = self
                .storage
                .public_url(&object_name)
                .await
                .map_err(|e| {
                    error!("Object {} uploaded but its URL could not be resolved", object_name);
                    PostError::PublicUrl(e)
                })?;
            image_url = Some(url);
        }

        let new_post = NewPost {
            title: title.to_string(),
            body: body.to_string(),
            image_url,
        };

        if let Err(e) = self.table.insert(new_post.clone()).await {
            if let Some(url) = &new_post.image_url {
                error!("Insert failed, uploaded image is orphaned: {}", url);
            }
            return Err(PostError::Insert(e));
        }

        info!("Post created: {:?}", new_post.title);
        Ok(new_post)
    }

    pub async fn list(&self) -> Result<Vec<Post>, TableError> {
        self.table.list_latest().await
    }
}

/// Collision-resistant object name that keeps the original extension.
/// `写真.JPG` becomes `<uuid>.JPG`; a name without an extension becomes the bare uuid.
pub fn object_name_for(file_name: &str) -> String {
    let id = Uuid::new_v4();
    match extension_of(file_name) {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.to_string(),
    }
}

fn extension_of(file_name: &str) -> Option<&str> {
    // browsers may send a full client path
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}
