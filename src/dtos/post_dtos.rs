use serde::{Deserialize, Serialize};

use crate::models::post::{NewPost, Post};

/// JSON body accepted by `POST /api/posts`.
#[derive(Debug, Deserialize)]
pub struct CreatePostDTO {
    pub title: String,
    pub body: Option<String>,
    pub image: Option<UploadImageDTO>,
}

/// Attached image, base64 encoded (a `data:image/png;base64,` prefix is accepted)
#[derive(Debug, Deserialize)]
pub struct UploadImageDTO {
    pub image_data: String,
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostOut {
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    pub created_at: Option<String>,
}

impl From<Post> for PostOut {
    fn from(post: Post) -> Self {
        PostOut {
            title: post.title,
            body: post.body,
            image_url: post.image_url,
            created_at: Some(post.created_at.to_rfc3339()),
        }
    }
}

// rows returned straight from an insert have no server-assigned fields yet
impl From<NewPost> for PostOut {
    fn from(post: NewPost) -> Self {
        PostOut {
            title: post.title,
            body: post.body,
            image_url: post.image_url,
            created_at: None,
        }
    }
}
