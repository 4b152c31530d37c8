// src/handlers/post_handlers.rs - JSON API for posts

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use base64::{engine::general_purpose, Engine as _};
use log::{error, info};

use crate::dtos::post_dtos::{CreatePostDTO, PostOut, UploadImageDTO};
use crate::models::post::NewPost;
use crate::services::post_service::{ImageUpload, PostError, PostSubmission};
use crate::AppState;

#[derive(serde::Serialize)]
pub(crate) struct ApiResponse<T: serde::Serialize> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    pub fn success(message: &str, data: T) -> Self {
        ApiResponse {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        ApiResponse {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }
}

/// Rejected JSON bodies get the same envelope as every other API error.
pub(crate) fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let message = format!("Invalid request body: {}", err);
    let response = match err {
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            HttpResponse::PayloadTooLarge().json(ApiResponse::error(message))
        }
        _ => HttpResponse::BadRequest().json(ApiResponse::error(message)),
    };
    InternalError::from_response(err, response).into()
}

/// Turns the outcome of a submission into the response the form script expects.
pub(crate) fn submission_response(result: Result<NewPost, PostError>) -> HttpResponse {
    match result {
        Ok(post) => HttpResponse::Created().json(ApiResponse::success(
            "Post created successfully",
            PostOut::from(post),
        )),
        Err(PostError::Validation(msg)) => HttpResponse::BadRequest().json(ApiResponse::error(msg)),
        Err(e) => {
            error!("Failed to create post: {}", e);
            HttpResponse::InternalServerError().json(ApiResponse::error(format!("投稿失敗: {}", e)))
        }
    }
}

/// POST /api/posts
/// JSON submission, image sent as base64
#[post("/posts")]
pub async fn create_post(
    app_state: web::Data<AppState>,
    body: web::Json<CreatePostDTO>,
) -> HttpResponse {
    let dto = body.into_inner();
    info!("Create post request: title={:?}, image={}", dto.title, dto.image.is_some());

    let image = match dto.image {
        Some(image) => match decode_image(image) {
            Ok(image) => Some(image),
            Err(msg) => return HttpResponse::BadRequest().json(ApiResponse::error(msg)),
        },
        None => None,
    };

    if let Some(image) = &image {
        if image.bytes.len() > app_state.config.max_upload_bytes {
            return HttpResponse::PayloadTooLarge().json(ApiResponse::error("Image is too large"));
        }
    }

    let submission = PostSubmission {
        title: dto.title,
        body: dto.body,
        image,
    };
    submission_response(app_state.post_service.submit(submission).await)
}

/// GET /api/posts
/// All posts, newest first
#[get("/posts")]
pub async fn list_posts(app_state: web::Data<AppState>) -> HttpResponse {
    match app_state.post_service.list().await {
        Ok(posts) => {
            info!("Posts retrieved: {} items", posts.len());
            let out: Vec<PostOut> = posts.into_iter().map(PostOut::from).collect();
            HttpResponse::Ok().json(ApiResponse::success("Posts retrieved successfully", out))
        }
        Err(e) => {
            error!("Failed to list posts: {}", e);
            HttpResponse::InternalServerError().json(ApiResponse::error("Failed to retrieve posts"))
        }
    }
}

fn decode_image(image: UploadImageDTO) -> Result<ImageUpload, String> {
    // strip a data URL prefix if present (data:image/jpeg;base64,)
    let base64_data = match image.image_data.split_once(',') {
        Some((_, data)) => data,
        None => image.image_data.as_str(),
    };

    let bytes = general_purpose::STANDARD
        .decode(base64_data.trim())
        .map_err(|e| {
            error!("Failed to decode base64 image: {}", e);
            "Invalid base64 image data".to_string()
        })?;

    let content_type = if image.content_type.trim().is_empty() {
        mime::APPLICATION_OCTET_STREAM.to_string()
    } else {
        image.content_type.trim().to_string()
    };

    Ok(ImageUpload {
        file_name: image.file_name,
        content_type,
        bytes,
    })
}
