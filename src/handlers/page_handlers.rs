// src/handlers/page_handlers.rs - HTML page, posts fragment and the multipart form endpoint
use actix_multipart::{Multipart, MultipartError};
use actix_web::{get, post, web, HttpResponse};
use futures::StreamExt;
use log::{error, info};
use thiserror::Error;

use crate::handlers::post_handlers::{submission_response, ApiResponse};
use crate::services::post_service::{ImageUpload, PostSubmission};
use crate::views::page::render_page;
use crate::views::posts::render_posts;
use crate::AppState;

const HTML: &str = "text/html; charset=utf-8";

#[derive(Debug, Error)]
pub enum FormError {
    #[error("malformed form data: {0}")]
    Multipart(#[from] MultipartError),
    #[error("field {0} is not valid UTF-8")]
    InvalidUtf8(String),
    #[error("upload exceeds {0} bytes")]
    TooLarge(usize),
}

/// GET /
#[get("/")]
pub async fn index(app_state: web::Data<AppState>) -> HttpResponse {
    let posts = render_posts(
        app_state.post_service.list().await,
        &app_state.config.display_offset,
    );
    HttpResponse::Ok().content_type(HTML).body(render_page(&posts))
}

/// GET /posts
/// Rendered post cards; a fetch failure is reported inside the fragment.
#[get("/posts")]
pub async fn posts_fragment(app_state: web::Data<AppState>) -> HttpResponse {
    let html = render_posts(
        app_state.post_service.list().await,
        &app_state.config.display_offset,
    );
    HttpResponse::Ok().content_type(HTML).body(html)
}

/// POST /posts
/// Form submission: `title`, `body`, optional `imageFile`
#[post("/posts")]
pub async fn submit_post_form(app_state: web::Data<AppState>, payload: Multipart) -> HttpResponse {
    let submission = match read_submission(payload, app_state.config.max_upload_bytes).await {
        Ok(s) => s,
        Err(FormError::TooLarge(limit)) => {
            return HttpResponse::PayloadTooLarge()
                .json(ApiResponse::error(format!("Image must be at most {} bytes", limit)));
        }
        Err(e) => {
            error!("Failed to read post form: {}", e);
            return HttpResponse::BadRequest().json(ApiResponse::error(e.to_string()));
        }
    };

    info!(
        "Form submission: title={:?}, image={:?}",
        submission.title,
        submission.image.as_ref().map(|i| &i.file_name)
    );
    submission_response(app_state.post_service.submit(submission).await)
}

/// GET /storage/{bucket}/{name}
/// Serves images held by the in-memory backend; 404 for every other backend.
#[get("/storage/{bucket}/{name}")]
pub async fn serve_local_object(
    app_state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (bucket, name) = path.into_inner();
    let object = app_state
        .local_storage
        .as_ref()
        .filter(|_| bucket == app_state.config.bucket_name)
        .and_then(|storage| storage.object(&name));

    match object {
        Some(object) => HttpResponse::Ok()
            .content_type(object.content_type)
            .body(object.bytes),
        None => HttpResponse::NotFound().json(ApiResponse::error("Object not found")),
    }
}

/// GET /health
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Collects the form fields. Only the first `imageFile` part with a filename counts;
/// an empty file input arrives with an empty filename and is ignored.
pub async fn read_submission(
    mut payload: Multipart,
    max_upload_bytes: usize,
) -> Result<PostSubmission, FormError> {
    let mut submission = PostSubmission::default();

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(|f| f.to_string());
        let content_type = field.content_type().map(|m| m.to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let bytes = chunk?;
            if data.len() + bytes.len() > max_upload_bytes {
                return Err(FormError::TooLarge(max_upload_bytes));
            }
            data.extend_from_slice(&bytes);
        }

        match name.as_str() {
            "title" => submission.title = text_field(&name, data)?,
            "body" => submission.body = Some(text_field(&name, data)?),
            "imageFile" if submission.image.is_none() => {
                if let Some(file_name) = file_name.filter(|f| !f.is_empty()) {
                    submission.image = Some(ImageUpload {
                        file_name,
                        content_type: content_type
                            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string()),
                        bytes: data,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(submission)
}

fn text_field(name: &str, data: Vec<u8>) -> Result<String, FormError> {
    String::from_utf8(data).map_err(|_| FormError::InvalidUtf8(name.to_string()))
}
