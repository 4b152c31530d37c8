use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use blogpost_be::config::AppConfig;
use blogpost_be::configure_app;
use blogpost_be::models::post::Post;
use blogpost_be::repositories::memory::{MemoryPostTable, MemoryStorage};
use blogpost_be::services::post_service::PostService;
use blogpost_be::views::posts::{EMPTY_HTML, LOAD_ERROR_HTML};
use blogpost_be::AppState;

const BOUNDARY: &str = "----blogpostTestBoundary";

struct Backends {
    storage: Arc<MemoryStorage>,
    table: Arc<MemoryPostTable>,
}

fn backends() -> Backends {
    Backends {
        storage: Arc::new(MemoryStorage::new("http://localhost:8080/storage/post-images")),
        table: Arc::new(MemoryPostTable::starting_at(
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        )),
    }
}

fn state(b: &Backends) -> AppState {
    let config = AppConfig::in_memory();
    let service = PostService::new(b.storage.clone(), b.table.clone());
    AppState::new(config, service).with_local_storage(b.storage.clone())
}

macro_rules! app {
    ($backends:expr) => {{
        let state = state(&$backends);
        let routes = configure_app(state.config.max_upload_bytes);
        test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await
    }};
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

fn multipart(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn form_request(parts: &[Part]) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/posts")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(multipart(parts))
}

fn seeded(title: &str, day: u32) -> Post {
    Post {
        title: title.to_string(),
        body: String::new(),
        image_url: None,
        created_at: Utc.with_ymd_and_hms(2024, 1, day, 3, 0, 0).unwrap(),
    }
}

#[actix_web::test]
async fn json_submission_stores_verbatim_and_renders_escaped() {
    let b = backends();
    let app = app!(b);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/posts")
            .set_json(json!({ "title": "Hello <b>", "body": "" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let rows = b.table.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "Hello <b>");
    assert_eq!(rows[0].body, "");
    assert_eq!(rows[0].image_url, None);

    let html = test::call_and_read_body(&app, test::TestRequest::get().uri("/posts").to_request()).await;
    let html = String::from_utf8(html.to_vec()).unwrap();
    assert!(html.contains("Hello &lt;b&gt;"));
    assert!(!html.contains("<b>"));
}

#[actix_web::test]
async fn form_submission_without_file_inserts_one_row() {
    let b = backends();
    let app = app!(b);

    let resp = test::call_service(
        &app,
        form_request(&[
            Part::Text("title", "  First post "),
            Part::Text("body", " hi "),
            Part::File {
                name: "imageFile",
                file_name: "",
                content_type: "application/octet-stream",
                bytes: b"",
            },
        ])
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["title"], "First post");
    assert_eq!(body["data"]["image_url"], Value::Null);

    assert_eq!(b.table.insert_calls(), 1);
    assert_eq!(b.storage.upload_calls(), 0);
    assert_eq!(b.table.rows()[0].body, "hi");
}

#[actix_web::test]
async fn blank_title_is_rejected_without_backend_calls() {
    let b = backends();
    let app = app!(b);

    let resp = test::call_service(
        &app,
        form_request(&[
            Part::Text("title", "   "),
            Part::File {
                name: "imageFile",
                file_name: "cat.png",
                content_type: "image/png",
                bytes: b"png",
            },
        ])
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "タイトルは必須です");
    assert_eq!(b.storage.upload_calls(), 0);
    assert_eq!(b.table.insert_calls(), 0);
    assert_eq!(b.table.select_calls(), 0);
}

#[actix_web::test]
async fn form_submission_with_image_uploads_and_serves_it() {
    let b = backends();
    let app = app!(b);

    let resp = test::call_service(
        &app,
        form_request(&[
            Part::Text("title", "Cat"),
            Part::File {
                name: "imageFile",
                file_name: "cat photo.png",
                content_type: "image/png",
                bytes: b"\x89PNG-bytes",
            },
        ])
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let names = b.storage.object_names();
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with(".png"));

    let url = b.table.rows()[0].image_url.clone().unwrap();
    assert_eq!(url, format!("http://localhost:8080/storage/post-images/{}", names[0]));

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/storage/post-images/{}", names[0]))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(test::read_body(resp).await.as_ref(), b"\x89PNG-bytes");

    let html = test::call_and_read_body(&app, test::TestRequest::get().uri("/posts").to_request()).await;
    let html = String::from_utf8(html.to_vec()).unwrap();
    assert!(html.contains(&format!(r#"<img src="{}" alt="投稿画像">"#, url)));
}

#[actix_web::test]
async fn upload_failure_reports_error_and_inserts_nothing() {
    let b = backends();
    b.storage.fail_uploads(true);
    let app = app!(b);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/posts")
            .set_json(json!({
                "title": "t",
                "image": {
                    "image_data": "aGVsbG8=",
                    "file_name": "a.jpg",
                    "content_type": "image/jpeg"
                }
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = test::read_body_json(resp).await;
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("投稿失敗: "));
    assert!(message.contains("simulated network error"));

    assert_eq!(b.table.insert_calls(), 0);
    assert_eq!(b.table.select_calls(), 0);
}

#[actix_web::test]
async fn insert_failure_leaves_orphaned_object() {
    let b = backends();
    b.table.fail_inserts(true);
    let app = app!(b);

    let resp = test::call_service(
        &app,
        form_request(&[
            Part::Text("title", "t"),
            Part::File {
                name: "imageFile",
                file_name: "a.gif",
                content_type: "image/gif",
                bytes: b"GIF89a",
            },
        ])
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(b.storage.object_names().len(), 1);
    assert!(b.table.rows().is_empty());
}

#[actix_web::test]
async fn fetch_failure_renders_fixed_message() {
    let b = backends();
    b.table.push(seeded("hidden", 1));
    b.table.fail_selects(true);
    let app = app!(b);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/posts").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert_eq!(html, LOAD_ERROR_HTML);
    assert!(!html.contains("post-card"));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/posts").to_request()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn posts_render_newest_first() {
    let b = backends();
    b.table.push(seeded("T1", 1));
    b.table.push(seeded("T3", 3));
    b.table.push(seeded("T2", 2));
    let app = app!(b);

    let html = test::call_and_read_body(&app, test::TestRequest::get().uri("/posts").to_request()).await;
    let html = String::from_utf8(html.to_vec()).unwrap();
    let t3 = html.find("<h4>T3</h4>").unwrap();
    let t2 = html.find("<h4>T2</h4>").unwrap();
    let t1 = html.find("<h4>T1</h4>").unwrap();
    assert!(t3 < t2 && t2 < t1);

    let body: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/api/posts").to_request()).await;
    let titles: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["T3", "T2", "T1"]);
}

#[actix_web::test]
async fn long_body_is_stored_in_full_and_rendered_truncated() {
    let b = backends();
    let app = app!(b);
    let long_body = "b".repeat(200);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/posts")
            .set_json(json!({ "title": "long", "body": long_body }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(b.table.rows()[0].body.chars().count(), 200);

    let html = test::call_and_read_body(&app, test::TestRequest::get().uri("/posts").to_request()).await;
    let html = String::from_utf8(html.to_vec()).unwrap();
    assert!(html.contains(&format!("<p>{}</p>", "b".repeat(120))));
    assert!(!html.contains(&"b".repeat(121)));
}

#[actix_web::test]
async fn index_page_shows_form_and_empty_state() {
    let b = backends();
    let app = app!(b);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(html.contains(r#"<form id="postForm""#));
    assert!(html.contains(EMPTY_HTML));
}

#[actix_web::test]
async fn invalid_base64_is_a_bad_request() {
    let b = backends();
    let app = app!(b);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/posts")
            .set_json(json!({
                "title": "t",
                "image": { "image_data": "!!!", "file_name": "a.png", "content_type": "image/png" }
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(b.storage.upload_calls(), 0);
}

#[actix_web::test]
async fn unknown_storage_object_is_not_found() {
    let b = backends();
    let app = app!(b);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/storage/post-images/missing.png").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn json_body_without_title_gets_error_envelope() {
    let b = backends();
    let app = app!(b);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/posts")
            .set_json(json!({ "body": "no title here" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("title"));
    assert_eq!(b.table.insert_calls(), 0);
}

#[actix_web::test]
async fn malformed_json_gets_error_envelope() {
    let b = backends();
    let app = app!(b);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/posts")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"title\": ")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "error");
    assert!(body["data"].is_null());
    assert_eq!(b.storage.upload_calls(), 0);
}

#[actix_web::test]
async fn image_url_escapes_reserved_characters_and_still_serves() {
    let b = backends();
    let app = app!(b);

    let resp = test::call_service(
        &app,
        form_request(&[
            Part::Text("title", "Hash"),
            Part::File {
                name: "imageFile",
                file_name: "odd.p#g",
                content_type: "image/png",
                bytes: b"hash-bytes",
            },
        ])
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let name = b.storage.object_names().remove(0);
    assert!(name.ends_with(".p#g"));
    let url = b.table.rows()[0].image_url.clone().unwrap();
    let stem = name.trim_end_matches(".p#g");
    assert_eq!(
        url,
        format!("http://localhost:8080/storage/post-images/{}.p%23g", stem)
    );

    let path = url.trim_start_matches("http://localhost:8080");
    let resp = test::call_service(&app, test::TestRequest::get().uri(path).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(test::read_body(resp).await.as_ref(), b"hash-bytes");
}
