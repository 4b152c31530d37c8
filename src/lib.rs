pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod services;
pub mod views;

use std::sync::Arc;

use actix_web::web;
use anyhow::{Context, Result};
use reqwest::Client;

use crate::config::{AppConfig, BackendKind};
use crate::handlers::page_handlers::{
    health, index, posts_fragment, serve_local_object, submit_post_form,
};
use crate::handlers::post_handlers::{create_post, json_error_handler, list_posts};
use crate::repositories::memory::{MemoryPostTable, MemoryStorage};
use crate::repositories::post_repository::{PgPostTable, PostTable, SupabasePostTable};
use crate::repositories::storage::{ObjectStorage, SupabaseStorage};
use crate::services::post_service::PostService;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub post_service: PostService,
    /// Set for the in-memory backend so uploaded images can be served back.
    pub local_storage: Option<Arc<MemoryStorage>>,
}

impl AppState {
    pub fn new(config: AppConfig, post_service: PostService) -> Self {
        Self {
            config,
            post_service,
            local_storage: None,
        }
    }

    pub fn with_local_storage(mut self, storage: Arc<MemoryStorage>) -> Self {
        self.local_storage = Some(storage);
        self
    }
}

/// Wires the storage and table implementations selected by `config.backend`.
pub fn build_app_state(config: AppConfig, http_client: Client) -> Result<AppState> {
    let storage: Arc<dyn ObjectStorage>;
    let table: Arc<dyn PostTable>;
    let mut local_storage = None;

    match config.backend {
        BackendKind::Memory => {
            let memory = Arc::new(MemoryStorage::new(format!(
                "http://localhost:{}/storage/{}",
                config.port, config.bucket_name
            )));
            local_storage = Some(memory.clone());
            storage = memory;
            table = Arc::new(MemoryPostTable::new());
        }
        BackendKind::Supabase => {
            let supabase = config.supabase.as_ref().context("supabase settings missing")?;
            storage = Arc::new(SupabaseStorage::new(
                http_client.clone(),
                supabase,
                config.bucket_name.clone(),
            ));
            table = Arc::new(SupabasePostTable::new(
                http_client,
                supabase,
                config.table_name.clone(),
            ));
        }
        BackendKind::Postgres => {
            let supabase = config.supabase.as_ref().context("supabase settings missing")?;
            storage = Arc::new(SupabaseStorage::new(
                http_client,
                supabase,
                config.bucket_name.clone(),
            ));
            table = Arc::new(PgPostTable::new(
                crate::config::get_pg_pool()?,
                config.table_name.clone(),
            ));
        }
    }

    let state = AppState::new(config, PostService::new(storage, table));
    Ok(match local_storage {
        Some(memory) => state.with_local_storage(memory),
        None => state,
    })
}

/// Registers every route. The JSON body limit follows the upload limit so base64 images fit.
pub fn configure_app(max_upload_bytes: usize) -> impl Fn(&mut web::ServiceConfig) + Clone {
    move |cfg: &mut web::ServiceConfig| {
        // base64 inflates by 4/3
        let json_limit = max_upload_bytes / 3 * 4 + 64 * 1024;
        cfg.app_data(
            web::JsonConfig::default()
                .limit(json_limit)
                .error_handler(json_error_handler),
        )
            .service(index)
            .service(health)
            .service(posts_fragment) // GET /posts
            .service(submit_post_form) // POST /posts
            .service(serve_local_object) // GET /storage/{bucket}/{name}
            .service(
                web::scope("/api")
                    .service(create_post) // POST /api/posts
                    .service(list_posts), // GET /api/posts
            );
    }
}
