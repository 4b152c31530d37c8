// src/repositories/post_repository.rs - posts table over PostgREST or a direct Postgres pool

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use deadpool_postgres::Pool;
use log::{debug, error};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio_postgres::Row;
use urlencoding::encode;

use crate::config::SupabaseConfig;
use crate::models::post::{parse_timestamp, NewPost, Post};
use crate::repositories::storage::error_message;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("supabase error: {0}")]
    Supabase(String),
    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    #[error("other: {0}")]
    Other(String),
}

/// Table of blog posts: append-only, read back in bulk.
#[async_trait]
pub trait PostTable: Send + Sync {
    async fn insert(&self, post: NewPost) -> Result<(), TableError>;

    /// Every row, newest `created_at` first.
    async fn list_latest(&self) -> Result<Vec<Post>, TableError>;
}

/// Row shape as PostgREST returns it; everything except the title may be null.
#[derive(Deserialize, Debug)]
struct PostRow {
    title: String,
    body: Option<String>,
    image_url: Option<String>,
    created_at: String,
}

impl TryFrom<PostRow> for Post {
    type Error = TableError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let created_at = parse_timestamp(&row.created_at).ok_or_else(|| {
            TableError::Other(format!("invalid created_at '{}'", row.created_at))
        })?;
        Ok(Post {
            title: row.title,
            body: row.body.unwrap_or_default(),
            image_url: row.image_url.filter(|url| !url.is_empty()),
            created_at,
        })
    }
}

/// Posts table exposed through Supabase's PostgREST endpoint.
#[derive(Clone)]
pub struct SupabasePostTable {
    client: Client,
    base_rest_url: String,
    service_key: String,
    table: String,
}

impl SupabasePostTable {
    pub fn new(client: Client, supabase: &SupabaseConfig, table: impl Into<String>) -> Self {
        let url = supabase.url.trim_end_matches('/');
        let base_rest_url = if url.ends_with("/rest/v1") {
            url.to_string()
        } else {
            format!("{}/rest/v1", url)
        };
        Self {
            client,
            base_rest_url,
            service_key: supabase.service_role_key.clone(),
            table: table.into(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/{}", self.base_rest_url, encode(&self.table))
    }
}

#[async_trait]
impl PostTable for SupabasePostTable {
    async fn insert(&self, post: NewPost) -> Result<(), TableError> {
        let url = self.table_url();
        let payload = json!([{
            "title": post.title,
            "body": post.body,
            "image_url": post.image_url,
        }]);

        debug!("Inserting post into {}: {}", url, payload);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Post insert failed: {} - {}", status, body);
            return Err(TableError::Supabase(
                error_message(&body).unwrap_or_else(|| format!("insert failed: {} {}", status, body)),
            ));
        }

        Ok(())
    }

    async fn list_latest(&self) -> Result<Vec<Post>, TableError> {
        let url = format!("{}?select=*&order=created_at.desc", self.table_url());

        debug!("Fetching posts from: {}", url);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("Posts fetch failed: {} - {}", status, body);
            return Err(TableError::Supabase(
                error_message(&body).unwrap_or_else(|| format!("fetch failed: {} {}", status, body)),
            ));
        }

        let rows: Vec<PostRow> = serde_json::from_str(&body)?;
        rows.into_iter().map(Post::try_from).collect()
    }
}

/// Posts table read and written directly through a Postgres pool.
/// Expects `title text, body text, image_url text, created_at timestamptz default now()`;
/// a plain `timestamp` created_at is also accepted.
#[derive(Clone)]
pub struct PgPostTable {
    pool: Pool,
    table: String,
}

impl PgPostTable {
    pub fn new(pool: Pool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

/// Double-quotes an identifier so the configured table name cannot break out of the statement.
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[async_trait]
impl PostTable for PgPostTable {
    async fn insert(&self, post: NewPost) -> Result<(), TableError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO {} (title, body, image_url) VALUES ($1, $2, $3)",
            quote_ident(&self.table)
        );
        client
            .execute(sql.as_str(), &[&post.title, &post.body, &post.image_url])
            .await?;
        Ok(())
    }

    async fn list_latest(&self) -> Result<Vec<Post>, TableError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT title, body, image_url, created_at FROM {} ORDER BY created_at DESC",
            quote_ident(&self.table)
        );
        let rows = client.query(sql.as_str(), &[]).await?;

        rows.iter().map(post_from_row).collect()
    }
}

/// `created_at` may be `timestamptz` or a plain `timestamp`, the latter taken as UTC.
fn post_from_row(row: &Row) -> Result<Post, TableError> {
    let created_at = match row.try_get::<_, DateTime<Utc>>("created_at") {
        Ok(ts) => ts,
        Err(_) => row.try_get::<_, NaiveDateTime>("created_at")?.and_utc(),
    };
    Ok(Post {
        title: row.try_get("title")?,
        body: row.try_get::<_, Option<String>>("body")?.unwrap_or_default(),
        image_url: row.try_get("image_url")?,
        created_at,
    })
}
