// src/repositories/storage.rs - object storage for post images
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use urlencoding::encode;

use crate::config::SupabaseConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage error: {0}")]
    Supabase(String),
    #[error("invalid object name: {0:?}")]
    InvalidName(String),
    #[error("other: {0}")]
    Other(String),
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub content_type: String,
    /// Overwrite an existing object with the same name.
    pub upsert: bool,
}

/// Object storage bucket holding the uploaded images.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        object_name: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> Result<(), StorageError>;

    /// Publicly fetchable URL of an uploaded object.
    async fn public_url(&self, object_name: &str) -> Result<String, StorageError>;
}

/// Supabase Storage bucket, addressed over its REST API with the service role key.
#[derive(Clone)]
pub struct SupabaseStorage {
    client: Client,
    supabase_url: String,
    service_key: String,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(client: Client, supabase: &SupabaseConfig, bucket: impl Into<String>) -> Self {
        Self {
            client,
            supabase_url: supabase.url.trim_end_matches('/').to_string(),
            service_key: supabase.service_role_key.clone(),
            bucket: bucket.into(),
        }
    }

    fn object_url(&self, object_name: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.supabase_url,
            encode(&self.bucket),
            encode(object_name)
        )
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(
        &self,
        object_name: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> Result<(), StorageError> {
        if object_name.is_empty() {
            return Err(StorageError::InvalidName(object_name.to_string()));
        }

        let url = self.object_url(object_name);
        debug!(
            "Uploading {} bytes to {} ({})",
            bytes.len(),
            url,
            options.content_type
        );

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Content-Type", &options.content_type)
            .header("x-upsert", if options.upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Storage upload failed: {} - {}", status, text);
            return Err(StorageError::Supabase(error_message(&text).unwrap_or_else(
                || format!("upload failed: {} {}", status, text),
            )));
        }

        Ok(())
    }

    async fn public_url(&self, object_name: &str) -> Result<String, StorageError> {
        if object_name.is_empty() {
            return Err(StorageError::InvalidName(object_name.to_string()));
        }
        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.supabase_url,
            encode(&self.bucket),
            encode(object_name)
        ))
    }
}

/// Pulls the human-readable message out of a Supabase / PostgREST error body.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    json.get("message")
        .or_else(|| json.get("msg"))
        .or_else(|| json.get("error"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
