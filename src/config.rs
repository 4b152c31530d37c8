use std::env;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use deadpool_postgres::{Config, Pool, PoolConfig, Runtime};
use tokio_postgres::NoTls;

pub const DEFAULT_BUCKET_NAME: &str = "post-images";
pub const DEFAULT_TABLE_NAME: &str = "blog_posts";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
// JST, the locale the post cards are dated in
const DEFAULT_DISPLAY_OFFSET_MINUTES: i32 = 9 * 60;

/// Which implementation backs object storage and the posts table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Supabase storage + PostgREST table
    Supabase,
    /// Supabase storage + direct Postgres table
    Postgres,
    /// In-process fakes, nothing persisted
    Memory,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "supabase" => Ok(BackendKind::Supabase),
            "postgres" | "pg" => Ok(BackendKind::Postgres),
            "memory" => Ok(BackendKind::Memory),
            other => bail!("unknown BACKEND '{}' (expected supabase, postgres or memory)", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
}

/// Process-wide settings, read once at startup and handed to constructors.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendKind,
    pub supabase: Option<SupabaseConfig>,
    pub bucket_name: String,
    pub table_name: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub display_offset: FixedOffset,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend: BackendKind = lookup("BACKEND").unwrap_or_default().parse()?;

        let supabase = match backend {
            BackendKind::Memory => None,
            BackendKind::Supabase | BackendKind::Postgres => {
                let url = lookup("SUPABASE_URL").context("SUPABASE_URL must be set")?;
                let service_role_key = lookup("SUPABASE_SERVICE_ROLE_KEY")
                    .context("SUPABASE_SERVICE_ROLE_KEY must be set")?;
                Some(SupabaseConfig {
                    url: url.trim().trim_end_matches('/').to_string(),
                    service_role_key: service_role_key.trim().to_string(),
                })
            }
        };

        let port: u16 = match lookup("PORT") {
            Some(p) => p.trim().parse().with_context(|| format!("invalid PORT '{}'", p))?,
            None => 8080,
        };

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://127.0.0.1:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_upload_bytes: usize = match lookup("MAX_UPLOAD_BYTES") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("invalid MAX_UPLOAD_BYTES '{}'", v))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let offset_minutes: i32 = match lookup("DISPLAY_UTC_OFFSET_MINUTES") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("invalid DISPLAY_UTC_OFFSET_MINUTES '{}'", v))?,
            None => DEFAULT_DISPLAY_OFFSET_MINUTES,
        };
        let display_offset = FixedOffset::east_opt(offset_minutes * 60)
            .with_context(|| format!("DISPLAY_UTC_OFFSET_MINUTES out of range: {}", offset_minutes))?;

        Ok(AppConfig {
            backend,
            supabase,
            bucket_name: non_empty(lookup("BUCKET_NAME"), DEFAULT_BUCKET_NAME),
            table_name: non_empty(lookup("TABLE_NAME"), DEFAULT_TABLE_NAME),
            port,
            allowed_origins,
            max_upload_bytes,
            display_offset,
        })
    }

    /// Config for the in-memory backend with defaults everywhere.
    pub fn in_memory() -> Self {
        AppConfig {
            backend: BackendKind::Memory,
            supabase: None,
            bucket_name: DEFAULT_BUCKET_NAME.to_string(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            port: 8080,
            allowed_origins: Vec::new(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            display_offset: FixedOffset::east_opt(DEFAULT_DISPLAY_OFFSET_MINUTES * 60)
                .unwrap_or_else(|| Utc.fix()),
        }
    }
}

fn non_empty(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub fn get_pg_pool() -> Result<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(env::var("PG_HOST").context("PG_HOST not set")?);
    cfg.user = Some(env::var("PG_USER").context("PG_USER not set")?);
    cfg.password = env::var("PG_PASS").ok();
    cfg.dbname = Some(env::var("PG_DB").context("PG_DB not set")?);

    if cfg.pool.is_none() {
        cfg.pool = Some(PoolConfig::default());
    }
    if let Some(ref mut pcfg) = cfg.pool {
        pcfg.max_size = 16;
    }

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .context("failed to create postgres pool")
}

pub fn mask_key(k: &str) -> String {
    let chars: Vec<char> = k.chars().collect();
    if chars.len() <= 8 {
        "[REDACTED]".to_string()
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}
