// src/main.rs
use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::{error, info};
use reqwest::Client;

use blogpost_be::config::{mask_key, AppConfig};
use blogpost_be::{build_app_state, configure_app};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Backend: {:?}", config.backend);
    if let Some(supabase) = &config.supabase {
        info!("Supabase URL: {}", supabase.url);
        info!("Supabase Key: {}", mask_key(&supabase.service_role_key));
    }
    info!("Bucket: {}, table: {}", config.bucket_name, config.table_name);

    let http_client = match Client::builder().user_agent("blogpost-be/0.1").build() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to build http client: {}", e);
            std::process::exit(1);
        }
    };

    let bind_address = format!("0.0.0.0:{}", config.port);
    let allowed_origins = config.allowed_origins.clone();
    let routes = configure_app(config.max_upload_bytes);

    let state = match build_app_state(config, http_client) {
        Ok(s) => web::Data::new(s),
        Err(e) => {
            error!("Failed to set up backends: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec!["content-type", "accept", "x-requested-with"])
            .max_age(3600);

        for origin in &allowed_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(routes.clone())
    })
    .bind(&bind_address)?
    .run()
    .await
}
