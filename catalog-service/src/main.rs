use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

mod errors;
mod models;
mod routes;
mod services;
mod utils;

use models::storage::{SqliteCatalog, Store};
use routes::AppState;
use services::files::FileStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("catalog_service=info,tower_http=info")
        .init();

    let db_path = PathBuf::from(
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| "data/bookshelf.db".to_string()),
    );
    let storage_path = PathBuf::from(
        std::env::var("STORAGE_PATH").unwrap_or_else(|_| "data/storage".to_string()),
    );

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                error!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                );
                std::process::exit(1);
            }
        }
    }
    if let Err(e) = std::fs::create_dir_all(&storage_path) {
        error!(
            "Failed to create storage directory {}: {}",
            storage_path.display(),
            e
        );
        std::process::exit(1);
    }

    let store: Store = match SqliteCatalog::open(&db_path).await {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            error!("Failed to open catalog database {}: {}", db_path.display(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = store.test_connection().await {
        error!("Catalog database connection check failed: {}", e);
        std::process::exit(1);
    }
    info!("Catalog database ready at {}", db_path.display());

    let allowed_origin =
        std::env::var("ALLOWED_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());
    let cors = CorsLayer::new()
        .allow_origin(
            allowed_origin
                .parse::<HeaderValue>()
                .expect("ALLOWED_ORIGIN is not a valid origin"),
        )
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    let state = AppState {
        store,
        files: FileStore::new(storage_path),
    };

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("0.0.0.0:{}", port);

    info!("Catalog service starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
