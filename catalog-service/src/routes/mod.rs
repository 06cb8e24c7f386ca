use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::models::storage::Store;
use crate::services::files::FileStore;

pub mod books;
pub mod health;

// Uploads carry whole documents, so raise axum's 2 MB default body cap.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub files: FileStore,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(health::health_check))
        .route("/api/books", get(books::list_books))
        .route("/api/books/search", get(books::search_books))
        .route("/api/books/export", get(books::export_csv))
        .route("/api/books/upload", post(books::upload_book))
        .route(
            "/api/books/:id",
            get(books::get_book).delete(books::delete_book),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
