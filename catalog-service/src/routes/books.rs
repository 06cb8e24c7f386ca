use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::ApiError;
use crate::models::book::{Book, BookSummary, NewBook};
use crate::routes::AppState;
use crate::utils::csv::render_csv;
use crate::utils::file::{base_name, normalize_filetype, title_from_filename};

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
}

pub async fn list_books(
    State(state): State<AppState>,
) -> Result<Json<Vec<BookSummary>>, ApiError> {
    Ok(Json(state.store.list_books().await?))
}

pub async fn search_books(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<BookSummary>>, ApiError> {
    let keyword = params.q.trim();
    if keyword.is_empty() {
        return Ok(Json(Vec::new()));
    }
    Ok(Json(state.store.search_books(keyword).await?))
}

pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Book>, ApiError> {
    match state.store.get_book(id).await? {
        Some(book) => Ok(Json(book)),
        None => Err(ApiError::NotFound),
    }
}

/// Accepts a multipart form with a `file` part and an optional `tags` part,
/// stores the file and catalogues it under a fresh id.
pub async fn upload_book(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Book>, ApiError> {
    let mut upload: Option<(String, Bytes)> = None;
    let mut tags = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::InvalidUpload("malformed multipart body"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                // The filename has to be copied out before `bytes` consumes
                // the field.
                let filename = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::InvalidUpload("could not read file field"))?;
                let filename = filename
                    .as_deref()
                    .and_then(base_name)
                    .ok_or(ApiError::InvalidUpload("file field needs a filename"))?;
                upload = Some((filename, data));
            }
            "tags" => {
                tags = field
                    .text()
                    .await
                    .map_err(|_| ApiError::InvalidUpload("could not read tags field"))?;
            }
            _ => {}
        }
    }

    let (filename, data) = upload.ok_or(ApiError::InvalidUpload("no file provided"))?;
    let title = title_from_filename(&filename);
    let filetype = normalize_filetype(&filename);
    let stored = state.files.store(&filename, &data)?;

    let book = NewBook {
        title,
        filename,
        filetype,
        size_bytes: stored.size_bytes,
        sha256: stored.sha256,
        tags,
    };
    let created = state.store.insert_book(&book).await?;
    info!("Catalogued '{}' as book {}", created.filename, created.id);

    Ok(Json(created))
}

/// Removes the catalogue row first; a file that cannot be removed afterwards
/// is logged and left behind.
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    match state.store.delete_book(id).await? {
        Some(filename) => {
            if let Err(e) = state.files.remove(&filename) {
                warn!("Book {} removed but its file stayed behind: {}", id, e);
            }
            info!("Deleted book {} ({})", id, filename);
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::NotFound),
    }
}

pub async fn export_csv(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let books = state.store.all_books().await?;
    let body = render_csv(&books);
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::storage::{CatalogStore, SqliteCatalog, StorageError};
    use crate::routes::router;
    use crate::services::files::FileStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::{env, fs, process};
    use tower::ServiceExt;

    const BOUNDARY: &str = "catalog-test-boundary";

    async fn test_app(name: &str) -> (Router, AppState, PathBuf) {
        let store = SqliteCatalog::open_in_memory().await.unwrap();
        let root = env::temp_dir().join(format!("catalog-routes-{}-{}", name, process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        let state = AppState {
            store: Arc::new(store),
            files: FileStore::new(&root),
        };
        (router(state.clone()), state, root)
    }

    fn sample(filename: &str, tags: &str) -> NewBook {
        NewBook {
            title: title_from_filename(filename),
            filename: filename.to_string(),
            filetype: normalize_filetype(filename),
            size_bytes: 1024,
            sha256: "ab".repeat(32),
            tags: tags.to_string(),
        }
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn delete(uri: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn upload_body(filename: &str, content: &str, tags: &str) -> String {
        format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             {content}\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"tags\"\r\n\r\n\
             {tags}\r\n\
             --{b}--\r\n",
            b = BOUNDARY,
        )
    }

    fn tags_only_body(tags: &str) -> String {
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"tags\"\r\n\r\n{tags}\r\n--{b}--\r\n",
            b = BOUNDARY,
        )
    }

    fn upload_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/books/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    struct FailingStore;

    fn closed<T>() -> Result<T, StorageError> {
        Err(StorageError::Sqlite(sqlx::Error::PoolClosed))
    }

    #[async_trait]
    impl CatalogStore for FailingStore {
        async fn list_books(&self) -> Result<Vec<BookSummary>, StorageError> {
            closed()
        }
        async fn search_books(&self, _keyword: &str) -> Result<Vec<BookSummary>, StorageError> {
            closed()
        }
        async fn get_book(&self, _id: i64) -> Result<Option<Book>, StorageError> {
            closed()
        }
        async fn insert_book(&self, _book: &NewBook) -> Result<Book, StorageError> {
            closed()
        }
        async fn delete_book(&self, _id: i64) -> Result<Option<String>, StorageError> {
            closed()
        }
        async fn all_books(&self) -> Result<Vec<Book>, StorageError> {
            closed()
        }
        async fn test_connection(&self) -> Result<(), StorageError> {
            closed()
        }
    }

    #[tokio::test]
    async fn status_reports_the_service_running() {
        let (app, _state, _root) = test_app("status").await;

        let response = app.oneshot(get("/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["service"], "catalog-service");
        assert_eq!(body["status"], "running");
    }

    #[tokio::test]
    async fn listing_an_empty_catalog_returns_an_empty_array() {
        let (app, _state, _root) = test_app("list-empty").await;

        let response = app.oneshot(get("/api/books")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"[]");
    }

    #[tokio::test]
    async fn listing_returns_summaries_newest_first() {
        let (app, state, _root) = test_app("list-order").await;
        let first = state.store.insert_book(&sample("first.pdf", "")).await.unwrap();
        let second = state.store.insert_book(&sample("second.pdf", "")).await.unwrap();

        let response = app.oneshot(get("/api/books")).await.unwrap();
        let books = read_json(response).await;
        let ids: Vec<i64> = books
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
        // The listing is a projection; per-file details stay on the detail view.
        assert!(books[0].get("size_bytes").is_none());
        assert!(books[0].get("sha256").is_none());
    }

    #[tokio::test]
    async fn fetching_a_missing_book_returns_the_not_found_body() {
        let (app, _state, _root) = test_app("get-missing").await;

        let response = app.oneshot(get("/api/books/999")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(read_json(response).await, json!({"error": "Book not found"}));
    }

    #[tokio::test]
    async fn fetching_a_book_returns_the_full_record() {
        let (app, state, _root) = test_app("get-full").await;
        let created = state.store.insert_book(&sample("Dune.pdf", "scifi")).await.unwrap();

        let response = app
            .oneshot(get(&format!("/api/books/{}", created.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let book = read_json(response).await;
        assert_eq!(book["id"], created.id);
        assert_eq!(book["title"], "Dune");
        assert_eq!(book["filename"], "Dune.pdf");
        assert_eq!(book["size_bytes"], 1024);
        assert_eq!(book["sha256"], "ab".repeat(32));
        assert_eq!(book["tags"], "scifi");
    }

    #[tokio::test]
    async fn upload_stores_the_file_and_catalogues_it() {
        let (app, _state, root) = test_app("upload").await;

        let response = app
            .oneshot(upload_request(upload_body(
                "Dune.pdf",
                "fake pdf bytes",
                "scifi classics",
            )))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let book = read_json(response).await;
        assert_eq!(book["title"], "Dune");
        assert_eq!(book["filename"], "Dune.pdf");
        assert_eq!(book["filetype"], "pdf");
        assert_eq!(book["size_bytes"], 14);
        assert_eq!(book["tags"], "scifi classics");
        assert_eq!(book["sha256"].as_str().unwrap().len(), 64);

        let stored = fs::read_to_string(root.join("Dune.pdf")).unwrap();
        assert_eq!(stored, "fake pdf bytes");
    }

    #[tokio::test]
    async fn upload_stores_under_the_base_filename_only() {
        let (app, _state, root) = test_app("upload-basename").await;

        let response = app
            .oneshot(upload_request(upload_body(
                "../../shelf/Dune.pdf",
                "bytes",
                "",
            )))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let book = read_json(response).await;
        assert_eq!(book["filename"], "Dune.pdf");
        assert!(root.join("Dune.pdf").exists());
        assert!(!root.join("shelf").exists());
    }

    #[tokio::test]
    async fn upload_without_a_file_field_is_rejected() {
        let (app, _state, _root) = test_app("upload-no-file").await;

        let response = app
            .oneshot(upload_request(tags_only_body("scifi")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await, json!({"error": "no file provided"}));
    }

    #[tokio::test]
    async fn reuploading_a_filename_replaces_the_entry_and_keeps_the_first_file() {
        let (app, _state, root) = test_app("reupload").await;

        let response = app
            .clone()
            .oneshot(upload_request(upload_body("Emma.pdf", "original", "old")))
            .await
            .unwrap();
        let first = read_json(response).await;

        let response = app
            .clone()
            .oneshot(upload_request(upload_body("Emma.pdf", "rewritten!", "new")))
            .await
            .unwrap();
        let second = read_json(response).await;

        assert!(second["id"].as_i64().unwrap() > first["id"].as_i64().unwrap());
        // A re-upload replaces the row; the file already on disk wins.
        assert_eq!(second["size_bytes"], 8);
        assert_eq!(second["tags"], "new");
        assert_eq!(fs::read_to_string(root.join("Emma.pdf")).unwrap(), "original");

        let response = app.oneshot(get("/api/books")).await.unwrap();
        assert_eq!(read_json(response).await.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_the_row_and_the_file() {
        let (app, _state, root) = test_app("delete").await;

        let response = app
            .clone()
            .oneshot(upload_request(upload_body("Emma.pdf", "austen", "")))
            .await
            .unwrap();
        let id = read_json(response).await["id"].as_i64().unwrap();
        assert!(root.join("Emma.pdf").exists());

        let response = app
            .clone()
            .oneshot(delete(&format!("/api/books/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(!root.join("Emma.pdf").exists());

        let response = app
            .oneshot(delete(&format!("/api/books/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn search_filters_by_title_or_tags() {
        let (app, state, _root) = test_app("search").await;
        state
            .store
            .insert_book(&sample("Rust in Action.pdf", ""))
            .await
            .unwrap();
        state
            .store
            .insert_book(&sample("Emma.pdf", "classic"))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(get("/api/books/search?q=rust"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let hits = read_json(response).await;
        assert_eq!(hits.as_array().unwrap().len(), 1);
        assert_eq!(hits[0]["title"], "Rust in Action");

        let response = app
            .clone()
            .oneshot(get("/api/books/search?q=classic"))
            .await
            .unwrap();
        assert_eq!(read_json(response).await[0]["title"], "Emma");

        // A blank or absent keyword short-circuits to an empty result set.
        let response = app.clone().oneshot(get("/api/books/search?q=")).await.unwrap();
        assert_eq!(read_json(response).await, json!([]));
        let response = app.oneshot(get("/api/books/search")).await.unwrap();
        assert_eq!(read_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn export_returns_csv_with_one_line_per_book() {
        let (app, state, _root) = test_app("export").await;
        state.store.insert_book(&sample("a.pdf", "x")).await.unwrap();
        state.store.insert_book(&sample("b.epub", "y")).await.unwrap();

        let response = app.oneshot(get("/api/books/export")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "id,title,filename,filetype,size_bytes,sha256,tags,added_on"
        );
        assert!(lines[1].contains("a.pdf"));
        assert!(lines[2].contains("b.epub"));
    }

    #[tokio::test]
    async fn a_broken_store_answers_with_the_generic_error_body() {
        let root = env::temp_dir().join(format!("catalog-routes-broken-{}", process::id()));
        let _ = fs::create_dir_all(&root);
        let state = AppState {
            store: Arc::new(FailingStore),
            files: FileStore::new(&root),
        };
        let app = router(state);

        let response = app.oneshot(get("/api/books")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            read_json(response).await,
            json!({"error": "Database query failed"})
        );
    }
}
