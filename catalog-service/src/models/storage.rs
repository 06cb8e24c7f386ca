use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::models::book::{Book, BookSummary, NewBook};

pub type Store = Arc<dyn CatalogStore + Send + Sync>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait CatalogStore {
    /// All books, newest first.
    async fn list_books(&self) -> Result<Vec<BookSummary>, StorageError>;
    /// Books whose title or tags contain the keyword, newest first.
    async fn search_books(&self, keyword: &str) -> Result<Vec<BookSummary>, StorageError>;
    async fn get_book(&self, id: i64) -> Result<Option<Book>, StorageError>;
    /// Inserts a book, replacing any previous row with the same filename,
    /// and returns the stored record.
    async fn insert_book(&self, book: &NewBook) -> Result<Book, StorageError>;
    /// Removes a book row and returns its filename, or `None` when the id
    /// does not exist.
    async fn delete_book(&self, id: i64) -> Result<Option<String>, StorageError>;
    /// Every stored column of every book, ordered by id, for the export.
    async fn all_books(&self) -> Result<Vec<Book>, StorageError>;
    async fn test_connection(&self) -> Result<(), StorageError>;
}

pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    /// Opens the catalog database, creating the file and the books table
    /// when they do not exist yet.
    pub async fn open(db_path: &Path) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        Self::connect(options, 5).await
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self, StorageError> {
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // One connection only: every pooled connection would otherwise get
        // its own empty in-memory database.
        Self::connect(options, 1).await
    }

    async fn connect(
        options: SqliteConnectOptions,
        max_connections: u32,
    ) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                filename TEXT NOT NULL UNIQUE,
                filetype TEXT NOT NULL,
                size_bytes INTEGER DEFAULT 0,
                sha256 TEXT,
                tags TEXT,
                added_on TEXT DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_books_added_on ON books(added_on)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }
}

fn summary_from_row(row: &SqliteRow) -> BookSummary {
    BookSummary {
        id: row.get("id"),
        title: row.get("title"),
        filename: row.get("filename"),
        filetype: row.get("filetype"),
        tags: row.get::<Option<String>, _>("tags").unwrap_or_default(),
        added_on: row.get("added_on"),
    }
}

fn book_from_row(row: &SqliteRow) -> Book {
    Book {
        id: row.get("id"),
        title: row.get("title"),
        filename: row.get("filename"),
        filetype: row.get("filetype"),
        size_bytes: row.get("size_bytes"),
        sha256: row.get("sha256"),
        tags: row.get::<Option<String>, _>("tags").unwrap_or_default(),
        added_on: row.get("added_on"),
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn list_books(&self) -> Result<Vec<BookSummary>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, title, filename, filetype, tags, added_on
             FROM books
             ORDER BY added_on DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(summary_from_row).collect())
    }

    async fn search_books(&self, keyword: &str) -> Result<Vec<BookSummary>, StorageError> {
        let pattern = format!("%{}%", keyword);

        let rows = sqlx::query(
            "SELECT id, title, filename, filetype, tags, added_on
             FROM books
             WHERE title LIKE ?1 OR tags LIKE ?1
             ORDER BY added_on DESC, id DESC",
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(summary_from_row).collect())
    }

    async fn get_book(&self, id: i64) -> Result<Option<Book>, StorageError> {
        let row = sqlx::query(
            "SELECT id, title, filename, filetype, size_bytes, sha256, tags, added_on
             FROM books
             WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(book_from_row))
    }

    async fn insert_book(&self, book: &NewBook) -> Result<Book, StorageError> {
        // REPLACE keys on the unique filename; AUTOINCREMENT keeps the
        // replacement id fresh so ids are never reused.
        let result = sqlx::query(
            "INSERT OR REPLACE INTO books (title, filename, filetype, size_bytes, sha256, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&book.title)
        .bind(&book.filename)
        .bind(&book.filetype)
        .bind(book.size_bytes)
        .bind(&book.sha256)
        .bind(&book.tags)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT id, title, filename, filetype, size_bytes, sha256, tags, added_on
             FROM books
             WHERE id = ?1",
        )
        .bind(result.last_insert_rowid())
        .fetch_one(&self.pool)
        .await?;

        Ok(book_from_row(&row))
    }

    async fn delete_book(&self, id: i64) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT filename FROM books WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let filename: String = row.get("filename");
                sqlx::query("DELETE FROM books WHERE id = ?1")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                Ok(Some(filename))
            }
            None => Ok(None),
        }
    }

    async fn all_books(&self) -> Result<Vec<Book>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, title, filename, filetype, size_bytes, sha256, tags, added_on
             FROM books
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(book_from_row).collect())
    }

    async fn test_connection(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
