use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug)]
pub struct HealthResponse {
    pub service: String,
    pub status: String,
}

/// Full catalog record, one row of the books table. `id` and `added_on`
/// are assigned by storage and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub filename: String,
    pub filetype: String,
    pub size_bytes: i64,
    pub sha256: Option<String>,
    pub tags: String,
    pub added_on: String,
}

/// Listing projection: the columns the list and search endpoints expose.
/// `size_bytes` and `sha256` stay out of list responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookSummary {
    pub id: i64,
    pub title: String,
    pub filename: String,
    pub filetype: String,
    pub tags: String,
    pub added_on: String,
}

/// Insert input for a freshly uploaded book; everything here is derived
/// from the uploaded file and the optional tags field.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub filename: String,
    pub filetype: String,
    pub size_bytes: i64,
    pub sha256: String,
    pub tags: String,
}
