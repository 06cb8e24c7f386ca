use std::path::Path;

/// Reduces a client-supplied file name to its final path component, so a
/// name like `../../shelf/book.pdf` stores as `book.pdf`. Returns `None`
/// for names with no usable component at all.
pub fn base_name(filename: &str) -> Option<String> {
    Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
}

/// Display title for a new book: the file name without its extension.
pub fn title_from_filename(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_string())
        .unwrap_or_else(|| filename.to_string())
}

/// File type stored alongside a book: the extension, lower-cased and
/// without the dot, or "unknown" when the name has no extension.
pub fn normalize_filetype(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
