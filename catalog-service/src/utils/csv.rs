use crate::models::book::Book;

pub const CSV_HEADER: &str = "id,title,filename,filetype,size_bytes,sha256,tags,added_on";

/// The export keeps rows trivially splittable by swapping commas inside
/// field values for spaces instead of quoting.
pub fn csv_field(value: &str) -> String {
    value.replace(',', " ")
}

pub fn render_csv(books: &[Book]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + books.len() * 64);
    out.push_str(CSV_HEADER);
    out.push('\n');

    for book in books {
        let fields = [
            book.id.to_string(),
            csv_field(&book.title),
            csv_field(&book.filename),
            csv_field(&book.filetype),
            book.size_bytes.to_string(),
            csv_field(book.sha256.as_deref().unwrap_or("")),
            csv_field(&book.tags),
            csv_field(&book.added_on),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }

    out
}
