use reqwest::multipart;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::{error, info};

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    service: String,
    status: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct BookSummary {
    id: i64,
    title: String,
    filename: String,
    filetype: String,
    tags: String,
    added_on: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Book {
    id: i64,
    title: String,
    filename: String,
    filetype: String,
    size_bytes: i64,
    sha256: Option<String>,
    tags: String,
    added_on: String,
}

const DEFAULT_CATALOG_URL: &str = "http://0.0.0.0:8080";

struct CatalogClient {
    client: Client,
    base_url: String,
}

impl CatalogClient {
    fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn check_status(&self) -> Result<HealthResponse, Box<dyn std::error::Error>> {
        let url = format!("{}/status", self.base_url);
        let response = self.client.get(&url).send().await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let error_msg = format!("Catalog service answered with status: {}", response.status());
            error!("{}", error_msg);
            Err(error_msg.into())
        }
    }

    async fn list_books(&self) -> Result<Vec<BookSummary>, Box<dyn std::error::Error>> {
        let url = format!("{}/api/books", self.base_url);
        let response = self.client.get(&url).send().await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let error_msg = format!("Failed to fetch the book list: {}", response.status());
            error!("{}", error_msg);
            Err(error_msg.into())
        }
    }

    async fn get_book(&self, id: i64) -> Result<Option<Book>, Box<dyn std::error::Error>> {
        let url = format!("{}/api/books/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if response.status().is_success() {
            Ok(Some(response.json().await?))
        } else {
            let error_msg = format!("Failed to fetch book {}: {}", id, response.status());
            error!("{}", error_msg);
            Err(error_msg.into())
        }
    }

    async fn upload_book(&self, path: &Path, tags: &str) -> Result<Book, Box<dyn std::error::Error>> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or("The upload path has no file name")?
            .to_string();
        info!("Uploading {}", filename);

        let bytes = tokio::fs::read(path).await?;
        let part = multipart::Part::bytes(bytes).file_name(filename);
        let form = multipart::Form::new()
            .part("file", part)
            .text("tags", tags.to_string());

        let url = format!("{}/api/books/upload", self.base_url);
        let response = self.client.post(&url).multipart(form).send().await?;

        if response.status().is_success() {
            let book: Book = response.json().await?;
            info!("Uploaded '{}' as book {}", book.filename, book.id);
            Ok(book)
        } else {
            let error_msg = format!("Upload rejected with status: {}", response.status());
            error!("{}", error_msg);
            Err(error_msg.into())
        }
    }

    async fn delete_book(&self, id: i64) -> Result<(), Box<dyn std::error::Error>> {
        let url = format!("{}/api/books/{}", self.base_url, id);
        let response = self.client.delete(&url).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let error_msg = format!("Failed to delete book {}: {}", id, response.status());
            error!("{}", error_msg);
            Err(error_msg.into())
        }
    }

    async fn search_books(&self, keyword: &str) -> Result<Vec<BookSummary>, Box<dyn std::error::Error>> {
        let url = format!("{}/api/books/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", keyword)])
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let error_msg = format!("Search failed: {}", response.status());
            error!("{}", error_msg);
            Err(error_msg.into())
        }
    }

    async fn export_csv(&self) -> Result<String, Box<dyn std::error::Error>> {
        let url = format!("{}/api/books/export", self.base_url);
        let response = self.client.get(&url).send().await?;

        if response.status().is_success() {
            Ok(response.text().await?)
        } else {
            let error_msg = format!("Export failed: {}", response.status());
            error!("{}", error_msg);
            Err(error_msg.into())
        }
    }
}

/// Trims a catalog timestamp down to its date, passing anything
/// unparseable through untouched.
fn short_date(added_on: &str) -> String {
    match chrono::NaiveDateTime::parse_from_str(added_on, "%Y-%m-%d %H:%M:%S") {
        Ok(timestamp) => timestamp.format("%Y-%m-%d").to_string(),
        Err(_) => added_on.to_string(),
    }
}

fn human_size(bytes: i64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let kb = bytes as f64 / 1024.0;
    if kb < 1024.0 {
        return format!("{:.1} KB", kb);
    }
    format!("{:.1} MB", kb / 1024.0)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn render_book_line(book: &BookSummary) -> String {
    format!(
        "{:>4}  {:<32}  {:<8}  {:<24}  {}",
        book.id,
        book.title,
        book.filetype,
        book.tags,
        short_date(&book.added_on)
    )
}

fn render_book_list(books: &[BookSummary]) -> String {
    if books.is_empty() {
        return "No books found.".to_string();
    }

    let mut lines = vec![format!(
        "{:>4}  {:<32}  {:<8}  {:<24}  {}",
        "id", "title", "type", "tags", "added"
    )];
    for book in books {
        lines.push(render_book_line(book));
    }
    lines.join("\n")
}

fn print_book_list(books: &[BookSummary]) {
    println!("{}", render_book_list(books));
}

async fn cmd_list(client: &CatalogClient) -> Result<(), Box<dyn std::error::Error>> {
    let books = client.list_books().await?;
    print_book_list(&books);
    Ok(())
}

async fn cmd_show(client: &CatalogClient, id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let book = match client.get_book(id).await? {
        Some(book) => book,
        None => {
            eprintln!("Book not found.");
            std::process::exit(1);
        }
    };

    println!("{:>10}: {}", "id", book.id);
    println!("{:>10}: {}", "title", book.title);
    println!("{:>10}: {}", "filename", book.filename);
    println!("{:>10}: {}", "type", book.filetype);
    println!("{:>10}: {}", "size", human_size(book.size_bytes));
    println!("{:>10}: {}", "sha256", book.sha256.as_deref().unwrap_or("-"));
    println!("{:>10}: {}", "tags", book.tags);
    println!("{:>10}: {}", "added", short_date(&book.added_on));
    Ok(())
}

async fn cmd_add(
    client: &CatalogClient,
    path: &Path,
    tags: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !is_pdf(path) {
        eprintln!("Please upload a PDF file.");
        std::process::exit(1);
    }

    match client.upload_book(path, tags).await {
        Ok(_) => {
            println!("Book uploaded successfully!");
            cmd_list(client).await
        }
        Err(_) => {
            eprintln!("Upload failed.");
            std::process::exit(1);
        }
    }
}

async fn cmd_remove(client: &CatalogClient, id: i64) -> Result<(), Box<dyn std::error::Error>> {
    print!("Are you sure you want to delete this book? [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
        println!("Cancelled.");
        return Ok(());
    }

    match client.delete_book(id).await {
        Ok(()) => {
            println!("Book deleted successfully!");
            cmd_list(client).await
        }
        Err(_) => {
            eprintln!("Failed to delete book");
            std::process::exit(1);
        }
    }
}

async fn cmd_search(
    client: &CatalogClient,
    keyword: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let books = client.search_books(keyword).await?;
    if books.is_empty() {
        println!("(no matches)");
        return Ok(());
    }
    print_book_list(&books);
    Ok(())
}

async fn cmd_export(client: &CatalogClient, out: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let csv = client.export_csv().await?;
    let count = csv.lines().count().saturating_sub(1);
    tokio::fs::write(out, &csv).await?;
    println!("Exported {} books to {}", count, out.display());
    Ok(())
}

async fn cmd_status(client: &CatalogClient) -> Result<(), Box<dyn std::error::Error>> {
    match client.check_status().await {
        Ok(health) => {
            println!("{} is {}", health.service, health.status);
            Ok(())
        }
        Err(_) => {
            eprintln!("Catalog service is not reachable.");
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: catalog-client <command> [args]");
    eprintln!("Commands:");
    eprintln!("  list                 print every book, newest first");
    eprintln!("  show <id>            print one book in full");
    eprintln!("  add <path> [tags]    upload a PDF, with optional comma-separated tags");
    eprintln!("  remove <id>          delete a book and its file");
    eprintln!("  search <keyword>     match against titles and tags");
    eprintln!("  export [file]        save the catalog as CSV (default books_export.csv)");
    eprintln!("  status               check that the service is up");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("catalog_client=info")
        .init();

    let base_url =
        std::env::var("CATALOG_URL").unwrap_or_else(|_| DEFAULT_CATALOG_URL.to_string());
    let client = CatalogClient::new(base_url);

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("list");

    match command {
        "list" => cmd_list(&client).await?,
        "show" => match args.get(2).and_then(|raw| raw.parse().ok()) {
            Some(id) => cmd_show(&client, id).await?,
            None => {
                eprintln!("show needs a numeric book id");
                print_usage();
                std::process::exit(1);
            }
        },
        "add" => match args.get(2) {
            Some(path) => {
                let tags = args.get(3).cloned().unwrap_or_default();
                cmd_add(&client, Path::new(path), &tags).await?;
            }
            None => {
                eprintln!("add needs a file path");
                print_usage();
                std::process::exit(1);
            }
        },
        "remove" => match args.get(2).and_then(|raw| raw.parse().ok()) {
            Some(id) => cmd_remove(&client, id).await?,
            None => {
                eprintln!("remove needs a numeric book id");
                print_usage();
                std::process::exit(1);
            }
        },
        "search" => match args.get(2) {
            Some(keyword) => cmd_search(&client, keyword).await?,
            None => {
                eprintln!("search needs a keyword");
                print_usage();
                std::process::exit(1);
            }
        },
        "export" => {
            let out = args.get(2).map(String::as_str).unwrap_or("books_export.csv");
            cmd_export(&client, Path::new(out)).await?;
        }
        "status" => cmd_status(&client).await?,
        _ => {
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
