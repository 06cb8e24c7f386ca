use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::info;

/// What ended up on disk for an uploaded book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub size_bytes: i64,
    pub sha256: String,
}

/// Flat directory holding the book documents under their base filenames.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Writes the uploaded bytes under `filename` unless that name is
    /// already stored; an existing file wins, matching the
    /// replace-by-filename behaviour of the catalog table. Size and digest
    /// are taken from whatever is on disk afterwards.
    pub fn store(&self, filename: &str, data: &[u8]) -> io::Result<StoredFile> {
        let dest = self.path_for(filename);

        if !dest.exists() {
            fs::write(&dest, data)?;
            info!("Stored {} ({} bytes)", dest.display(), data.len());
        }

        let size_bytes = fs::metadata(&dest)?.len() as i64;
        let sha256 = sha256_file(&dest)?;

        Ok(StoredFile { size_bytes, sha256 })
    }

    /// Removes a stored file. A file that is already gone is not an error.
    pub fn remove(&self, filename: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(filename)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 1024 * 1024];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
