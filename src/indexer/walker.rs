use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::config::VECTOR_DB_DIR_NAME;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Text,
    Pdf,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "md" | "markdown" | "rst" | "html" | "htm" | "csv" | "rs" | "py" | "js" | "ts"
            | "json" | "yaml" | "yml" | "toml" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
        }
    }
}

/// Hidden directories and the store's own directory are never indexed.
fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == VECTOR_DB_DIR_NAME
}

/// Every supported file under `dir`, in a stable order.
pub fn walk_directory(dir: &Path) -> Vec<(PathBuf, DocumentFormat)> {
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let path = entry.into_path();
            let ext = path.extension()?.to_str()?;
            let format = DocumentFormat::from_extension(ext)?;
            Some((path, format))
        })
        .collect()
}
