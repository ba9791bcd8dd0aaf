//! On-disk storage for uploaded spreadsheets and generated reports.

use crate::config::ServerConfig;
use crate::data::SourceFormat;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Final path component of a client-supplied file name.
///
/// Returns `None` for names that have no usable component (blank, `.`, `..`).
/// Surrounding spaces are part of the name and are kept.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?;
    if last.trim().is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(last.to_string())
}

/// Whether `name` has a spreadsheet extension the pipeline accepts.
pub fn is_allowed_upload(name: &str) -> bool {
    SourceFormat::from_path(Path::new(name)).is_some()
}

/// Upload and report directories.
#[derive(Debug, Clone)]
pub struct ReportStore {
    upload_dir: PathBuf,
    report_dir: PathBuf,
}

impl ReportStore {
    pub fn new(upload_dir: impl Into<PathBuf>, report_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            report_dir: report_dir.into(),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(&config.upload_dir, &config.report_dir)
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    /// Create both directories if they do not exist yet.
    pub async fn ensure_dirs(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::create_dir_all(&self.report_dir).await
    }

    /// Write an upload under its (sanitized) file name, replacing any earlier
    /// upload with the same name.
    pub async fn save_upload(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let name = sanitize_file_name(file_name).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("Invalid file name: {file_name:?}"))
        })?;
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let path = self.upload_dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Saved upload");
        Ok(path)
    }

    /// Names of all generated PDF reports, sorted.
    pub async fn list_reports(&self) -> io::Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.report_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".pdf") && entry.file_type().await?.is_file() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Path of an existing report called `name`.
    ///
    /// Names that are not a single path component never resolve.
    pub fn resolve_report(&self, name: &str) -> Option<PathBuf> {
        if sanitize_file_name(name).as_deref() != Some(name) {
            return None;
        }
        let path = self.report_dir.join(name);
        path.is_file().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store_in(dir: &Path) -> ReportStore {
        ReportStore::new(dir.join("uploads"), dir.join("reports"))
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("data.csv").as_deref(), Some("data.csv"));
        assert_eq!(sanitize_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_file_name("C:\\tmp\\book.xlsx").as_deref(), Some("book.xlsx"));
        assert_eq!(sanitize_file_name("dir/"), None);
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name(""), None);
        assert_eq!(sanitize_file_name("  "), None);
        assert_eq!(sanitize_file_name(" Sales.pdf ").as_deref(), Some(" Sales.pdf "));
    }

    #[test]
    fn test_allowed_uploads() {
        assert!(is_allowed_upload("a.csv"));
        assert!(is_allowed_upload("a.XLSX"));
        assert!(is_allowed_upload("a.xls"));
        assert!(!is_allowed_upload("a.txt"));
        assert!(!is_allowed_upload("csv"));
    }

    #[tokio::test]
    async fn test_save_upload_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let first = store.save_upload("data.csv", b"A\n1\n").await.unwrap();
        let second = store.save_upload("nested/data.csv", b"A\n2\n").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second).unwrap(), b"A\n2\n");
        assert!(second.starts_with(store.upload_dir()));
    }

    #[tokio::test]
    async fn test_list_reports_sorted_pdfs_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.list_reports().await.unwrap().is_empty());

        store.ensure_dirs().await.unwrap();
        for name in ["b.pdf", "a.pdf", "notes.txt"] {
            std::fs::write(store.report_dir().join(name), b"x").unwrap();
        }
        std::fs::create_dir(store.report_dir().join("dir.pdf")).unwrap();
        assert_eq!(store.list_reports().await.unwrap(), vec!["a.pdf", "b.pdf"]);
    }

    #[tokio::test]
    async fn test_resolve_report_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.ensure_dirs().await.unwrap();
        std::fs::write(store.report_dir().join("r.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("secret.pdf"), b"x").unwrap();

        assert!(store.resolve_report("r.pdf").is_some());
        assert!(store.resolve_report("missing.pdf").is_none());
        assert!(store.resolve_report("../secret.pdf").is_none());
        assert!(store.resolve_report("..").is_none());
    }

    #[tokio::test]
    async fn test_resolve_report_keeps_surrounding_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.ensure_dirs().await.unwrap();
        std::fs::write(store.report_dir().join(" Sales.pdf"), b"%PDF").unwrap();
        assert_eq!(
            store.resolve_report(" Sales.pdf"),
            Some(store.report_dir().join(" Sales.pdf"))
        );
        assert!(store.resolve_report("Sales.pdf").is_none());
    }
}
