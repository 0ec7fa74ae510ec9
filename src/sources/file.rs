//! File-based configuration source.

use crate::core::document::Document;
use crate::error::{ConfigError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Reads one or more JSON configuration files from an ordered list of
/// search directories.
///
/// Resolution is positional: for each filename, the first directory that
/// contains it wins. The loader performs no caching of its own; the
/// configuration state layer caches the merged result.
///
/// # Examples
///
/// ```rust,no_run
/// use layerconf::sources::JsonFileLoader;
/// use std::path::PathBuf;
///
/// let loader = JsonFileLoader::new(
///     vec![PathBuf::from("config")],
///     vec![PathBuf::from("default.json"), PathBuf::from("production.json")],
/// );
/// let docs = loader.load_all()?;
/// # Ok::<(), layerconf::error::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileLoader {
    search_dirs: Vec<PathBuf>,
    filenames: Vec<PathBuf>,
}

impl JsonFileLoader {
    /// Create a new loader over `search_dirs` with a default file list.
    ///
    /// An empty file list is accepted here; calling [`load_all`] on it
    /// raises [`ConfigError::FileNotSpecified`].
    ///
    /// [`load_all`]: JsonFileLoader::load_all
    pub fn new(search_dirs: Vec<PathBuf>, filenames: Vec<PathBuf>) -> Self {
        Self {
            search_dirs,
            filenames,
        }
    }

    /// The ordered candidate directories.
    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// The configured file list, in merge order.
    pub fn filenames(&self) -> &[PathBuf] {
        &self.filenames
    }

    /// Resolve `filename` against the search directories.
    ///
    /// The first directory in which the file exists wins. If none contain
    /// it, the error is attributed to the first candidate directory.
    pub fn resolve(&self, filename: &Path) -> Result<PathBuf> {
        for dir in &self.search_dirs {
            let candidate = dir.join(filename);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        let attributed = self
            .search_dirs
            .first()
            .map(|dir| dir.join(filename))
            .unwrap_or_else(|| filename.to_path_buf());
        Err(ConfigError::FileNotFound { path: attributed })
    }

    /// Load a single file and return its parsed document.
    pub fn load_single(&self, filename: &Path) -> Result<Document> {
        let path = self.resolve(filename)?;
        read_document(&path)
    }

    /// Load every configured file, in order.
    ///
    /// Returns the resolved path alongside each document so callers can
    /// snapshot modification times against the same paths.
    ///
    /// # Errors
    ///
    /// [`ConfigError::FileNotSpecified`] when the file list is empty, plus
    /// the per-file taxonomy of [`load_single`](JsonFileLoader::load_single).
    pub fn load_all(&self) -> Result<Vec<(PathBuf, Document)>> {
        if self.filenames.is_empty() {
            tracing::error!("no filenames configured for loader");
            return Err(ConfigError::FileNotSpecified);
        }
        let mut documents = Vec::with_capacity(self.filenames.len());
        for filename in &self.filenames {
            let path = self.resolve(filename)?;
            tracing::debug!(path = %path.display(), "reading configuration file");
            let document = read_document(&path)?;
            documents.push((path, document));
        }
        Ok(documents)
    }
}

/// Read and parse one JSON object file.
fn read_document(path: &Path) -> Result<Document> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::from_read(path.to_path_buf(), source))?;
    // Parsing straight into a map rejects top-level arrays and scalars.
    let document: Document = serde_json::from_str(&raw).map_err(|source| {
        tracing::error!(path = %path.display(), error = %source, "JSON parse failed");
        ConfigError::FileFormat {
            path: path.to_path_buf(),
            source,
        }
    })?;
    tracing::debug!(path = %path.display(), bytes = raw.len(), "parsed configuration file");
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn loader(dirs: &[&TempDir], files: &[&str]) -> JsonFileLoader {
        JsonFileLoader::new(
            dirs.iter().map(|d| d.path().to_path_buf()).collect(),
            files.iter().map(PathBuf::from).collect(),
        )
    }

    #[test]
    fn loads_a_single_object_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("conf.json"), r#"{"a": 1, "b": 2}"#).unwrap();

        let doc = loader(&[&dir], &["conf.json"])
            .load_single(Path::new("conf.json"))
            .unwrap();
        assert_eq!(doc["a"], 1);
        assert_eq!(doc["b"], 2);
    }

    #[test]
    fn load_all_preserves_file_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.json"), r#"{"x": 1}"#).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"y": 2}"#).unwrap();

        let docs = loader(&[&dir], &["a.json", "b.json"]).load_all().unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].0.ends_with("a.json"));
        assert!(docs[1].0.ends_with("b.json"));
    }

    #[test]
    fn first_directory_containing_the_file_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(second.path().join("conf.json"), r#"{"from": "second"}"#).unwrap();

        let doc = loader(&[&first, &second], &["conf.json"])
            .load_single(Path::new("conf.json"))
            .unwrap();
        assert_eq!(doc["from"], "second");

        // Shadow it in the first directory and that copy wins instead.
        fs::write(first.path().join("conf.json"), r#"{"from": "first"}"#).unwrap();
        let doc = loader(&[&first, &second], &["conf.json"])
            .load_single(Path::new("conf.json"))
            .unwrap();
        assert_eq!(doc["from"], "first");
    }

    #[test]
    fn missing_file_is_attributed_to_the_first_directory() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();

        let err = loader(&[&first, &second], &["absent.json"])
            .load_single(Path::new("absent.json"))
            .unwrap_err();
        match err {
            ConfigError::FileNotFound { path } => {
                assert!(path.starts_with(first.path()));
            }
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn empty_file_list_raises_not_specified() {
        let dir = TempDir::new().unwrap();
        let err = loader(&[&dir], &[]).load_all().unwrap_err();
        assert!(matches!(err, ConfigError::FileNotSpecified));
    }

    #[test]
    fn malformed_json_carries_the_parse_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.json"), "{ invalid,,, }").unwrap();

        let err = loader(&[&dir], &["bad.json"]).load_all().unwrap_err();
        match err {
            ConfigError::FileFormat { path, .. } => assert!(path.ends_with("bad.json")),
            other => panic!("expected FileFormat, got {other:?}"),
        }
    }

    #[test]
    fn top_level_array_is_a_format_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("list.json"), "[1, 2, 3]").unwrap();

        let err = loader(&[&dir], &["list.json"]).load_all().unwrap_err();
        assert!(matches!(err, ConfigError::FileFormat { .. }));
    }
}
