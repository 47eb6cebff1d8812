//! The post index repository. The index is a flat JSON array of
//! [`Record`]s, newest first, capped at [`MAX_RECORDS`]. Callers never touch
//! the file directly: they load the full list, compute the full new list,
//! and save it back. Cap enforcement happens here, on save.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::post::Record;

/// The maximum number of records retained in the index. Older records fall
/// off the end on save and are never read back.
pub const MAX_RECORDS: usize = 200;

/// File name of the index inside the site root.
pub const INDEX_FILE: &str = "posts.json";

/// Reads and writes the post index for one site root.
pub struct PostStore {
    path: PathBuf,
}

impl PostStore {
    /// Creates a store for the index inside `site_root`.
    pub fn new(site_root: &Path) -> PostStore {
        PostStore {
            path: site_root.join(INDEX_FILE),
        }
    }

    /// Loads the current index. A missing file and a file that fails to
    /// parse both yield an empty index; only unexpected I/O failures
    /// propagate. A half-written index from a crashed run is therefore
    /// recovered as "no posts yet", and the next publish regenerates it.
    pub fn load(&self) -> Result<Vec<Record>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }

    /// Saves the index, truncated to [`MAX_RECORDS`]. Creates the parent
    /// directory as needed. Write failures propagate.
    pub fn save(&self, records: &[Record]) -> Result<()> {
        let capped = &records[..records.len().min(MAX_RECORDS)];
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(capped)?;
        fs::write(&self.path, payload)?;
        Ok(())
    }

    /// Merges a freshly published record into an index: any existing record
    /// with the same slug is dropped and the new record goes to the front.
    /// Pure function; the cap is applied later, by [`PostStore::save`].
    pub fn merge(records: Vec<Record>, record: Record) -> Vec<Record> {
        let mut merged = Vec::with_capacity(records.len() + 1);
        let slug = record.slug.clone();
        merged.push(record);
        merged.extend(records.into_iter().filter(|r| r.slug != slug));
        merged
    }
}

/// The result of a fallible index operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error reading or writing the post index.
#[derive(Debug)]
pub enum Error {
    /// An I/O error other than the file being absent.
    Io(io::Error),

    /// A serialization error on save. (Parse errors on load are recovered as
    /// an empty index instead.)
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Json(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    /// Converts an [`io::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator for fallible I/O operations.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    /// Converts a [`serde_json::Error`] into an [`Error`]. This allows us to
    /// use the `?` operator when encoding the index.
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(slug: &str) -> Record {
        Record {
            slug: slug.to_owned(),
            title: slug.to_owned(),
            description: "d".to_owned(),
            date: "2026-01-01".to_owned(),
            url: format!("{}.html", slug),
            hero: String::new(),
            tag: "health".to_owned(),
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PostStore::new(dir.path());
        assert_eq!(store.load().unwrap(), Vec::new());
    }

    #[test]
    fn test_load_malformed_json_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(INDEX_FILE), "{not json").unwrap();
        let store = PostStore::new(dir.path());
        assert_eq!(store.load().unwrap(), Vec::new());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PostStore::new(dir.path());
        let records = vec![record("a"), record("b")];
        store.save(&records).unwrap();
        assert_eq!(store.load().unwrap(), records);
    }

    #[test]
    fn test_merge_replaces_by_slug_and_moves_to_front() {
        let records = vec![record("a"), record("b"), record("c")];
        let mut replacement = record("b");
        replacement.title = "updated".to_owned();
        let merged = PostStore::merge(records, replacement);
        let slugs: Vec<&str> = merged.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["b", "a", "c"]);
        assert_eq!(merged[0].title, "updated");
    }

    #[test]
    fn test_save_enforces_cap() {
        let dir = tempfile::tempdir().unwrap();
        let store = PostStore::new(dir.path());
        let mut records = Vec::new();
        for i in 0..(MAX_RECORDS + 17) {
            records = PostStore::merge(records, record(&format!("post-{}", i)));
        }
        store.save(&records).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), MAX_RECORDS);
        // newest-first: the most recent merge is at the front
        assert_eq!(loaded[0].slug, format!("post-{}", MAX_RECORDS + 16));
        // the oldest records fell off the end
        assert!(loaded.iter().all(|r| r.slug != "post-0"));
    }
}
