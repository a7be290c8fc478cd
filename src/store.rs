//! String-keyed document storage for options and sessions.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::error::StoreError;

const APP_DIR: &str = "kb-graph";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Rc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// One JSON file per key inside a directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<config dir>/kb-graph` on the current platform.
    pub fn default_location() -> Result<Self, StoreError> {
        let base = dirs::config_dir().ok_or(StoreError::NoConfigDir)?;
        Ok(Self::new(base.join(APP_DIR)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }
}

/// Percent-escapes every byte outside `[A-Za-z0-9._-]`, `%` included, so
/// distinct keys never share a file.
fn file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("%{byte:02X}"));
        }
    }
    stem
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(io_error(&path)(error)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;

        let path = self.path_for(key);
        let temp = path.with_extension("json.tmp");

        // Write to a sibling file first so a crash never leaves half a document.
        fs::write(&temp, value).map_err(io_error(&temp))?;
        fs::rename(&temp, &path).map_err(io_error(&path))?;
        debug!(key, path = %path.display(), "stored document");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(io_error(&path)(error)),
        }
    }
}

/// In-process store, mostly for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert_eq!(store.get("graphOptions").unwrap(), None);
        store.set("graphOptions", "{\"a\":1}").unwrap();
        assert_eq!(store.get("graphOptions").unwrap().as_deref(), Some("{\"a\":1}"));

        store.set("graphOptions", "{}").unwrap();
        assert_eq!(store.get("graphOptions").unwrap().as_deref(), Some("{}"));

        store.remove("graphOptions").unwrap();
        assert_eq!(store.get("graphOptions").unwrap(), None);
        store.remove("graphOptions").unwrap();
    }

    #[test]
    fn keys_with_separators_stay_inside_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.set("graph-session:../../etc", "[]").unwrap();
        let path = store.path_for("graph-session:../../etc");
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.exists());
        assert_eq!(store.get("graph-session:../../etc").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn keys_differing_only_in_escaped_characters_get_their_own_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.set("graph-session:a:b", "[1]").unwrap();
        store.set("graph-session:a_b", "[2]").unwrap();
        store.set("graph-session:a%3Ab", "[3]").unwrap();
        assert_ne!(store.path_for("graph-session:a:b"), store.path_for("graph-session:a_b"));
        assert_eq!(store.get("graph-session:a:b").unwrap().as_deref(), Some("[1]"));
        assert_eq!(store.get("graph-session:a_b").unwrap().as_deref(), Some("[2]"));
        assert_eq!(store.get("graph-session:a%3Ab").unwrap().as_deref(), Some("[3]"));

        store.remove("graph-session:a_b").unwrap();
        assert_eq!(store.get("graph-session:a:b").unwrap().as_deref(), Some("[1]"));
        assert_eq!(file_stem("a:b/é"), "a%3Ab%2F%C3%A9");
    }

    #[test]
    fn memory_store_is_shared_through_rc() {
        let store = Rc::new(MemoryStore::default());
        let handle: Box<dyn KeyValueStore> = Box::new(Rc::clone(&store));

        handle.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(store.len(), 1);

        handle.remove("k").unwrap();
        assert!(store.is_empty());
    }
}
