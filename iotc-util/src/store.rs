use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::fs;
use tracing::trace;

use super::fs::safe_write_all;

/// A filesystem backed document store
///
/// Every document is a single JSON file under the store root. Writes are
/// atomic but there is no locking between concurrent writers, the agent
/// only writes its settings from the CLI.
#[derive(Clone, Debug)]
pub struct Store {
    root: PathBuf,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("invalid document name '{0}'")]
    InvalidName(String),
}

impl Store {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // Document names are plain file stems, anything that could escape
    // the root is refused
    fn document_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StoreError::InvalidName(name.to_owned()));
        }
        Ok(self.root.join(name).with_extension("json"))
    }

    /// Create or replace the document `name`
    pub async fn write<V: Serialize>(&self, name: &str, value: &V) -> Result<(), StoreError> {
        let path = self.document_path(name)?;

        // fails if the root exists but is not a directory
        fs::create_dir_all(&self.root).await?;

        let buf = serde_json::to_vec_pretty(value)?;
        trace!("writing {}", path.display());
        safe_write_all(path, &buf).await?;
        Ok(())
    }

    /// Read the document `name`, `None` if it was never written
    pub async fn read<V: DeserializeOwned>(&self, name: &str) -> Result<Option<V>, StoreError> {
        let path = self.document_path(name)?;
        trace!("reading {}", path.display());

        match fs::read(&path).await {
            Ok(contents) => Ok(Some(serde_json::from_slice(&contents)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete the document `name`. Deleting a missing document succeeds.
    pub async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.document_path(name)?;
        trace!("removing {}", path.display());
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn it_reads_back_written_documents() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().join("nested"));

        let doc = Doc {
            name: "thing-1".into(),
            count: 3,
        };
        store.write("doc", &doc).await.unwrap();

        let read: Option<Doc> = store.read("doc").await.unwrap();
        assert_eq!(read, Some(doc));
    }

    #[tokio::test]
    async fn it_returns_none_for_missing_documents() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        let read: Option<Doc> = store.read("missing").await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn it_refuses_names_escaping_the_root() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        for name in ["../doc", "a/b", "", ".hidden"] {
            let res = store.write(name, &1).await;
            assert!(matches!(res, Err(StoreError::InvalidName(_))), "{name}");
        }
    }

    #[tokio::test]
    async fn it_deletes_idempotently() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        store.write("doc", &1).await.unwrap();
        store.delete("doc").await.unwrap();
        store.delete("doc").await.unwrap();

        let read: Option<u32> = store.read("doc").await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn it_reports_corrupt_documents() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        fs::write(dir.path().join("doc.json"), b"{not json")
            .await
            .unwrap();

        let res: Result<Option<Doc>, _> = store.read("doc").await;
        assert!(matches!(res, Err(StoreError::Serialization(_))));
    }
}
