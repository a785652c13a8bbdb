//! Filesystem object store for ticket archive snapshots.
//!
//! Keys map to paths under a root directory. Objects are written once: the
//! body goes to a temporary sibling first and is then hard-linked into place,
//! so a reader never observes a partial object and an existing object is
//! never replaced.

pub mod error;

use std::path::{Component, Path, PathBuf};

use tokio::{fs, io::AsyncWriteExt as _};
use tremiti_core::{archive::ArchiveKey, store::ArchiveStore};

pub use error::{Error, Result};

#[derive(Debug, Clone)]
pub struct FsArchive {
  root: PathBuf,
}

impl FsArchive {
  /// Use `root` as the archive root, creating it if needed.
  pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
    let root = root.into();
    fs::create_dir_all(&root)
      .await
      .map_err(|e| Error::Io(root.clone(), e))?;
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path { &self.root }

  /// Resolve `key` below the root. Every segment must be a plain file name.
  pub fn path_for(&self, key: &ArchiveKey) -> Result<PathBuf> {
    let mut path = self.root.clone();
    for segment in key.segments() {
      let mut parts = Path::new(segment).components();
      match (parts.next(), parts.next()) {
        (Some(Component::Normal(_)), None) => path.push(segment),
        _ => return Err(Error::InvalidKey(key.to_string())),
      }
    }
    Ok(path)
  }
}

impl ArchiveStore for FsArchive {
  type Error = Error;

  async fn put_new(&self, key: &ArchiveKey, body: Vec<u8>) -> Result<()> {
    let path = self.path_for(key)?;
    let dir = path.parent().unwrap_or(&self.root).to_path_buf();
    fs::create_dir_all(&dir)
      .await
      .map_err(|e| Error::Io(dir.clone(), e))?;

    let tmp = path.with_extension("json.partial");
    let mut file = fs::OpenOptions::new()
      .write(true)
      .create_new(true)
      .open(&tmp)
      .await
      .map_err(|e| Error::Io(tmp.clone(), e))?;
    file.write_all(&body).await.map_err(|e| Error::Io(tmp.clone(), e))?;
    file.sync_all().await.map_err(|e| Error::Io(tmp.clone(), e))?;
    drop(file);

    let linked = fs::hard_link(&tmp, &path).await;
    let _ = fs::remove_file(&tmp).await;
    match linked {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
        return Err(Error::AlreadyExists(key.to_string()));
      }
      Err(e) => return Err(Error::Io(path, e)),
    }

    tracing::debug!(%key, bytes = body.len(), "archive object written");
    Ok(())
  }
}
