//! On-disk, content-addressed cache store.
//!
//! Entries are published atomically: the payload is written to a
//! temporary sibling file and renamed into place, so a crash mid-write
//! never leaves a partially-committed entry visible to `has`/`open_for_read`.

use std::path::{Path, PathBuf};

use fs_err::tokio as tokio_fs;
use rand::{distributions::Alphanumeric, Rng};
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::address::SliceAddress;
use crate::error::Result;

#[derive(Clone, Debug)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, address: &SliceAddress) -> PathBuf {
        self.root.join(address.cache_relpath())
    }

    /// Non-blocking existence probe.
    pub async fn has(&self, address: &SliceAddress) -> bool {
        tokio_fs::metadata(self.path_for(address)).await.is_ok()
    }

    /// Opens a committed entry for sequential reading.
    pub async fn open_for_read(&self, address: &SliceAddress) -> Result<fs_err::tokio::File> {
        let file = tokio_fs::File::open(self.path_for(address)).await?;
        Ok(file)
    }

    /// Persists `payload` atomically under `address`.
    ///
    /// Concurrent publishes to the same address are benign: both writers
    /// produce byte-identical content, and whichever rename lands last
    /// simply wins.
    pub async fn publish<R>(&self, address: &SliceAddress, mut payload: R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let final_path = self.path_for(address);
        if let Some(parent) = final_path.parent() {
            tokio_fs::create_dir_all(parent).await?;
        }

        let tmp_path = final_path.with_extension(format!("tmp-{}", random_suffix()));

        let result: Result<()> = async {
            let mut tmp_file = tokio_fs::File::create(&tmp_path).await?;
            tokio::io::copy(&mut payload, &mut tmp_file).await?;
            tmp_file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(err) = result {
            let _ = tokio_fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        tokio_fs::rename(&tmp_path, &final_path).await?;
        Ok(())
    }

    /// Deletes a single committed entry, e.g. after a parse failure.
    pub async fn remove(&self, address: &SliceAddress) -> Result<()> {
        match tokio_fs::remove_file(self.path_for(address)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Removes the entire cache root and its contents.
    pub async fn clear(&self) -> Result<()> {
        match tokio_fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}
