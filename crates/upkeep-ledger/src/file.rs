//! JSON file store
//!
//! Provides [`JsonFileStore`]: the whole store state lives in one JSON document.
//! Every commit writes a sibling temp file and renames it over the store file so
//! a crash mid-write leaves the previous commit intact.

use crate::store::{
    ConfigurationRoot, ContextProvider, StagedContext, StateBackend, StoreError, StoreState,
    WorkingContext,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File-backed store
#[derive(Debug, Clone)]
pub struct JsonFileStore<R> {
    inner: Arc<FileInner<R>>,
}

#[derive(Debug)]
struct FileInner<R> {
    path: PathBuf,
    state: RwLock<StoreState<R>>,
}

impl<R> JsonFileStore<R>
where
    R: ConfigurationRoot + Serialize + DeserializeOwned,
{
    /// Open an existing store file
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let bytes = tokio::fs::read(&path).await?;
        let state: StoreState<R> = serde_json::from_slice(&bytes)?;
        tracing::debug!(path = %path.display(), records = state.records.len(), "opened store file");
        Ok(Self::from_parts(path, state))
    }

    /// Create a store file holding `state`, replacing any existing file
    pub async fn create(path: impl AsRef<Path>, state: StoreState<R>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        write_atomically(&path, &state).await?;
        Ok(Self::from_parts(path, state))
    }

    /// Location of the store file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Copy of the committed state
    #[must_use]
    pub fn state(&self) -> StoreState<R> {
        self.inner.state.read().clone()
    }

    fn from_parts(path: PathBuf, state: StoreState<R>) -> Self {
        Self {
            inner: Arc::new(FileInner {
                path,
                state: RwLock::new(state),
            }),
        }
    }
}

async fn write_atomically<R: Serialize>(path: &Path, state: &StoreState<R>) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(state)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl<R> StateBackend<R> for FileInner<R>
where
    R: ConfigurationRoot + Serialize + DeserializeOwned,
{
    fn snapshot(&self) -> StoreState<R> {
        self.state.read().clone()
    }

    async fn commit(&self, state: StoreState<R>) -> Result<(), StoreError> {
        write_atomically(&self.path, &state).await?;
        *self.state.write() = state;
        tracing::trace!(path = %self.path.display(), "store file committed");
        Ok(())
    }
}

#[async_trait]
impl<R> ContextProvider<R> for JsonFileStore<R>
where
    R: ConfigurationRoot + Serialize + DeserializeOwned,
{
    async fn create_context(&self) -> Result<Box<dyn WorkingContext<R>>, StoreError> {
        let backend: Arc<dyn StateBackend<R>> = self.inner.clone();
        Ok(Box::new(StagedContext::new(backend)))
    }
}
