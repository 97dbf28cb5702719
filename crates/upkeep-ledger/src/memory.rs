//! In-memory store
//!
//! Provides [`MemoryStore`], a process-local store with snapshot-isolated
//! working contexts. Used by tests and by hosts that keep their configuration
//! in memory and persist it elsewhere.

use crate::store::{
    ConfigurationRoot, ContextProvider, StagedContext, StateBackend, StoreError, StoreState,
    WorkingContext,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory store with whole-state commits
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Clone)]
pub struct MemoryStore<R> {
    inner: Arc<MemoryInner<R>>,
}

#[derive(Debug)]
struct MemoryInner<R> {
    state: RwLock<StoreState<R>>,
    fail_next_commit: AtomicBool,
    commits: AtomicUsize,
}

impl<R: ConfigurationRoot> MemoryStore<R> {
    /// Create a store holding `state`
    #[must_use]
    pub fn new(state: StoreState<R>) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                state: RwLock::new(state),
                fail_next_commit: AtomicBool::new(false),
                commits: AtomicUsize::new(0),
            }),
        }
    }

    /// Copy of the committed state
    #[must_use]
    pub fn state(&self) -> StoreState<R> {
        self.inner.state.read().clone()
    }

    /// Number of successful commits so far
    #[inline]
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    /// Make the next commit fail with [`StoreError::CommitFailed`]
    pub fn fail_next_commit(&self) {
        self.inner.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl<R: ConfigurationRoot> StateBackend<R> for MemoryInner<R> {
    fn snapshot(&self) -> StoreState<R> {
        self.state.read().clone()
    }

    async fn commit(&self, state: StoreState<R>) -> Result<(), StoreError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::CommitFailed("injected commit failure".to_string()));
        }
        *self.state.write() = state;
        self.commits.fetch_add(1, Ordering::SeqCst);
        tracing::trace!("memory store committed");
        Ok(())
    }
}

#[async_trait]
impl<R: ConfigurationRoot> ContextProvider<R> for MemoryStore<R> {
    async fn create_context(&self) -> Result<Box<dyn WorkingContext<R>>, StoreError> {
        let backend: Arc<dyn StateBackend<R>> = self.inner.clone();
        Ok(Box::new(StagedContext::new(backend)))
    }
}
