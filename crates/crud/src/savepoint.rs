use std::sync::Arc;

use {
    remoting_store::{RecordStore, Result, SavepointId, WriteGuard},
    tracing::warn,
};

/// An open savepoint that is released exactly once.
///
/// The scope holds the store's write lock from [`open`](Self::open) until it
/// is released, so concurrent batches on one store run one after another.
/// [`commit`](Self::commit) and [`rollback`](Self::rollback) consume the
/// scope. A scope dropped without either (cancellation, panic) is rolled
/// back in the background.
pub struct SavepointScope {
    store: Arc<dyn RecordStore>,
    id: Option<SavepointId>,
    guard: Option<WriteGuard>,
}

impl SavepointScope {
    pub async fn open(store: Arc<dyn RecordStore>) -> Result<Self> {
        let guard = store.lock_writes().await;
        let id = store.savepoint().await?;
        Ok(Self {
            store,
            id: Some(id),
            guard: Some(guard),
        })
    }

    pub async fn commit(mut self) -> Result<()> {
        let result = match self.id.take() {
            Some(id) => self.store.commit(id).await,
            None => Ok(()),
        };
        self.guard = None;
        result
    }

    pub async fn rollback(mut self) -> Result<()> {
        let result = match self.id.take() {
            Some(id) => self.store.rollback(id).await,
            None => Ok(()),
        };
        self.guard = None;
        result
    }
}

impl Drop for SavepointScope {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        warn!(savepoint = id, "savepoint scope dropped while open, rolling back");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let store = Arc::clone(&self.store);
            let guard = self.guard.take();
            handle.spawn(async move {
                if let Err(e) = store.rollback(id).await {
                    warn!(savepoint = id, error = %e, "background rollback failed");
                }
                drop(guard);
            });
        }
    }
}
