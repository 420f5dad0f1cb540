use std::sync::Arc;
use tokio::sync::Mutex;

/// Run `f` on the blocking pool with exclusive access to `store`.
/// Dataset reads and writes are plain file I/O and must not stall the runtime.
pub async fn with_store_blocking<S, R, F>(
    store: Arc<Mutex<S>>,
    f: F,
) -> Result<R, tokio::task::JoinError>
where
    S: Send + 'static,
    R: Send + 'static,
    F: FnOnce(&mut S) -> R + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = store.blocking_lock();
        f(&mut *guard)
    })
    .await
}
