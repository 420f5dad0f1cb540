use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::Arc,
    time::Instant,
};

use catalog::{DirectoryCatalog, ItemSource};
use csvdb::FileStorage;
use ratings::RatingStore;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::SessionError;
use crate::session::SessionState;

pub type SharedState = Arc<AppState>;
pub type SharedStore = Arc<Mutex<RatingStore<FileStorage>>>;
pub type SharedSession = Arc<Mutex<SessionState>>;

struct SessionSlot {
    session: SharedSession,
    /// Dataset the session currently writes to; keeps its store open.
    dataset: PathBuf,
    last_seen: Instant,
}

pub struct AppState {
    pub config: AppConfig,
    pub catalog: Arc<dyn ItemSource>,
    sessions: RwLock<HashMap<Uuid, SessionSlot>>,
    /// One open store per dataset file, shared by every session writing to it.
    stores: Mutex<HashMap<PathBuf, SharedStore>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let catalog = DirectoryCatalog::new(config.image_root.clone(), config.extra_formats);
        Self::with_catalog(config, Arc::new(catalog))
    }

    pub fn with_catalog(config: AppConfig, catalog: Arc<dyn ItemSource>) -> Self {
        Self {
            config,
            catalog,
            sessions: RwLock::new(HashMap::new()),
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub async fn put_session(&self, session: SessionState) -> SharedSession {
        let id = session.id;
        let dataset = self.config.dataset_path(&session.modality, &session.rater.name);
        let shared = Arc::new(Mutex::new(session));
        let slot = SessionSlot { session: shared.clone(), dataset, last_seen: Instant::now() };

        let evicted = {
            let mut sessions = self.sessions.write().await;
            let evicted = self.evict_idle(&mut sessions);
            sessions.insert(id, slot);
            evicted
        };
        if evicted > 0 {
            self.release_unused_stores().await;
        }
        shared
    }

    /// Live session by id. Counts as activity for the idle timeout.
    pub async fn get_session(&self, id: Uuid) -> Result<SharedSession, SessionError> {
        let (found, evicted) = {
            let mut sessions = self.sessions.write().await;
            let evicted = self.evict_idle(&mut sessions);
            let found = sessions.get_mut(&id).map(|slot| {
                slot.last_seen = Instant::now();
                slot.session.clone()
            });
            (found, evicted)
        };
        if evicted > 0 {
            self.release_unused_stores().await;
        }
        found.ok_or(SessionError::UnknownSession(id))
    }

    /// Record that session `id` now writes to the dataset of `modality`.
    pub async fn set_session_dataset(&self, id: Uuid, modality: &str, rater_name: &str) {
        let dataset = self.config.dataset_path(modality, rater_name);
        let moved = match self.sessions.write().await.get_mut(&id) {
            Some(slot) if slot.dataset != dataset => {
                slot.dataset = dataset;
                true
            }
            _ => false,
        };
        if moved {
            self.release_unused_stores().await;
        }
    }

    /// End a session. Its dataset is closed once no other session uses it.
    pub async fn remove_session(&self, id: Uuid) -> Result<(), SessionError> {
        let removed = self.sessions.write().await.remove(&id);
        if removed.is_none() {
            return Err(SessionError::UnknownSession(id));
        }
        tracing::info!(session = %id, "session ended");
        self.release_unused_stores().await;
        Ok(())
    }

    /// Drop sessions idle for at least `config.session_idle` and close the
    /// datasets they leave unused. Returns how many sessions were dropped.
    pub async fn sweep(&self) -> usize {
        let evicted = self.evict_idle(&mut *self.sessions.write().await);
        if evicted > 0 {
            self.release_unused_stores().await;
        }
        evicted
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn open_store_count(&self) -> usize {
        self.stores.lock().await.len()
    }

    fn evict_idle(&self, sessions: &mut HashMap<Uuid, SessionSlot>) -> usize {
        let idle = self.config.session_idle;
        let before = sessions.len();
        sessions.retain(|id, slot| {
            let keep = slot.last_seen.elapsed() < idle;
            if !keep {
                tracing::info!(session = %id, "session expired");
            }
            keep
        });
        before - sessions.len()
    }

    /// Close stores no session points at and no request is using.
    async fn release_unused_stores(&self) {
        let live: HashSet<PathBuf> =
            self.sessions.read().await.values().map(|slot| slot.dataset.clone()).collect();
        let mut stores = self.stores.lock().await;
        stores.retain(|path, store| {
            let keep = live.contains(path) || Arc::strong_count(store) > 1;
            if !keep {
                tracing::debug!(dataset = %path.display(), "dataset closed");
            }
            keep
        });
    }

    /// Store for the dataset `rater_name` writes to in `modality`, opened on
    /// first use. The modality must exist in the catalog.
    pub async fn store_for(&self, modality: &str, rater_name: &str) -> Result<SharedStore, SessionError> {
        let path = self.config.dataset_path(modality, rater_name);
        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get(&path) {
            return Ok(store.clone());
        }

        let catalog = self.catalog.clone();
        let scope = self.config.partition.scope();
        let modality = modality.to_string();
        let open_path = path.clone();
        let store = tokio::task::spawn_blocking(move || -> Result<_, SessionError> {
            catalog.list_items(&modality)?;
            let storage = FileStorage::new(open_path)?;
            Ok(RatingStore::open(storage, modality, scope)?)
        })
        .await??;

        tracing::info!(dataset = %path.display(), records = store.len(), "dataset opened");
        let store = Arc::new(Mutex::new(store));
        stores.insert(path, store.clone());
        Ok(store)
    }

    /// Store for an existing dataset only; read-only routes never create files.
    pub async fn existing_store(&self, modality: &str, rater_name: &str) -> Result<SharedStore, SessionError> {
        let path = self.config.dataset_path(modality, rater_name);
        let open = self.stores.lock().await.contains_key(&path);
        if !open && !path.is_file() {
            return Err(SessionError::NoDataset(modality.to_string()));
        }
        self.store_for(modality, rater_name).await
    }
}
