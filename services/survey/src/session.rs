//! Rater sessions.
//!
//! A session is plain data. Every interaction goes through
//! [`handle`], which takes the current state and one event and returns the
//! next state together with the view to show. The HTTP layer only stores the
//! returned state; on error it keeps the previous one.

use std::collections::HashSet;
use std::path::PathBuf;

use catalog::{fingerprint_hex, ItemSource};
use csvdb::Storage;
use ratings::{
    validate_rater, FilterMode, IdentityScope, Item, ItemKey, LoadWarning, Rater, RatingRecord,
    RatingStore, ScoreInput, Scores,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SessionError;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    fn item_label(self, number: usize) -> String {
        match self {
            Language::En => format!("Image {number}"),
            Language::Zh => format!("图像{number}"),
        }
    }

    fn saved(self, filename: &str) -> String {
        match self {
            Language::En => format!("Saved: {filename}"),
            Language::Zh => format!("已保存：{filename}"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SessionState {
    pub id: Uuid,
    pub rater: Rater,
    pub language: Language,
    pub modality: String,
    pub cursor: ratings::SessionCursor,
    /// Fingerprint of the listing the cursor was built from.
    pub listing: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Next,
    Previous,
    JumpTo { method: String, filename: String },
    SkipRated,
    Filter { mode: FilterMode },
    ChangeModality { modality: String },
    ChangeLanguage { language: Language },
    /// The image for this item could not be shown.
    ImageFailed {
        method: String,
        filename: String,
        #[serde(default)]
        reason: Option<String>,
    },
    /// Scores are range-checked before anything is written.
    Submit { scores: ScoreInput },
}

impl SessionEvent {
    /// Modality whose dataset the event needs, when it is not the session's.
    pub fn target_modality(&self) -> Option<&str> {
        match self {
            SessionEvent::ChangeModality { modality } => Some(modality),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CurrentItem {
    pub index: usize,
    pub method: String,
    pub filename: String,
    pub source_location: PathBuf,
    pub rated: bool,
    /// Previous submission, or the defaults for an unrated item.
    pub scores: Scores,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ItemLabel {
    pub index: usize,
    pub method: String,
    pub filename: String,
    pub label: String,
    pub rated: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ProgressView {
    pub completed: usize,
    pub total: usize,
    pub ratio: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub rater: String,
    pub modality: String,
    pub language: Language,
    pub filter: FilterMode,
    pub complete: bool,
    pub current: Option<CurrentItem>,
    pub items: Vec<ItemLabel>,
    pub progress: ProgressView,
    /// Set only after a submission reached storage.
    pub message: Option<String>,
    pub warnings: Vec<LoadWarning>,
}

/// Begin a session on the store's modality. With `resume`, the cursor starts
/// at the rater's first unrated item instead of the first item.
pub fn start<S: Storage>(
    id: Uuid,
    rater: Rater,
    language: Language,
    resume: bool,
    store: &mut RatingStore<S>,
    catalog: &dyn ItemSource,
) -> Result<(SessionState, SessionView)> {
    validate_rater(&rater)?;

    let modality = store.modality().to_string();
    let items = catalog.list_items(&modality)?;
    let listing = fingerprint_hex(&items);

    let mut state = SessionState {
        id,
        rater,
        language,
        modality,
        cursor: ratings::SessionCursor::new(items),
        listing,
    };
    if resume {
        let rated = rated_for(&state, store);
        state.cursor.skip_rated(&rated);
    }

    info!(
        session = %state.id,
        rater = %state.rater.name,
        modality = %state.modality,
        position = state.cursor.current_index(),
        "session started"
    );
    let view = render(&state, store, None);
    Ok((state, view))
}

/// Apply one event. `store` must hold the dataset of the event's target
/// modality (see [`SessionEvent::target_modality`]).
pub fn handle<S: Storage>(
    mut state: SessionState,
    event: SessionEvent,
    store: &mut RatingStore<S>,
    catalog: &dyn ItemSource,
) -> Result<(SessionState, SessionView)> {
    store.reload()?;
    if event.target_modality().is_none() {
        refresh_listing(&mut state, store, catalog)?;
    }
    let rated = rated_for(&state, store);
    let mut message = None;

    match event {
        SessionEvent::Next => {
            state.cursor.advance();
        }
        SessionEvent::Previous => {
            state.cursor.retreat();
        }
        SessionEvent::JumpTo { method, filename } => {
            state.cursor.jump_to(&ItemKey::new(method, filename))?;
        }
        SessionEvent::SkipRated => {
            state.cursor.skip_rated(&rated);
        }
        SessionEvent::Filter { mode } => {
            state.cursor.reapply_filter(mode, &rated);
        }
        SessionEvent::ChangeLanguage { language } => {
            state.language = language;
            let mode = state.cursor.mode();
            state.cursor.reapply_filter(mode, &rated);
        }
        SessionEvent::ImageFailed { method, filename, reason } => {
            let key = ItemKey::new(method, filename);
            if state.cursor.drop_item(&key).is_some() {
                warn!(
                    session = %state.id,
                    item = %key,
                    reason = reason.as_deref().unwrap_or("unknown"),
                    "image could not be shown, item removed from session"
                );
            }
        }
        SessionEvent::Submit { scores } => {
            let scores = ratings::parse_scores(&scores)?;
            let item = current_item(&state).ok_or(SessionError::NoCurrentItem)?;
            let record = RatingRecord::new(state.rater.clone(), item, scores).stamped();
            let filename = record.filename.clone();
            store.upsert(record)?;
            message = Some(state.language.saved(&filename));
            state.cursor.advance();
        }
        SessionEvent::ChangeModality { modality } => {
            if store.modality() != modality {
                return Err(ratings::ValidationError::ModalityMismatch {
                    expected: store.modality().to_string(),
                    found: modality,
                }
                .into());
            }
            let items = catalog.list_items(&modality)?;
            let mode = state.cursor.mode();
            state.listing = fingerprint_hex(&items);
            state.modality = modality;
            state.cursor = ratings::SessionCursor::new(items);
            let rated = rated_for(&state, store);
            state.cursor.reapply_filter(mode, &rated);
            info!(session = %state.id, modality = %state.modality, "modality changed");
        }
    }

    let view = render(&state, store, message);
    Ok((state, view))
}

/// View of the session as it stands, without applying an event.
pub fn view<S: Storage>(state: &SessionState, store: &mut RatingStore<S>) -> Result<SessionView> {
    store.reload()?;
    Ok(render(state, store, None))
}

fn current_item(state: &SessionState) -> Option<&Item> {
    if state.cursor.is_complete() {
        None
    } else {
        state.cursor.current()
    }
}

/// Rater whose rows count as "rated" for this session.
fn rater_filter<'a, S: Storage>(state: &'a SessionState, store: &RatingStore<S>) -> Option<&'a str> {
    match store.scope() {
        IdentityScope::RaterAndItem => Some(state.rater.name.as_str()),
        IdentityScope::ItemOnly => None,
    }
}

fn rated_for<S: Storage>(state: &SessionState, store: &RatingStore<S>) -> HashSet<ItemKey> {
    store.rated_keys(rater_filter(state, store))
}

/// Pick up images added or removed since the cursor was built.
fn refresh_listing<S: Storage>(
    state: &mut SessionState,
    store: &RatingStore<S>,
    catalog: &dyn ItemSource,
) -> Result<()> {
    let items = catalog.list_items(&state.modality)?;
    let listing = fingerprint_hex(&items);
    if listing != state.listing {
        info!(session = %state.id, items = items.len(), "image listing changed");
        let rated = rated_for(state, store);
        state.cursor.replace_items(items, &rated);
        state.listing = listing;
    }
    Ok(())
}

fn render<S: Storage>(state: &SessionState, store: &mut RatingStore<S>, message: Option<String>) -> SessionView {
    let rater = rater_filter(state, store);
    let rated = store.rated_keys(rater);

    let current = current_item(state).map(|item| {
        let key = item.key();
        let previous = store.find(&state.rater.name, &item.filename, &item.method);
        CurrentItem {
            index: state.cursor.current_index(),
            method: item.method.clone(),
            filename: item.filename.clone(),
            source_location: item.source_location.clone(),
            rated: rated.contains(&key),
            scores: previous.map(|r| r.scores).unwrap_or_default(),
        }
    });

    let items = state
        .cursor
        .items()
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let is_rated = rated.contains(&item.key());
            let mut label = state.language.item_label(index + 1);
            if is_rated {
                label.push_str(" ✅");
            }
            ItemLabel {
                index,
                method: item.method.clone(),
                filename: item.filename.clone(),
                label,
                rated: is_rated,
            }
        })
        .collect();

    let known: Vec<ItemKey> = state.cursor.all_items().iter().map(Item::key).collect();
    let progress = store.progress(&known, rater);

    SessionView {
        session_id: state.id,
        rater: state.rater.name.clone(),
        modality: state.modality.clone(),
        language: state.language,
        filter: state.cursor.mode(),
        complete: state.cursor.is_complete(),
        current,
        items,
        progress: ProgressView {
            completed: progress.completed,
            total: progress.total,
            ratio: progress.ratio(),
        },
        message,
        warnings: store.take_warnings(),
    }
}
