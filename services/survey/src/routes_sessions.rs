use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use ratings::{parse_experience, Rater, ValidationError};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, SessionError};
use crate::session::{self, Language, SessionEvent, SessionView};
use crate::state::SharedState;
use crate::store_exec::with_store_blocking;

/// Experience arrives as typed by the rater, or as a number from API clients.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum Experience {
    Years(f64),
    Text(String),
}

fn default_resume() -> bool {
    true
}

#[derive(Deserialize)]
pub struct StartSessionReq {
    pub name: String,
    pub institution: String,
    #[serde(default)]
    pub years_of_experience: Option<Experience>,
    pub modality: String,
    #[serde(default)]
    pub language: Language,
    /// Start at the rater's first unrated item.
    #[serde(default = "default_resume")]
    pub resume: bool,
}

pub async fn post_session(
    State(st): State<SharedState>,
    body: Result<Json<StartSessionReq>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let Json(req) = body.map_err(SessionError::from)?;
    let years = match req.years_of_experience {
        Some(Experience::Years(y)) => y,
        Some(Experience::Text(text)) => parse_experience(&text).map_err(SessionError::from)?,
        None => return Err(SessionError::from(ValidationError::MalformedExperience(String::new())).into()),
    };
    let rater = Rater::new(req.name.trim(), req.institution.trim(), years);
    ratings::validate_rater(&rater).map_err(SessionError::from)?;

    let store = st.store_for(&req.modality, &rater.name).await?;
    let catalog = st.catalog.clone();
    let language = req.language;
    let resume = req.resume;

    let (session, view) = with_store_blocking(store, move |store| {
        session::start(Uuid::new_v4(), rater, language, resume, store, catalog.as_ref())
    })
    .await
    .map_err(SessionError::from)??;

    st.put_session(session).await;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_session(
    State(st): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let shared = st.get_session(id).await?;
    let session = shared.lock().await.clone();
    let store = st.store_for(&session.modality, &session.rater.name).await?;

    let view = with_store_blocking(store, move |store| session::view(&session, store))
        .await
        .map_err(SessionError::from)??;
    Ok(Json(view))
}

pub async fn post_event(
    State(st): State<SharedState>,
    Path(id): Path<Uuid>,
    body: Result<Json<SessionEvent>, JsonRejection>,
) -> Result<Json<SessionView>, ApiError> {
    let Json(event) = body.map_err(SessionError::from)?;
    let shared = st.get_session(id).await?;
    // Held until the new state is stored: one event at a time per session.
    let mut guard = shared.lock().await;
    let current = guard.clone();

    let modality = event.target_modality().unwrap_or(&current.modality).to_string();
    let store = st.store_for(&modality, &current.rater.name).await?;
    let catalog = st.catalog.clone();

    let (next, view) = with_store_blocking(store, move |store| {
        session::handle(current, event, store, catalog.as_ref())
    })
    .await
    .map_err(SessionError::from)??;

    let (modality, rater_name) = (next.modality.clone(), next.rater.name.clone());
    *guard = next;
    drop(guard);
    st.set_session_dataset(id, &modality, &rater_name).await;
    Ok(Json(view))
}

pub async fn delete_session(
    State(st): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    st.remove_session(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
