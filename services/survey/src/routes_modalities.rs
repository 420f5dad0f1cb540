use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use ratings::{sanitize_name, DatasetSummary, Partition};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ApiError, SessionError};
use crate::state::{SharedState, SharedStore};
use crate::store_exec::with_store_blocking;

#[derive(Deserialize)]
pub struct RaterQuery {
    pub rater: Option<String>,
}

#[derive(Serialize)]
pub struct SummaryResp {
    pub modality: String,
    pub rater: Option<String>,
    pub summary: DatasetSummary,
}

pub async fn get_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn get_modalities(State(st): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let catalog = st.catalog.clone();
    let modalities = tokio::task::spawn_blocking(move || catalog.modalities())
        .await
        .map_err(SessionError::from)?
        .map_err(SessionError::from)?;
    Ok(Json(json!({ "modalities": modalities })))
}

/// Dataset behind a read-only request. Per-rater datasets need a rater name.
async fn dataset(st: &SharedState, modality: &str, rater: Option<&str>) -> Result<SharedStore, SessionError> {
    let rater = match (st.config.partition, rater) {
        (Partition::PerRater, None) => return Err(SessionError::MissingRater),
        (_, rater) => rater.unwrap_or_default(),
    };
    st.existing_store(modality, rater).await
}

pub async fn get_summary(
    State(st): State<SharedState>,
    Path(modality): Path<String>,
    Query(q): Query<RaterQuery>,
) -> Result<Json<SummaryResp>, ApiError> {
    let store = dataset(&st, &modality, q.rater.as_deref()).await?;
    let summary = with_store_blocking(store, |store| {
        store.reload()?;
        Ok::<_, SessionError>(store.summary())
    })
    .await
    .map_err(SessionError::from)??;

    Ok(Json(SummaryResp { modality, rater: q.rater, summary }))
}

pub async fn get_export(
    State(st): State<SharedState>,
    Path(modality): Path<String>,
    Query(q): Query<RaterQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let store = dataset(&st, &modality, q.rater.as_deref()).await?;
    let rater = q.rater.clone();
    let bytes = with_store_blocking(store, move |store| {
        store.reload()?;
        Ok::<_, SessionError>(store.export_csv(rater.as_deref())?)
    })
    .await
    .map_err(SessionError::from)??;

    let file_name = match &q.rater {
        Some(rater) => format!("{}_{}_ratings.csv", sanitize_name(&modality), sanitize_name(rater)),
        None => format!("{}_ratings.csv", sanitize_name(&modality)),
    };
    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{file_name}\"")),
    ];
    Ok((headers, bytes))
}
