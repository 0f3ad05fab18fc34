use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::models::{TodoItemCreation, TodoItemUpdate};
use crate::paging::Paging;

#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Database>>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/items", get(list_items).post(create_item))
        .route("/v1/items/", get(list_items).post(create_item))
        .route(
            "/v1/items/:id",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_id(raw: &str) -> ApiResult<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::InvalidArgument(format!("invalid item id: {raw}"))),
    }
}

async fn create_item(
    State(state): State<AppState>,
    payload: Result<Json<TodoItemCreation>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(mut item) = payload?;
    state.db().create_item(&mut item)?;
    tracing::debug!(id = item.id, "item created");
    Ok(Json(json!({ "data": item })))
}

async fn list_items(
    State(state): State<AppState>,
    query: Result<Query<Paging>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(mut paging) = query?;
    paging.process();

    let items = {
        let db = state.db();
        paging.total = db.count_active()?;
        db.list_items(paging.limit, paging.offset())?
    };
    Ok(Json(json!({ "data": items, "paging": paging })))
}

async fn get_item(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&raw_id)?;
    let item = state.db().get_item(id)?;
    Ok(Json(json!({ "data": item })))
}

async fn update_item(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<TodoItemUpdate>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&raw_id)?;
    let Json(changes) = payload?;
    let touched = state.db().update_item(id, &changes)?;
    if touched == 0 {
        tracing::debug!(id, "update matched no rows");
    }
    Ok(Json(json!({ "updated": true })))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&raw_id)?;
    let touched = state.db().soft_delete_item(id)?;
    if touched == 0 {
        tracing::debug!(id, "soft delete matched no rows");
    }
    Ok(Json(json!({ "deleted": true })))
}
