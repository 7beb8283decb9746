use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::{action_response, parse_id_selection, CurrentPrincipal};
use crate::database::entities::projects;
use crate::errors::CoreError;
use crate::server::app::AppState;
use crate::services::project_service::ProjectInput;
use crate::services::ActionStatus;

pub async fn list_projects(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Vec<projects::Model>>, CoreError> {
    Ok(Json(state.projects().list(&principal).await?))
}

pub async fn get_project(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
) -> Result<Json<projects::Model>, CoreError> {
    Ok(Json(state.projects().get(&principal, id).await?))
}

pub async fn create_project(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(payload): Json<ProjectInput>,
) -> Result<(StatusCode, Json<projects::Model>), CoreError> {
    let project = state.projects().create(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
    Json(payload): Json<ProjectInput>,
) -> Result<Json<projects::Model>, CoreError> {
    Ok(Json(state.projects().update(&principal, id, payload).await?))
}

pub async fn delete_projects(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    body: String,
) -> Result<Json<ActionStatus>, CoreError> {
    let result = match parse_id_selection(&body) {
        Ok(selection) => state.projects().delete(&principal, &selection).await,
        Err(e) => Err(e),
    };
    action_response(result)
}
