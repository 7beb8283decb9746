use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::{action_response, parse_id_selection, CurrentPrincipal};
use crate::database::entities::businesses;
use crate::errors::CoreError;
use crate::server::app::AppState;
use crate::services::business_service::BusinessInput;
use crate::services::ActionStatus;

pub async fn list_businesses(
    State(state): State<AppState>,
    CurrentPrincipal(_principal): CurrentPrincipal,
) -> Result<Json<Vec<businesses::Model>>, CoreError> {
    Ok(Json(state.businesses().list().await?))
}

pub async fn get_business(
    State(state): State<AppState>,
    CurrentPrincipal(_principal): CurrentPrincipal,
    Path(id): Path<i32>,
) -> Result<Json<businesses::Model>, CoreError> {
    Ok(Json(state.businesses().get(id).await?))
}

pub async fn create_business(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(payload): Json<BusinessInput>,
) -> Result<(StatusCode, Json<businesses::Model>), CoreError> {
    let business = state.businesses().create(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(business)))
}

pub async fn update_business(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
    Json(payload): Json<BusinessInput>,
) -> Result<Json<businesses::Model>, CoreError> {
    Ok(Json(state.businesses().update(&principal, id, payload).await?))
}

pub async fn delete_businesses(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    body: String,
) -> Result<Json<ActionStatus>, CoreError> {
    let result = match parse_id_selection(&body) {
        Ok(selection) => state.businesses().delete(&principal, &selection).await,
        Err(e) => Err(e),
    };
    action_response(result)
}
