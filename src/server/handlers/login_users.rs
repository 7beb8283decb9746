use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::{action_response, parse_id_selection, CurrentPrincipal};
use crate::database::entities::{assets, login_users};
use crate::errors::CoreError;
use crate::server::app::AppState;
use crate::services::login_user_service::LoginUserInput;
use crate::services::ActionStatus;

pub async fn list_login_users(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Vec<login_users::Model>>, CoreError> {
    Ok(Json(state.login_users().list(&principal).await?))
}

pub async fn get_login_user(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
) -> Result<Json<login_users::Model>, CoreError> {
    Ok(Json(state.login_users().get(&principal, id).await?))
}

pub async fn login_user_assets(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
) -> Result<Json<Vec<assets::Model>>, CoreError> {
    Ok(Json(state.login_users().assets(&principal, id).await?))
}

pub async fn create_login_user(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(payload): Json<LoginUserInput>,
) -> Result<(StatusCode, Json<login_users::Model>), CoreError> {
    let user = state.login_users().create(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_login_user(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
    Json(payload): Json<LoginUserInput>,
) -> Result<Json<login_users::Model>, CoreError> {
    Ok(Json(state.login_users().update(&principal, id, payload).await?))
}

pub async fn delete_login_users(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    body: String,
) -> Result<Json<ActionStatus>, CoreError> {
    let result = match parse_id_selection(&body) {
        Ok(selection) => state.login_users().delete(&principal, &selection).await,
        Err(e) => Err(e),
    };
    action_response(result)
}
