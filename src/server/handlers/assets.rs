use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use super::{action_response, parse_id_selection, single_id, CurrentPrincipal};
use crate::auth::ModelPermission;
use crate::database::entities::assets;
use crate::errors::{CoreError, ImportExportError};
use crate::server::app::AppState;
use crate::services::asset_service::{AssetInput, AssetPage, AssetQuery, TerminalDescriptor};
use crate::services::{ActionStatus, ExportSelection, IdSelection, TreeNode};

pub async fn list_assets(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(query): Query<AssetQuery>,
) -> Result<Json<AssetPage>, CoreError> {
    Ok(Json(state.assets().list(&principal, &query).await?))
}

pub async fn get_asset(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
) -> Result<Json<assets::Model>, CoreError> {
    Ok(Json(state.assets().get(&principal, id).await?))
}

pub async fn create_asset(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(payload): Json<AssetInput>,
) -> Result<(StatusCode, Json<assets::Model>), CoreError> {
    let asset = state.assets().create(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

pub async fn update_asset(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<i32>,
    Json(payload): Json<AssetInput>,
) -> Result<Json<assets::Model>, CoreError> {
    Ok(Json(state.assets().update(&principal, id, payload).await?))
}

pub async fn delete_assets(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    body: String,
) -> Result<Json<ActionStatus>, CoreError> {
    let result = match parse_id_selection(&body) {
        Ok(selection) => state.assets().delete(&principal, &selection).await,
        Err(e) => Err(e),
    };
    action_response(result)
}

pub async fn refresh_hardware(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    body: String,
) -> Result<Json<ActionStatus>, CoreError> {
    let result = match single_id(&body) {
        Ok(id) => state
            .assets()
            .refresh_hardware(&principal, id)
            .await
            .map(|_| ActionStatus::ok()),
        Err(e) => Err(e),
    };
    action_response(result)
}

pub async fn terminal_descriptor(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    body: String,
) -> Result<Response, CoreError> {
    let result: Result<TerminalDescriptor, CoreError> = match single_id(&body) {
        Ok(id) => state.assets().terminal_descriptor(&principal, id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(descriptor) => Ok(Json(descriptor).into_response()),
        Err(e) => action_response(Err(e)).map(IntoResponse::into_response),
    }
}

pub async fn asset_tree(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Vec<TreeNode>>, CoreError> {
    Ok(Json(state.tree().build_tree(&principal).await?))
}

pub async fn export_all_assets(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Response, CoreError> {
    export(&state, &principal, ExportSelection::All).await
}

pub async fn export_selected_assets(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    body: String,
) -> Result<Response, CoreError> {
    let selection = match parse_id_selection(&body)? {
        IdSelection::Single(id) => ExportSelection::Ids(vec![id]),
        IdSelection::Many(ids) => ExportSelection::Ids(ids),
    };
    export(&state, &principal, selection).await
}

async fn export(
    state: &AppState,
    principal: &crate::auth::Principal,
    selection: ExportSelection,
) -> Result<Response, CoreError> {
    let bytes = state.exporter().export_assets(principal, selection).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"assets.csv\""),
    );

    Ok((headers, bytes).into_response())
}

/// Multipart upload with the CSV in the `file` field.
pub async fn import_assets(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    mut multipart: Multipart,
) -> Result<Response, CoreError> {
    state
        .authz()
        .require_model_permission(&principal, ModelPermission::AddAsset)
        .await?;

    let mut file_bytes: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CoreError::validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| CoreError::validation(format!("Failed to read upload: {}", e)))?;
            file_bytes = Some(bytes.to_vec());
        }
    }

    let Some(bytes) = file_bytes else {
        let missing = ImportExportError::MissingData("no file uploaded".to_string());
        return Ok(invalid_upload(&missing));
    };

    let importer = state
        .importer()
        .on_behalf_of(state.authz(), principal.clone());
    match importer.reconcile(&bytes).await {
        Ok(report) => Ok(Json(report.to_json()).into_response()),
        Err(e) if e.is_client_error() => {
            warn!("Rejected import from {}: {}", principal, e);
            Ok(invalid_upload(&e))
        }
        Err(e) => Err(e.into()),
    }
}

fn invalid_upload(err: &ImportExportError) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "valid": false, "msg": err.to_string(), "code": err.error_code() })),
    )
        .into_response()
}
