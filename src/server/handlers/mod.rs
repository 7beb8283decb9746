pub mod assets;
pub mod businesses;
pub mod health;
pub mod login_users;
pub mod projects;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::Json;

use crate::auth::Principal;
use crate::errors::{AuthError, CoreError, CoreErrorKind, CoreResult};
use crate::services::{ActionStatus, IdSelection};

/// Header set by the fronting authentication layer.
pub const PRINCIPAL_HEADER: &str = "x-inventory-user";

/// The principal a request acts for.
pub struct CurrentPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(PRINCIPAL_HEADER)
            .ok_or(AuthError::AuthenticationRequired)?;
        let username = value
            .to_str()
            .map_err(|_| AuthError::InvalidPrincipal("header is not visible ASCII".to_string()))?;
        Ok(Self(Principal::new(username)?))
    }
}

/// Read `nid=<id>` or repeated `id=<id>` from a form encoded body.
pub fn parse_id_selection(body: &str) -> CoreResult<IdSelection> {
    let mut single = None;
    let mut many = Vec::new();

    for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
        let parse = |raw: &str| {
            raw.trim()
                .parse::<i32>()
                .map_err(|_| CoreError::validation(format!("'{}' is not a valid id", raw)))
        };
        match key.as_ref() {
            "nid" if !value.trim().is_empty() => single = Some(parse(value.as_ref())?),
            "id" if !value.trim().is_empty() => many.push(parse(value.as_ref())?),
            _ => {}
        }
    }

    match single {
        Some(id) => Ok(IdSelection::Single(id)),
        None if !many.is_empty() => Ok(IdSelection::Many(many)),
        None => Err(CoreError::validation("no id given")),
    }
}

/// The id of an action that targets exactly one record.
pub fn single_id(body: &str) -> CoreResult<i32> {
    match parse_id_selection(body)? {
        IdSelection::Single(id) => Ok(id),
        IdSelection::Many(ids) if ids.len() == 1 => Ok(ids[0]),
        IdSelection::Many(_) => Err(CoreError::validation("exactly one id expected")),
    }
}

/// Bulk and action endpoints answer `{status, error}`. Only server faults
/// leave as error responses.
pub fn action_response(result: CoreResult<ActionStatus>) -> Result<Json<ActionStatus>, CoreError> {
    match result {
        Ok(status) => Ok(Json(status)),
        Err(e) if e.kind() == CoreErrorKind::Internal => Err(e),
        Err(e) => Ok(Json(ActionStatus::failed(e.message()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nid_wins_over_id_list() {
        assert_eq!(
            parse_id_selection("nid=4&id=5").expect("parses"),
            IdSelection::Single(4)
        );
    }

    #[test]
    fn test_repeated_ids() {
        assert_eq!(
            parse_id_selection("id=1&id=2&id=3").expect("parses"),
            IdSelection::Many(vec![1, 2, 3])
        );
    }

    #[test]
    fn test_rejects_garbage_and_empty_bodies() {
        assert!(parse_id_selection("id=1%3B+DROP+TABLE").is_err());
        assert!(parse_id_selection("").is_err());
        assert!(parse_id_selection("nid=").is_err());
    }

    #[test]
    fn test_single_id() {
        assert_eq!(single_id("id=9").expect("parses"), 9);
        assert!(single_id("id=1&id=2").is_err());
    }

    #[test]
    fn test_action_response_keeps_denials_in_body() {
        let Json(status) = action_response(Err(CoreError::forbidden("no cmd_project permission")))
            .unwrap_or_else(|_| panic!("denial should not be an error response"));
        assert!(!status.status);
        assert_eq!(status.error.as_deref(), Some("no cmd_project permission"));

        assert!(action_response(Err(CoreError::internal("disk full"))).is_err());
    }
}
