use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::{EverpathError, HttpStatusCode};

pub mod client;

/// Renders an error as `{"code": "...", "error": {"message": "...", "code": 409}}`.
///
/// The top-level `code` lets the booking UI detect `SLOT_CONFLICT` without parsing messages.
impl IntoResponse for EverpathError {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = Json(json!({
            "code": self.code(),
            "error": {
                "message": self.to_string(),
                "code": status_code.as_u16(),
            }
        }));

        (status_code, body).into_response()
    }
}

/// Converts a domain result into a JSON handler result.
pub fn handle_json_result<T, E>(result: Result<T, E>) -> Result<Json<T>, EverpathError>
where
    T: serde::Serialize,
    E: Into<EverpathError>,
{
    result.map(Json).map_err(Into::into)
}
