use matatena_core::SessionError;
use rocket::http::Status;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Envelope for every REST response.
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T> {
    pub message: String,
    pub result: Option<T>,
}

pub type ApiResult<T> = (Status, Json<ApiResponse<T>>);

pub fn success<T>(status: Status, result: T) -> ApiResult<T> {
    (
        status,
        Json(ApiResponse {
            message: format!("{}: {}", status.code, status.reason_lossy()),
            result: Some(result),
        }),
    )
}

pub fn failure<T>(err: SessionError) -> ApiResult<T> {
    let status =
        Status::from_code(err.kind().status_code()).unwrap_or(Status::InternalServerError);
    if status == Status::InternalServerError {
        error!(error = %err, "request failed");
    } else {
        warn!(error = %err, "request rejected");
    }
    (
        status,
        Json(ApiResponse {
            message: format!("{}: {}", status.code, err.reason()),
            result: None,
        }),
    )
}

/// Folds a session result into the envelope.
pub fn respond<T>(status: Status, result: Result<T, SessionError>) -> ApiResult<T> {
    match result {
        Ok(value) => success(status, value),
        Err(err) => failure(err),
    }
}
