use crate::dto::DateWindow;
use crate::errors::ServiceError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Json as JsonBody, Query},
    Json,
};
use serde::Serialize;
use validator::Validate;

/// Envelope of every successful report response.
#[derive(Debug, Serialize)]
pub struct ReportResponse<T> {
    pub data: T,
    pub status: &'static str,
}

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Json<ReportResponse<T>> {
    Json(ReportResponse {
        data,
        status: "success",
    })
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::ValidationError(format!("Validation failed: {}", e)))
}

/// Validates a dated request and checks its window ordering.
pub fn validate_window<T: Validate + DateWindow>(input: &T) -> Result<(), ServiceError> {
    validate_input(input)?;
    input.check_window()
}

/// Unwraps a JSON body, reporting malformed payloads as 400.
pub fn json_body<T>(payload: Result<JsonBody<T>, JsonRejection>) -> Result<T, ServiceError> {
    payload
        .map(|JsonBody(body)| body)
        .map_err(|rejection| ServiceError::BadRequest(rejection.body_text()))
}

/// Unwraps a query string, reporting malformed parameters as 400.
pub fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ServiceError> {
    params
        .map(|Query(params)| params)
        .map_err(|rejection| ServiceError::BadRequest(rejection.body_text()))
}
