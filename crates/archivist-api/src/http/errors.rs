//! Plain-text error responses for failures detected before a body starts streaming.

use axum::{
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};

use crate::http::constants::{ARCHIVE_NOT_FOUND_BODY, CONTENT_TYPE_TEXT};

/// Error mapped onto a status code and a short text body.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) message: &'static str,
}

impl ApiError {
    const fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }

    pub(crate) const fn archive_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, ARCHIVE_NOT_FOUND_BODY)
    }

    pub(crate) const fn internal(message: &'static str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub(crate) const fn service_unavailable(message: &'static str) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, [(CONTENT_TYPE, CONTENT_TYPE_TEXT)], self.message).into_response()
    }
}
