//! Static index page.

use std::sync::Arc;

use axum::{extract::State, response::Html};
use tracing::error;

use crate::http::errors::ApiError;
use crate::state::ApiState;

pub(crate) async fn index(State(state): State<Arc<ApiState>>) -> Result<Html<String>, ApiError> {
    tokio::fs::read_to_string(&state.index_path)
        .await
        .map(Html)
        .map_err(|err| {
            error!(error = %err, path = %state.index_path.display(), "failed to read index page");
            ApiError::internal("index page unavailable")
        })
}
