mod middleware;
mod public;

pub use public::{HttpState, build_router, build_state, build_state_with_tokens};

use axum::http::StatusCode;

use crate::application::error::HttpError;
use crate::application::reload::ReloadPipelineError;
use crate::application::repos::RepoError;

/// Map a repository error to a consistent HTTP error response.
pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    match err {
        RepoError::InvalidInput { message } => {
            HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid input", message)
        }
        RepoError::Persistence(message) => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Persistence error",
            message,
        ),
    }
}

/// Collaborator failures inside the reload pipeline surface as the generic
/// 500 path, never as one of the typed JSON error payloads.
pub fn pipeline_error_to_http(source: &'static str, err: ReloadPipelineError) -> HttpError {
    match err {
        ReloadPipelineError::Repo(err) => repo_error_to_http(source, err),
        ReloadPipelineError::Render(err) => HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Fragment rendering failed",
            &err,
        ),
    }
}
