use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::Request;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;
use crate::threading::ThreadingError;

/// Failure of an API handler, rendered as `{ "error", "message" }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("threading failed: {0}")]
    Threading(ThreadingError),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Threading(_) | ApiError::Database(_) => Status::InternalServerError,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NotFound",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::Threading(_) => "ThreadingError",
            ApiError::Database(_) => "DatabaseError",
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status.code >= 500 {
            log::error!("{} {}: {}", request.method(), request.uri(), self);
        } else {
            log::debug!("{} {}: {}", request.method(), request.uri(), self);
        }

        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };

        (status, Json(body)).respond_to(request)
    }
}

impl OpenApiResponderInner for ApiError {
    fn responses(_generator: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        Ok(Responses::default())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("resource not found".to_string()),
            other => ApiError::Database(other),
        }
    }
}

impl From<ThreadingError> for ApiError {
    fn from(err: ThreadingError) -> Self {
        match err {
            ThreadingError::TooDeepToNest { .. } => ApiError::BadRequest(err.to_string()),
            ThreadingError::CrossThread { .. } => ApiError::Threading(err),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ThreadNotFound(_) => ApiError::NotFound(err.to_string()),
            StoreError::UnknownParent { .. } | StoreError::Invalid(_) => {
                ApiError::BadRequest(err.to_string())
            }
            StoreError::Database(e) => ApiError::from(e),
        }
    }
}
