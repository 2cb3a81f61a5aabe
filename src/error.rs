use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::models::template::TemplateSectionType;

/// Error taxonomy of the form engine. Every variant maps to a fixed HTTP
/// status and the `{"error": ...}` body shape used across the API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("template {0} not found or inactive")]
    TemplateNotFound(Uuid),

    #[error("template {template_id} targets section '{actual}', not '{expected}'")]
    SectionTypeMismatch {
        template_id: Uuid,
        expected: TemplateSectionType,
        actual: TemplateSectionType,
    },

    #[error("form assignment is locked until {locked_until}")]
    AssignmentLocked { locked_until: DateTime<Utc> },

    #[error("structure was modified by another editor (submitted version {submitted})")]
    ConcurrentModification { submitted: i32 },

    #[error("clinic has no public slug configured")]
    MissingClinicSlug,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::SectionTypeMismatch { .. } => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) | Self::TemplateNotFound(_) => StatusCode::NOT_FOUND,
            Self::AssignmentLocked { .. } => StatusCode::LOCKED,
            Self::ConcurrentModification { .. } | Self::MissingClinicSlug => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("internal error: {self:#}");
        }
        let body = match &self {
            ApiError::AssignmentLocked { locked_until } => json!({
                "error": self.to_string(),
                "locked_until": locked_until,
            }),
            ApiError::ConcurrentModification { submitted } => json!({
                "error": self.to_string(),
                "submitted_version": submitted,
            }),
            // Do not leak SQL details to clients.
            ApiError::Database(_) => json!({ "error": "Database error" }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            ApiError::validation("bad").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::NotFound("product").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::TemplateNotFound(Uuid::nil()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::AssignmentLocked { locked_until: Utc::now() }.status(),
            StatusCode::LOCKED
        );
        assert_eq!(
            ApiError::ConcurrentModification { submitted: 3 }.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ApiError::MissingClinicSlug.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn locked_body_carries_timestamp() {
        let until = Utc::now();
        let err = ApiError::AssignmentLocked { locked_until: until };
        assert!(err.to_string().contains("locked until"));
    }
}
