use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::AppState;

/// Validates that a slug only contains lowercase ASCII letters, digits and hyphens,
/// does not start or end with a hyphen, and is between 2 and 63 characters.
/// This prevents SQL injection via the clinic name used in format!() schema queries.
pub fn is_valid_slug(s: &str) -> bool {
    let len = s.len();
    len >= 2
        && len <= 63
        && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

/// Extracts the clinic slug from the `X-Clinic` header or first subdomain,
/// then validates the clinic exists and is active.
#[derive(Debug, Clone)]
pub struct ClinicSlug(pub String);

impl FromRequestParts<AppState> for ClinicSlug {
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let slug = extract_slug(parts)?;

        let row: Option<(bool,)> = sqlx::query_as(
            "SELECT is_active FROM public.clinics WHERE slug = $1",
        )
        .bind(&slug)
        .fetch_optional(&state.db)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Database error" }))))?;

        match row {
            None => Err((StatusCode::NOT_FOUND, Json(json!({ "error": "Clinic not found" })))),
            Some((false,)) => Err((StatusCode::FORBIDDEN, Json(json!({ "error": "Clinic is inactive" })))),
            Some((true,)) => Ok(ClinicSlug(slug)),
        }
    }
}

fn extract_slug(parts: &Parts) -> Result<String, (StatusCode, Json<Value>)> {
    // 1. X-Clinic header
    if let Some(clinic) = parts
        .headers
        .get("X-Clinic")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase())
        .filter(|s| !s.is_empty())
    {
        if !is_valid_slug(&clinic) {
            return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid clinic identifier" }))));
        }
        return Ok(clinic);
    }

    // 2. Subdomain from Host header
    if let Some(host) = parts.headers.get("Host").and_then(|v| v.to_str().ok()) {
        let domain = host.split(':').next().unwrap_or(host);
        let parts_vec: Vec<&str> = domain.split('.').collect();
        if parts_vec.len() >= 3 {
            let subdomain = parts_vec[0].to_lowercase();
            if subdomain != "www" && subdomain != "api" {
                if !is_valid_slug(&subdomain) {
                    return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid clinic identifier" }))));
                }
                return Ok(subdomain);
            }
        }
    }

    Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "Missing X-Clinic header" }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_validation() {
        assert!(is_valid_slug("demo"));
        assert!(is_valid_slug("clinic-42"));
        assert!(!is_valid_slug("a"));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug("trailing-"));
        assert!(!is_valid_slug("Upper"));
        assert!(!is_valid_slug("bad;drop table"));
        // Double quotes would escape the quoted identifier in schema DDL.
        assert!(!is_valid_slug("de\"mo"));
        assert!(!is_valid_slug("demo\"; drop schema public cascade; --"));
    }
}
