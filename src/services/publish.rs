use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    config::Config,
    db::tenant::schema_name,
    error::ApiError,
    models::assignment::TenantProductFormAssignment,
    services::{
        assignments::{AssignmentService, ASSIGNMENT_COLUMNS},
        catalog::CatalogService,
        metrics,
    },
};

pub struct PublishService;

impl PublishService {
    /// Publish a product's form: resolve the canonical patient-facing URL
    /// and stamp `last_published_at`. The URL is minted once; republishing
    /// keeps the existing one so printed QR codes and shared links survive.
    pub async fn publish(
        pool: &PgPool,
        config: &Config,
        tenant: &str,
        treatment_id: Uuid,
    ) -> Result<TenantProductFormAssignment, ApiError> {
        let schema = schema_name(tenant);
        let assignment = AssignmentService::fetch(pool, tenant, treatment_id)
            .await?
            .ok_or(ApiError::NotFound("assignment"))?;

        // Never guess the public host: without a configured slug the publish
        // fails outright.
        let clinic_slug = CatalogService::clinic_public_slug(pool, tenant)
            .await?
            .ok_or(ApiError::MissingClinicSlug)?;

        let product = CatalogService::get_product(pool, tenant, treatment_id).await?;
        let product_slug = match product.slug.as_deref() {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => {
                let generated = format!("{}-{}", slugify(&product.name), Utc::now().timestamp());
                CatalogService::set_product_slug(pool, tenant, treatment_id, &generated).await?;
                generated
            }
        };

        let minted = build_form_url(config, &clinic_slug, &product_slug, assignment.id);
        let url = effective_url(assignment.published_url.as_deref(), minted);
        let updated = sqlx::query_as::<_, TenantProductFormAssignment>(&format!(
            "UPDATE {schema}.product_form_assignments
             SET published_url = $1,
                 last_published_at = NOW()
             WHERE treatment_id = $2
             RETURNING {ASSIGNMENT_COLUMNS}"
        ))
        .bind(&url)
        .bind(treatment_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("assignment"))?;

        metrics::record_publish(tenant);
        tracing::info!(
            "Published form for product {treatment_id} ({tenant}): {}",
            updated.published_url.as_deref().unwrap_or(&url)
        );
        Ok(updated)
    }

    /// Set or clear the edit freeze. Imports and detaches are refused while
    /// `locked_until` lies in the future; publishing stays allowed.
    pub async fn lock(
        pool: &PgPool,
        tenant: &str,
        treatment_id: Uuid,
        until: Option<DateTime<Utc>>,
    ) -> Result<TenantProductFormAssignment, ApiError> {
        let schema = schema_name(tenant);
        sqlx::query_as::<_, TenantProductFormAssignment>(&format!(
            "UPDATE {schema}.product_form_assignments
             SET locked_until = $1
             WHERE treatment_id = $2
             RETURNING {ASSIGNMENT_COLUMNS}"
        ))
        .bind(until)
        .bind(treatment_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("assignment"))
    }
}

/// The URL a publish writes: the first minted URL is permanent, later
/// publishes keep the existing one.
pub fn effective_url(existing: Option<&str>, minted: String) -> String {
    match existing {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => minted,
    }
}

/// Canonical patient-facing form URL.
pub fn build_form_url(
    config: &Config,
    clinic_slug: &str,
    product_slug: &str,
    assignment_id: Uuid,
) -> String {
    let scheme = if config.is_production() { "https" } else { "http" };
    format!(
        "{scheme}://{clinic_slug}.{}/my-products/{product_slug}/{assignment_id}",
        config.form_domain
    )
}

/// Lowercase, alphanumeric-and-hyphen slug: runs of other characters
/// collapse to one hyphen, leading/trailing hyphens are trimmed.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c.to_ascii_lowercase());
            pending_hyphen = false;
        } else {
            pending_hyphen = true;
        }
    }
    if slug.is_empty() {
        "product".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(environment: &str, form_domain: &str) -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: String::new(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            super_admin_key: String::new(),
            app_base_url: String::new(),
            environment: environment.to_string(),
            form_domain: form_domain.to_string(),
        }
    }

    #[test]
    fn slugify_normalizes_names() {
        assert_eq!(slugify("Minoxidil 5% Topical"), "minoxidil-5-topical");
        assert_eq!(slugify("  Hair -- Kit  "), "hair-kit");
        assert_eq!(slugify("UPPER case"), "upper-case");
        assert_eq!(slugify("!!!"), "product");
        assert_eq!(slugify(""), "product");
    }

    #[test]
    fn form_url_uses_https_in_production() {
        let id = Uuid::new_v4();
        let url = build_form_url(&config("production", "careflow.health"), "oak-clinic", "minoxidil-5", id);
        assert_eq!(
            url,
            format!("https://oak-clinic.careflow.health/my-products/minoxidil-5/{id}")
        );
    }

    #[test]
    fn form_url_uses_http_elsewhere() {
        let id = Uuid::new_v4();
        let url = build_form_url(&config("development", "localhost:3000"), "demo", "kit", id);
        assert_eq!(url, format!("http://demo.localhost:3000/my-products/kit/{id}"));
    }

    #[test]
    fn republishing_keeps_the_first_minted_url() {
        let first = "https://oak-demo.careflow.health/my-products/kit/abc".to_string();
        assert_eq!(effective_url(None, first.clone()), first);

        // A second publish may mint a different URL (slug backfill is
        // timestamped); the stored one always wins.
        let second = "https://oak-demo.careflow.health/my-products/kit-1700000000/abc".to_string();
        assert_eq!(effective_url(Some(first.as_str()), second.clone()), first);

        // An empty stored URL counts as never published.
        assert_eq!(effective_url(Some(""), second.clone()), second);
    }
}
