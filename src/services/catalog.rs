use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    error::ApiError,
    models::product::{PageQuery, Pagination, Product, ProductPage},
};

/// Read-side adapter over the commerce catalog. Product CRUD lives in the
/// commerce service; the form engine only pages, reads and backfills slugs.
pub struct CatalogService;

impl CatalogService {
    pub async fn list_products(
        pool: &PgPool,
        tenant: &str,
        query: &PageQuery,
    ) -> Result<ProductPage, ApiError> {
        let schema = schema_name(tenant);
        let per_page = query.per_page.unwrap_or(25).clamp(1, 100);
        let page = query.page.unwrap_or(1).max(1);
        let offset = (page - 1) * per_page;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {schema}.products"
        ))
        .fetch_one(pool)
        .await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT * FROM {schema}.products
             ORDER BY name, id
             LIMIT $1 OFFSET $2"
        ))
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(ProductPage {
            products,
            pagination: Pagination {
                total,
                page,
                per_page,
                total_pages: (total + per_page - 1) / per_page,
            },
        })
    }

    pub async fn get_product(
        pool: &PgPool,
        tenant: &str,
        id: Uuid,
    ) -> Result<Product, ApiError> {
        let schema = schema_name(tenant);
        sqlx::query_as::<_, Product>(&format!(
            "SELECT * FROM {schema}.products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("product"))
    }

    /// One-time slug heal used by publish when the catalog row has none.
    pub async fn set_product_slug(
        pool: &PgPool,
        tenant: &str,
        id: Uuid,
        slug: &str,
    ) -> Result<Product, ApiError> {
        let schema = schema_name(tenant);
        sqlx::query_as::<_, Product>(&format!(
            "UPDATE {schema}.products SET slug = $1 WHERE id = $2 RETURNING *"
        ))
        .bind(slug)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("product"))
    }

    /// The clinic's patient-facing subdomain, if configured.
    pub async fn clinic_public_slug(
        pool: &PgPool,
        tenant: &str,
    ) -> Result<Option<String>, ApiError> {
        let slug: Option<Option<String>> = sqlx::query_scalar(
            "SELECT public_slug FROM public.clinics WHERE slug = $1",
        )
        .bind(tenant)
        .fetch_optional(pool)
        .await?;
        Ok(slug.flatten())
    }
}
