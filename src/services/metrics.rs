use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Gauge, GaugeVec};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::db::tenant::schema_name;
use crate::models::assignment::ImportMode;

lazy_static! {
    // ── Event counters (increment on each event) ────────────────────────────
    pub static ref IMPORTS_COUNTER: CounterVec = register_counter_vec!(
        "api_template_imports_total",
        "Template imports per tenant and merge mode",
        &["tenant", "mode"]
    ).unwrap();

    pub static ref PUBLISHES_COUNTER: CounterVec = register_counter_vec!(
        "api_form_publishes_total",
        "Form publishes per tenant",
        &["tenant"]
    ).unwrap();

    pub static ref STRUCTURE_SAVES_COUNTER: CounterVec = register_counter_vec!(
        "api_structure_saves_total",
        "Structure saves per tenant",
        &["tenant"]
    ).unwrap();

    // ── Business metrics ────────────────────────────────────────────────────
    pub static ref TEMPLATES_GAUGE: GaugeVec = register_gauge_vec!(
        "clinic_form_templates_active_total",
        "Active templates per tenant and section type",
        &["tenant", "section_type"]
    ).unwrap();

    pub static ref ASSIGNMENTS_GAUGE: GaugeVec = register_gauge_vec!(
        "clinic_form_assignments_total",
        "Product form assignments per tenant",
        &["tenant"]
    ).unwrap();

    pub static ref PUBLISHED_FORMS_GAUGE: GaugeVec = register_gauge_vec!(
        "clinic_forms_published_total",
        "Assignments with a published URL per tenant",
        &["tenant"]
    ).unwrap();

    pub static ref CLINICS_GAUGE: Gauge = register_gauge!(
        "clinic_tenants_active_total",
        "Number of active clinics"
    ).unwrap();
}

pub fn record_import(tenant: &str, mode: ImportMode) {
    IMPORTS_COUNTER
        .with_label_values(&[tenant, &mode.to_string()])
        .inc();
}

pub fn record_publish(tenant: &str) {
    PUBLISHES_COUNTER.with_label_values(&[tenant]).inc();
}

pub fn record_structure_save(tenant: &str) {
    STRUCTURE_SAVES_COUNTER.with_label_values(&[tenant]).inc();
}

/// Spawn the background metrics collector (refreshes every 5 minutes).
pub fn start(pool: PgPool) {
    tokio::spawn(async move {
        // Initial collection on startup
        if let Err(e) = collect(&pool).await {
            warn!("Metrics: initial collection failed: {}", e);
        }
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(300)).await;
            if let Err(e) = collect(&pool).await {
                warn!("Metrics: collection failed: {}", e);
            }
        }
    });
}

async fn collect(pool: &PgPool) -> anyhow::Result<()> {
    let clinics: Vec<String> =
        sqlx::query_scalar("SELECT slug FROM public.clinics WHERE is_active = TRUE")
            .fetch_all(pool)
            .await?;

    CLINICS_GAUGE.set(clinics.len() as f64);

    for slug in &clinics {
        let schema = schema_name(slug);

        // Active templates by section type
        let template_counts: Vec<(String, i64)> = sqlx::query_as(&format!(
            r#"SELECT section_type::TEXT, COUNT(*)::BIGINT FROM "{schema}".form_templates
               WHERE is_active = TRUE GROUP BY section_type"#
        ))
        .fetch_all(pool)
        .await
        .unwrap_or_default();

        for (section_type, count) in template_counts {
            TEMPLATES_GAUGE
                .with_label_values(&[slug, &section_type])
                .set(count as f64);
        }

        // Assignments
        let assignments: i64 = sqlx::query_scalar(&format!(
            r#"SELECT COUNT(*)::BIGINT FROM "{schema}".product_form_assignments"#
        ))
        .fetch_one(pool)
        .await
        .unwrap_or(0);
        ASSIGNMENTS_GAUGE.with_label_values(&[slug]).set(assignments as f64);

        // Published forms
        let published: i64 = sqlx::query_scalar(&format!(
            r#"SELECT COUNT(*)::BIGINT FROM "{schema}".product_form_assignments
               WHERE published_url IS NOT NULL"#
        ))
        .fetch_one(pool)
        .await
        .unwrap_or(0);
        PUBLISHED_FORMS_GAUGE.with_label_values(&[slug]).set(published as f64);
    }

    info!("Metrics: collected for {} clinic(s)", clinics.len());
    Ok(())
}
