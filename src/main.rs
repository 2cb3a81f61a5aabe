use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, patch, post, put},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use careflow_api::config::Config;
use careflow_api::middleware::auth::JwtSecret;
use careflow_api::{db, routes, services, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let config = Arc::new(config);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    db::migrate_all_existing_clinics(&pool).await?;
    info!("Database connected and migrations applied");

    services::metrics::start(pool.clone());

    let state = AppState {
        db: pool,
        config: config.clone(),
    };

    // Build CORS: allow the app base domain and its subdomains (clinic subdomains).
    // In development (localhost), all origins are allowed.
    let base_url = config.app_base_url.clone();
    let cors_origin = {
        let base = base_url.clone();
        AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            let o = match origin.to_str() {
                Ok(s) => s,
                Err(_) => return false,
            };
            // Always allow localhost / 127.0.0.1 for local development
            if o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") {
                return true;
            }
            // Exact match of app_base_url
            if o == base {
                return true;
            }
            // Subdomain match: extract domain portion from base URL and allow *.domain
            if let Some(idx) = base.find("://") {
                let after_scheme = &base[idx + 3..];
                let domain = after_scheme.split('/').next().unwrap_or(after_scheme);
                let domain_clean = domain.split(':').next().unwrap_or(domain);
                if o.contains(&format!(".{domain_clean}")) {
                    return true;
                }
            }
            false
        })
    };

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static("x-clinic"),
            header::HeaderName::from_static("x-super-admin-key"),
        ]))
        .allow_origin(cors_origin);

    let jwt_secret = JwtSecret(config.jwt_secret.clone());

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        // Form structures (global section flow per clinic)
        .route(
            "/form-structures",
            get(routes::structures::list_structures).post(routes::structures::create_structure),
        )
        .route(
            "/form-structures/{id}",
            put(routes::structures::save_structure).delete(routes::structures::delete_structure),
        )
        .route(
            "/form-structures/{id}/reorder",
            post(routes::structures::reorder_structure_sections),
        )
        // Template library
        .route(
            "/form-templates",
            get(routes::templates::list_templates).post(routes::templates::create_template),
        )
        .route(
            "/form-templates/{id}",
            get(routes::templates::get_template).delete(routes::templates::deactivate_template),
        )
        .route(
            "/form-templates/{id}/schema",
            patch(routes::templates::update_template_schema),
        )
        // Product forms (assignments)
        .route("/product-forms", get(routes::product_forms::list_product_forms))
        .route(
            "/product-forms/{treatment_id}/state",
            get(routes::product_forms::get_form_state),
        )
        .route(
            "/product-forms/{treatment_id}/import",
            post(routes::product_forms::import_template),
        )
        .route(
            "/product-forms/{treatment_id}/detach",
            post(routes::product_forms::detach_slot),
        )
        .route(
            "/product-forms/{treatment_id}/publish",
            post(routes::product_forms::publish_form),
        )
        .route(
            "/product-forms/{treatment_id}/lock",
            post(routes::product_forms::lock_form),
        )
        // Platform admin
        .route(
            "/admin/clinics",
            get(routes::clinics::list_clinics).post(routes::clinics::create_clinic),
        )
        .route("/admin/clinics/{slug}", put(routes::clinics::update_clinic))
        // Observability
        .route("/metrics", get(routes::metrics::metrics_handler))
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // JSON-only API; schemas stay small
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("careflow form API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
