//! Demo clinic seed script
//!
//! Seeds a demo clinic with realistic telehealth form data:
//! - Clinic: Oak Wellness Clinic (Demo), public slug `oak-demo`
//! - 6 products across hair, skin and sleep categories
//! - Default structure (product, category, account, checkout sections)
//! - 5 library templates with multi-step question schemas
//! - 1 product wired end to end: import into all three slots, then publish
//!
//! Usage:
//!   DATABASE_URL=... JWT_SECRET=... ./seed-demo [--clinic SLUG]
//!
//! Environment variables:
//!   DATABASE_URL — PostgreSQL connection string (required)
//!   JWT_SECRET   — required by the shared config loader (any value works here)
//!   FORM_DOMAIN  — host suffix for the published URL (default: localhost:3000)
//!   ENVIRONMENT  — "production" publishes https URLs (default: development)

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use std::env;
use uuid::Uuid;

use careflow_api::config::Config;
use careflow_api::db::tenant::{provision_clinic_schema, schema_name};
use careflow_api::middleware::tenant::is_valid_slug;
use careflow_api::models::assignment::{ImportMode, ImportTemplateRequest};
use careflow_api::models::template::{CreateTemplateRequest, TemplateSectionType};
use careflow_api::services::import::ImportService;
use careflow_api::services::publish::PublishService;
use careflow_api::services::structures::StructureService;
use careflow_api::services::templates::TemplateService;

#[derive(Parser)]
#[command(name = "seed-demo", about = "Seed a demo clinic with form data")]
struct Args {
    /// Clinic slug to seed (dropped and recreated)
    #[arg(long, default_value = "demo")]
    clinic: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let slug = args.clinic;
    // The slug is format!-interpolated into schema DDL below.
    if !is_valid_slug(&slug) {
        bail!("Invalid clinic slug '{slug}': 2-63 lowercase letters, digits and hyphens");
    }
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL required")?;

    println!("=== Seed Demo Clinic ===");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    let schema = schema_name(&slug); // "clinic_demo"

    // 1. Clean existing demo clinic
    println!("Cleaning existing demo clinic...");
    sqlx::raw_sql(&format!("DROP SCHEMA IF EXISTS \"{schema}\" CASCADE"))
        .execute(&pool)
        .await
        .context("Failed to drop demo schema")?;

    sqlx::query("DELETE FROM public.clinics WHERE slug = $1")
        .bind(&slug)
        .execute(&pool)
        .await
        .context("Failed to delete demo clinic")?;

    // 2. Create clinic record (public_slug is required for publishing)
    println!("Creating clinic record...");
    sqlx::query(
        "INSERT INTO public.clinics (slug, name, public_slug, contact_email, is_active)
         VALUES ($1, 'Oak Wellness Clinic (Demo)', $2, 'hello@oakwellness.example', TRUE)",
    )
    .bind(&slug)
    .bind(format!("oak-{slug}"))
    .execute(&pool)
    .await
    .context("Failed to insert clinic")?;

    // 3. Provision clinic schema (tables, enums, triggers, default templates)
    println!("Provisioning clinic schema...");
    provision_clinic_schema(&pool, &slug)
        .await
        .context("Failed to provision clinic schema")?;

    // 4. Insert products
    println!("Inserting products...");

    // (id, name, category, image_url)
    let products: Vec<(Uuid, &str, &str, &str)> = vec![
        (Uuid::new_v4(), "Minoxidil 5% Topical Solution", "hair",  "https://cdn.careflow.example/products/minoxidil.jpg"),
        (Uuid::new_v4(), "Finasteride 1mg",               "hair",  "https://cdn.careflow.example/products/finasteride.jpg"),
        (Uuid::new_v4(), "Hair Growth Complete Kit",      "hair",  "https://cdn.careflow.example/products/hair-kit.jpg"),
        (Uuid::new_v4(), "Tretinoin Cream 0.025%",        "skin",  "https://cdn.careflow.example/products/tretinoin.jpg"),
        (Uuid::new_v4(), "Acne Control Duo",              "skin",  "https://cdn.careflow.example/products/acne-duo.jpg"),
        (Uuid::new_v4(), "Melatonin Sleep Gummies",       "sleep", "https://cdn.careflow.example/products/melatonin.jpg"),
    ];

    for (id, name, category, image_url) in &products {
        sqlx::query(&format!(
            r#"INSERT INTO "{schema}".products (id, name, category, image_url)
               VALUES ($1, $2, $3, $4)"#
        ))
        .bind(id)
        .bind(name)
        .bind(category)
        .bind(image_url)
        .execute(&pool)
        .await
        .with_context(|| format!("Failed to insert product {name}"))?;
    }

    // 5. Create the default form structure (lazy-seeded on first list)
    println!("Creating default form structure...");
    let structures = StructureService::list(&pool, &slug)
        .await
        .context("Failed to seed default structure")?;
    println!(
        "  {} structure(s), default: {}",
        structures.len(),
        structures
            .iter()
            .find(|s| s.is_default)
            .map(|s| s.name.as_str())
            .unwrap_or("none")
    );

    // 6. Insert library templates
    println!("Inserting library templates...");
    let hair_personalization = seed_template(
        &pool,
        &slug,
        "Hair Loss Intake",
        TemplateSectionType::Personalization,
        Some("hair"),
        json!({
            "steps": [
                {
                    "id": "step-hair-goals",
                    "number": 1,
                    "title": "Your hair goals",
                    "questions": [
                        { "id": "q-pattern", "type": "choice", "label": "Where are you noticing hair loss?",
                          "options": ["Hairline", "Crown", "Overall thinning"] },
                        { "id": "q-duration", "type": "choice", "label": "How long has this been going on?",
                          "options": ["Under 6 months", "6-24 months", "Over 2 years"] }
                    ]
                },
                {
                    "id": "step-hair-photos",
                    "number": 2,
                    "title": "Photos",
                    "questions": [
                        { "id": "q-photo-top", "type": "photo", "label": "Top of head" },
                        { "id": "q-photo-front", "type": "photo", "label": "Hairline" }
                    ]
                }
            ]
        }),
    )
    .await?;

    seed_template(
        &pool,
        &slug,
        "Skin Assessment",
        TemplateSectionType::Personalization,
        Some("skin"),
        json!({
            "steps": [
                {
                    "id": "step-skin-type",
                    "number": 1,
                    "title": "Your skin",
                    "questions": [
                        { "id": "q-skin-type", "type": "choice", "label": "How would you describe your skin?",
                          "options": ["Dry", "Oily", "Combination", "Sensitive"] },
                        { "id": "q-concerns", "type": "multiselect", "label": "What are your main concerns?",
                          "options": ["Acne", "Fine lines", "Dark spots", "Redness"] }
                    ]
                }
            ]
        }),
    )
    .await?;

    let account_extended = seed_template(
        &pool,
        &slug,
        "Extended Account Setup",
        TemplateSectionType::Account,
        None,
        json!({
            "steps": [
                {
                    "id": "step-account-details",
                    "number": 1,
                    "title": "Create your account",
                    "questions": [
                        { "id": "q-name", "type": "text", "label": "Full name" },
                        { "id": "q-email", "type": "email", "label": "Email address" },
                        { "id": "q-phone", "type": "phone", "label": "Mobile number" },
                        { "id": "q-dob", "type": "date", "label": "Date of birth" }
                    ]
                },
                {
                    "id": "step-account-shipping",
                    "number": 2,
                    "title": "Shipping address",
                    "questions": [
                        { "id": "q-address", "type": "address", "label": "Where should we ship your order?" }
                    ]
                }
            ]
        }),
    )
    .await?;

    let doctor_hair = seed_template(
        &pool,
        &slug,
        "Hair Loss Medical Review",
        TemplateSectionType::Doctor,
        Some("hair"),
        json!({
            "steps": [
                {
                    "id": "step-doctor-history",
                    "number": 1,
                    "title": "Medical history",
                    "questions": [
                        { "id": "q-conditions", "type": "multiselect", "label": "Do any of these apply?",
                          "options": ["Heart disease", "Low blood pressure", "Scalp conditions", "None"] },
                        { "id": "q-medication", "type": "text", "label": "Current medication" }
                    ]
                },
                {
                    "id": "step-doctor-consent",
                    "number": 2,
                    "title": "Consent",
                    "questions": [
                        { "id": "q-consent", "type": "checkbox", "label": "I consent to an asynchronous review by a licensed physician" }
                    ]
                }
            ]
        }),
    )
    .await?;

    seed_template(
        &pool,
        &slug,
        "Sleep Questionnaire",
        TemplateSectionType::Personalization,
        Some("sleep"),
        json!({
            "steps": [
                {
                    "id": "step-sleep-habits",
                    "number": 1,
                    "title": "Your sleep",
                    "questions": [
                        { "id": "q-hours", "type": "choice", "label": "How many hours do you sleep on average?",
                          "options": ["Under 5", "5-7", "7-9", "Over 9"] },
                        { "id": "q-trouble", "type": "multiselect", "label": "What do you struggle with?",
                          "options": ["Falling asleep", "Staying asleep", "Waking early"] }
                    ]
                }
            ]
        }),
    )
    .await?;

    // 7. Wire one product end to end: import all three slots, then publish
    let (minoxidil_id, minoxidil_name, ..) = products[0];
    println!("Importing templates for '{minoxidil_name}'...");

    let imports = [
        (hair_personalization, TemplateSectionType::Personalization),
        (account_extended, TemplateSectionType::Account),
        (doctor_hair, TemplateSectionType::Doctor),
    ];
    for (template_id, section_type) in imports {
        ImportService::import(
            &pool,
            &slug,
            minoxidil_id,
            &ImportTemplateRequest {
                template_id,
                section_type,
                mode: ImportMode::Replace,
                allow_inactive: false,
            },
        )
        .await
        .with_context(|| format!("Failed to import {section_type} template"))?;
    }

    println!("Publishing form for '{minoxidil_name}'...");
    let config = Config::from_env().context("Failed to load config for publish")?;
    let published = PublishService::publish(&pool, &config, &slug, minoxidil_id)
        .await
        .context("Failed to publish demo form")?;

    // 8. Summary
    println!();
    println!("=== Demo clinic seeded ===");
    println!("  Clinic:     {slug} (schema {schema})");
    println!("  Products:   {}", products.len());
    println!("  Templates:  5 library + 3 defaults + 3 product-scoped");
    println!(
        "  Published:  {}",
        published.published_url.as_deref().unwrap_or("-")
    );

    Ok(())
}

/// Insert one library template, returning its id.
async fn seed_template(
    pool: &sqlx::PgPool,
    slug: &str,
    name: &str,
    section_type: TemplateSectionType,
    category: Option<&str>,
    schema: serde_json::Value,
) -> Result<Uuid> {
    let template = TemplateService::create(
        pool,
        slug,
        &CreateTemplateRequest {
            name: name.to_string(),
            description: None,
            section_type,
            category: category.map(str::to_string),
            treatment_id: None,
            schema: Some(schema),
            published_at: None,
        },
    )
    .await
    .with_context(|| format!("Failed to insert template '{name}'"))?;
    println!("  {} ({section_type})", template.name);
    Ok(template.id)
}
