use sqlx::PgPool;

/// Provision a new per-clinic PostgreSQL schema with all required tables.
/// Called when a new clinic is created and re-run for every active clinic at
/// startup, so every statement must be idempotent.
pub async fn provision_clinic_schema(pool: &PgPool, slug: &str) -> anyhow::Result<()> {
    let schema = schema_name(slug);

    // --- Create schema ---
    sqlx::raw_sql(&format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\""))
        .execute(pool)
        .await?;

    // --- Enum: template_section_type ---
    sqlx::raw_sql(&format!(
        "DO $$ BEGIN
           IF NOT EXISTS (
             SELECT 1 FROM pg_type t
             JOIN pg_namespace n ON n.oid = t.typnamespace
             WHERE t.typname = 'template_section_type' AND n.nspname = '{schema}'
           ) THEN
             CREATE TYPE \"{schema}\".template_section_type AS ENUM
               ('personalization','account','doctor');
           END IF;
         END $$"
    ))
    .execute(pool)
    .await?;

    // --- Enum: layout_template ---
    sqlx::raw_sql(&format!(
        "DO $$ BEGIN
           IF NOT EXISTS (
             SELECT 1 FROM pg_type t
             JOIN pg_namespace n ON n.oid = t.typnamespace
             WHERE t.typname = 'layout_template' AND n.nspname = '{schema}'
           ) THEN
             CREATE TYPE \"{schema}\".layout_template AS ENUM
               ('layout_a','layout_b','layout_c');
           END IF;
         END $$"
    ))
    .execute(pool)
    .await?;

    // --- Products (catalog rows; managed elsewhere, the form engine only
    // reads them and backfills slug on first publish) ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".products (
            id          UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            name        VARCHAR(255) NOT NULL,
            slug        VARCHAR(255) UNIQUE,
            category    VARCHAR(128),
            image_url   TEXT,
            is_active   BOOLEAN NOT NULL DEFAULT TRUE,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Form structures (ordered section lists, JSONB) ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".form_structures (
            id          UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            name        VARCHAR(128) NOT NULL,
            description TEXT,
            sections    JSONB NOT NULL DEFAULT '[]',
            is_default  BOOLEAN NOT NULL DEFAULT FALSE,
            version     INTEGER NOT NULL DEFAULT 1,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // At most one default structure per clinic
    sqlx::raw_sql(&format!(
        r#"CREATE UNIQUE INDEX IF NOT EXISTS form_structures_one_default
           ON "{schema}".form_structures (is_default) WHERE is_default"#
    ))
    .execute(pool)
    .await?;

    // --- Form section templates (question schemas, versioned, soft-deleted) ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".form_templates (
            id           UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            name         VARCHAR(255) NOT NULL,
            description  TEXT,
            section_type "{schema}".template_section_type NOT NULL,
            category     VARCHAR(128),
            treatment_id UUID REFERENCES "{schema}".products(id) ON DELETE CASCADE,
            schema       JSONB NOT NULL DEFAULT '{{}}',
            version      INTEGER NOT NULL DEFAULT 1,
            is_default   BOOLEAN NOT NULL DEFAULT FALSE,
            published_at TIMESTAMPTZ,
            is_active    BOOLEAN NOT NULL DEFAULT TRUE,
            created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    sqlx::raw_sql(&format!(
        r#"CREATE INDEX IF NOT EXISTS idx_form_templates_section_type
           ON "{schema}".form_templates (section_type)"#
    ))
    .execute(pool)
    .await?;

    sqlx::raw_sql(&format!(
        r#"CREATE INDEX IF NOT EXISTS idx_form_templates_treatment
           ON "{schema}".form_templates (treatment_id) WHERE treatment_id IS NOT NULL"#
    ))
    .execute(pool)
    .await?;

    // One seeded default template per section type (conflict target for the
    // idempotent seed inserts below)
    sqlx::raw_sql(&format!(
        r#"CREATE UNIQUE INDEX IF NOT EXISTS form_templates_one_default_per_type
           ON "{schema}".form_templates (section_type) WHERE is_default"#
    ))
    .execute(pool)
    .await?;

    // --- Product form assignments (one per product, slots reference templates) ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".product_form_assignments (
            id                          UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            treatment_id                UUID UNIQUE NOT NULL REFERENCES "{schema}".products(id) ON DELETE CASCADE,
            doctor_template_id          UUID REFERENCES "{schema}".form_templates(id),
            personalization_template_id UUID REFERENCES "{schema}".form_templates(id),
            account_template_id         UUID REFERENCES "{schema}".form_templates(id),
            layout_template             "{schema}".layout_template NOT NULL DEFAULT 'layout_a',
            theme_id                    UUID,
            locked_until                TIMESTAMPTZ,
            published_url               TEXT,
            last_published_at           TIMESTAMPTZ,
            created_at                  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at                  TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- updated_at trigger function ---
    sqlx::raw_sql(&format!(
        r#"CREATE OR REPLACE FUNCTION "{schema}".update_updated_at()
           RETURNS TRIGGER AS $fn$
           BEGIN NEW.updated_at = NOW(); RETURN NEW; END;
           $fn$ LANGUAGE plpgsql"#
    ))
    .execute(pool)
    .await?;

    // --- Triggers (one per table, idempotent via DROP IF EXISTS + CREATE) ---
    for table in &["products", "form_structures", "form_templates", "product_form_assignments"] {
        let trigger = format!("{table}_updated_at");
        sqlx::raw_sql(&format!(
            r#"DROP TRIGGER IF EXISTS "{trigger}" ON "{schema}"."{table}";
               CREATE TRIGGER "{trigger}"
               BEFORE UPDATE ON "{schema}"."{table}"
               FOR EACH ROW EXECUTE FUNCTION "{schema}".update_updated_at()"#
        ))
        .execute(pool)
        .await?;
    }

    seed_default_templates(pool, &schema).await?;

    tracing::info!("Provisioned clinic schema: {schema}");
    Ok(())
}

/// Seed one default template per section type. These fill the untargeted
/// assignment slots on a product's first import.
async fn seed_default_templates(pool: &PgPool, schema: &str) -> anyhow::Result<()> {
    let defaults = [
        (
            "personalization",
            "Default personalization questions",
            serde_json::json!({
                "steps": [{
                    "id": "step-personalization-default",
                    "number": 1,
                    "title": "About you",
                    "questions": [
                        { "id": "q-goals", "type": "text", "label": "What are you hoping to achieve?" },
                        { "id": "q-history", "type": "choice", "label": "Have you used this treatment before?", "options": ["Yes", "No"] }
                    ]
                }]
            }),
        ),
        (
            "account",
            "Default account questions",
            serde_json::json!({
                "steps": [{
                    "id": "step-account-default",
                    "number": 1,
                    "title": "Create your account",
                    "questions": [
                        { "id": "q-name", "type": "text", "label": "Full name" },
                        { "id": "q-email", "type": "email", "label": "Email address" },
                        { "id": "q-dob", "type": "date", "label": "Date of birth" }
                    ]
                }]
            }),
        ),
        (
            "doctor",
            "Default doctor questions",
            serde_json::json!({
                "steps": [{
                    "id": "step-doctor-default",
                    "number": 1,
                    "title": "Medical history",
                    "questions": [
                        { "id": "q-conditions", "type": "multiselect", "label": "Do any of these conditions apply to you?" },
                        { "id": "q-medication", "type": "text", "label": "List any medication you currently take" }
                    ]
                }]
            }),
        ),
    ];

    for (section_type, name, schema_json) in defaults {
        sqlx::query(&format!(
            r#"INSERT INTO "{schema}".form_templates (name, section_type, schema, is_default)
               VALUES ($1, $2::"{schema}".template_section_type, $3, TRUE)
               ON CONFLICT (section_type) WHERE is_default DO NOTHING"#
        ))
        .bind(name)
        .bind(section_type)
        .bind(schema_json)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Returns the PostgreSQL schema name for a given clinic slug.
pub fn schema_name(slug: &str) -> String {
    format!("clinic_{}", slug.to_lowercase().replace('-', "_"))
}
