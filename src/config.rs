use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub super_admin_key: String,
    pub app_base_url: String,
    /// "development" or "production". Selects the scheme of published form
    /// URLs (http vs https).
    pub environment: String,
    /// Host suffix for published patient-facing forms, e.g. "careflow.health"
    /// yields https://<clinic>.careflow.health/... URLs.
    pub form_domain: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            super_admin_key: env::var("SUPER_ADMIN_KEY")
                .unwrap_or_else(|_| "change_this_super_admin_key".into()),
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost".into()),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            form_domain: env::var("FORM_DOMAIN").unwrap_or_else(|_| "localhost:3000".into()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}
