use sqlx::{postgres::PgPoolOptions, PgPool};

/// Tables are created idempotently; rows written before the organization
/// column existed carry `organization IS NULL` and `schema_version = 1`.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS company_profiles (
        company_id TEXT PRIMARY KEY,
        profile JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS organization_classifications (
        organization TEXT PRIMARY KEY,
        industries JSONB NOT NULL DEFAULT '[]'::jsonb
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feedbacks (
        id UUID PRIMARY KEY,
        company_id TEXT NOT NULL,
        feedback_comment TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_feedbacks_company ON feedbacks (company_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS recommendations (
        company_id TEXT NOT NULL,
        tender_key TEXT NOT NULL,
        tender_name TEXT NOT NULL,
        organization TEXT,
        name_match TEXT NOT NULL,
        name_reason TEXT NOT NULL,
        industry_match TEXT NOT NULL,
        industry_reason TEXT NOT NULL,
        schema_version SMALLINT NOT NULL DEFAULT 2,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (company_id, tender_key)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_recommendations_filter
        ON recommendations (company_id, name_match, industry_match)
    "#,
];

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Database schema ready");
        Ok(())
    }
}
