use crate::errors::{AppError, ResultExt};
use crate::models::{
    CompanyProfile, Feedback, IndustryClassification, MatchLevel, OrganizationClassification,
    StoredProfile, TenderKey, Verdict, VerdictRecord, VERDICT_SCHEMA_VERSION,
};
use crate::stores::{FeedbackStore, IndustryIndex, ProfileStore, Stores, VerdictCache};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use uuid::Uuid;

/// Company profiles stored as JSONB documents.
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    company_id: String,
    profile: Json<CompanyProfile>,
    created_at: DateTime<Utc>,
}

impl From<ProfileRow> for StoredProfile {
    fn from(row: ProfileRow) -> Self {
        StoredProfile {
            company_name: row.company_id,
            profile: row.profile.0,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn fetch(&self, company_id: &str) -> Result<Option<StoredProfile>, AppError> {
        let row: Option<ProfileRow> = sqlx::query_as(
            "SELECT company_id, profile, created_at FROM company_profiles WHERE company_id = $1",
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to load profile for {}", company_id))?;

        Ok(row.map(StoredProfile::from))
    }

    async fn upsert(
        &self,
        company_id: &str,
        profile: &CompanyProfile,
    ) -> Result<StoredProfile, AppError> {
        let row: ProfileRow = sqlx::query_as(
            r#"
            INSERT INTO company_profiles (company_id, profile, created_at)
            VALUES ($1, $2, now())
            ON CONFLICT (company_id) DO UPDATE SET
                profile = EXCLUDED.profile,
                created_at = EXCLUDED.created_at
            RETURNING company_id, profile, created_at
            "#,
        )
        .bind(company_id)
        .bind(Json(profile.clone()))
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to store profile for {}", company_id))?;

        tracing::info!("Company profile saved: '{}'", company_id);
        Ok(row.into())
    }
}

/// Organization classifications written by the industry pipeline.
pub struct PgIndustryIndex {
    pool: PgPool,
}

impl PgIndustryIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IndustryIndex for PgIndustryIndex {
    async fn list(&self) -> Result<Vec<OrganizationClassification>, AppError> {
        let rows: Vec<(String, Json<Vec<IndustryClassification>>)> = sqlx::query_as(
            "SELECT organization, industries FROM organization_classifications ORDER BY organization",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load organization classifications")?;

        Ok(rows
            .into_iter()
            .map(|(organization, industries)| OrganizationClassification {
                organization,
                industries: industries.0,
            })
            .collect())
    }

    async fn upsert(&self, classification: &OrganizationClassification) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO organization_classifications (organization, industries)
            VALUES ($1, $2)
            ON CONFLICT (organization) DO UPDATE SET industries = EXCLUDED.industries
            "#,
        )
        .bind(&classification.organization)
        .bind(Json(classification.industries.clone()))
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "Failed to store classification for {}",
                classification.organization
            )
        })?;

        tracing::info!(
            "Saved {} industries for '{}'",
            classification.industries.len(),
            classification.organization
        );
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct FeedbackRow {
    id: Uuid,
    company_id: String,
    feedback_comment: String,
    created_at: DateTime<Utc>,
}

impl From<FeedbackRow> for Feedback {
    fn from(row: FeedbackRow) -> Self {
        Feedback {
            id: row.id,
            company_id: row.company_id,
            feedback_comment: row.feedback_comment,
            created_at: row.created_at,
        }
    }
}

pub struct PgFeedbackStore {
    pool: PgPool,
}

impl PgFeedbackStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeedbackStore for PgFeedbackStore {
    async fn list(&self, company_id: &str) -> Result<Vec<Feedback>, AppError> {
        let rows: Vec<FeedbackRow> = sqlx::query_as(
            r#"
            SELECT id, company_id, feedback_comment, created_at
            FROM feedbacks
            WHERE company_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to list feedback for {}", company_id))?;

        Ok(rows.into_iter().map(Feedback::from).collect())
    }

    async fn append(&self, company_id: &str, comment: &str) -> Result<Feedback, AppError> {
        let row: FeedbackRow = sqlx::query_as(
            r#"
            INSERT INTO feedbacks (id, company_id, feedback_comment, created_at)
            VALUES ($1, $2, $3, now())
            RETURNING id, company_id, feedback_comment, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(comment)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to store feedback for {}", company_id))?;

        tracing::info!("Stored feedback {} for company '{}'", row.id, company_id);
        Ok(row.into())
    }
}

#[derive(Debug, FromRow)]
struct VerdictRow {
    company_id: String,
    tender_key: String,
    tender_name: String,
    organization: Option<String>,
    name_match: String,
    name_reason: String,
    industry_match: String,
    industry_reason: String,
    schema_version: i16,
    created_at: DateTime<Utc>,
}

impl TryFrom<VerdictRow> for VerdictRecord {
    type Error = AppError;

    fn try_from(row: VerdictRow) -> Result<Self, Self::Error> {
        let parse = |raw: &str| {
            raw.parse::<MatchLevel>().map_err(|e| {
                AppError::StoreError(format!(
                    "Stored verdict for '{}' has invalid match level: {}",
                    row.tender_name, e
                ))
            })
        };
        let name_match = parse(&row.name_match)?;
        let industry_match = parse(&row.industry_match)?;

        Ok(VerdictRecord {
            company_id: row.company_id,
            tender_key: TenderKey::from_stored(row.tender_key),
            tender_name: row.tender_name,
            organization: row.organization,
            name_match,
            name_reason: row.name_reason,
            industry_match,
            industry_reason: row.industry_reason,
            schema_version: row.schema_version,
            created_at: row.created_at,
        })
    }
}

/// The `recommendations` table.
pub struct PgVerdictCache {
    pool: PgPool,
}

impl PgVerdictCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VerdictCache for PgVerdictCache {
    async fn upsert(&self, company_id: &str, verdict: &Verdict) -> Result<(), AppError> {
        let key = verdict.key();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start verdict transaction")?;

        // Legacy rows were keyed by name only; the keyed row below supersedes them.
        let retired = sqlx::query(
            r#"
            DELETE FROM recommendations
            WHERE company_id = $1 AND tender_name = $2 AND organization IS NULL
            "#,
        )
        .bind(company_id)
        .bind(&verdict.tender_name)
        .execute(&mut *tx)
        .await
        .context("Failed to retire legacy verdict")?
        .rows_affected();

        if retired > 0 {
            tracing::debug!(
                "Retired {} legacy verdict(s) for '{}' (company '{}')",
                retired,
                verdict.tender_name,
                company_id
            );
        }

        sqlx::query(
            r#"
            INSERT INTO recommendations (
                company_id, tender_key, tender_name, organization,
                name_match, name_reason, industry_match, industry_reason,
                schema_version, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (company_id, tender_key) DO UPDATE SET
                tender_name = EXCLUDED.tender_name,
                organization = EXCLUDED.organization,
                name_match = EXCLUDED.name_match,
                name_reason = EXCLUDED.name_reason,
                industry_match = EXCLUDED.industry_match,
                industry_reason = EXCLUDED.industry_reason,
                schema_version = EXCLUDED.schema_version,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(company_id)
        .bind(key.as_str())
        .bind(&verdict.tender_name)
        .bind(&verdict.organization)
        .bind(verdict.name_match.as_str())
        .bind(&verdict.name_reason)
        .bind(verdict.industry_match.as_str())
        .bind(&verdict.industry_reason)
        .bind(VERDICT_SCHEMA_VERSION)
        .bind(verdict.created_at)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to upsert verdict for '{}'", verdict.tender_name))?;

        tx.commit()
            .await
            .context("Failed to commit verdict transaction")?;
        Ok(())
    }

    async fn query(
        &self,
        company_id: &str,
        name_match: MatchLevel,
        industry_match: MatchLevel,
    ) -> Result<Vec<VerdictRecord>, AppError> {
        let rows: Vec<VerdictRow> = sqlx::query_as(
            r#"
            SELECT company_id, tender_key, tender_name, organization,
                   name_match, name_reason, industry_match, industry_reason,
                   schema_version, created_at
            FROM recommendations
            WHERE company_id = $1 AND name_match = $2 AND industry_match = $3
            ORDER BY tender_name, tender_key
            "#,
        )
        .bind(company_id)
        .bind(name_match.as_str())
        .bind(industry_match.as_str())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to query verdicts for {}", company_id))?;

        rows.into_iter().map(VerdictRecord::try_from).collect()
    }
}

/// The full Postgres-backed store set sharing one pool.
pub fn postgres_stores(pool: PgPool) -> Stores {
    Stores {
        profiles: Arc::new(PgProfileStore::new(pool.clone())),
        industries: Arc::new(PgIndustryIndex::new(pool.clone())),
        feedback: Arc::new(PgFeedbackStore::new(pool.clone())),
        verdicts: Arc::new(PgVerdictCache::new(pool)),
    }
}
