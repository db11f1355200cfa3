//! Storage seams used by the recommendation pipeline.
//!
//! Postgres implementations live in [`crate::db_storage`], in-memory ones in
//! [`crate::memory_store`].

use crate::errors::AppError;
use crate::models::{
    CompanyProfile, Feedback, MatchLevel, OrganizationClassification, StoredProfile, Verdict,
    VerdictRecord,
};
use crate::prompt::IndustryMap;
use async_trait::async_trait;
use std::sync::Arc;

/// Company id -> structured profile.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch(&self, company_id: &str) -> Result<Option<StoredProfile>, AppError>;

    /// Creates or replaces the company's profile.
    async fn upsert(
        &self,
        company_id: &str,
        profile: &CompanyProfile,
    ) -> Result<StoredProfile, AppError>;

    async fn get(&self, company_id: &str) -> Result<Option<CompanyProfile>, AppError> {
        Ok(self.fetch(company_id).await?.map(|stored| stored.profile))
    }
}

/// Organization -> industries.
#[async_trait]
pub trait IndustryIndex: Send + Sync {
    /// Every classified organization, ordered by name.
    async fn list(&self) -> Result<Vec<OrganizationClassification>, AppError>;

    /// Replaces the industries of one organization.
    async fn upsert(&self, classification: &OrganizationClassification) -> Result<(), AppError>;

    /// Loads the whole index as one snapshot of industry labels.
    async fn load_all(&self) -> Result<IndustryMap, AppError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .map(|c| {
                let labels = c.industries.into_iter().map(|i| i.industry).collect();
                (c.organization, labels)
            })
            .collect())
    }
}

/// Append-only feedback comments per company.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Comments for the company in creation order.
    async fn list(&self, company_id: &str) -> Result<Vec<Feedback>, AppError>;

    async fn append(&self, company_id: &str, comment: &str) -> Result<Feedback, AppError>;
}

/// Persistent (company, tender) -> verdict map.
#[async_trait]
pub trait VerdictCache: Send + Sync {
    /// Replaces any verdict stored for the same company and tender key,
    /// including a legacy record for the same tender name.
    async fn upsert(&self, company_id: &str, verdict: &Verdict) -> Result<(), AppError>;

    /// Exact-match filter on both match levels.
    async fn query(
        &self,
        company_id: &str,
        name_match: MatchLevel,
        industry_match: MatchLevel,
    ) -> Result<Vec<VerdictRecord>, AppError>;
}

/// The set of stores one evaluator works against.
#[derive(Clone)]
pub struct Stores {
    pub profiles: Arc<dyn ProfileStore>,
    pub industries: Arc<dyn IndustryIndex>,
    pub feedback: Arc<dyn FeedbackStore>,
    pub verdicts: Arc<dyn VerdictCache>,
}
