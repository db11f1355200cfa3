use crate::config::RecommendationSource;
use crate::errors::AppError;
use crate::evaluation::{Evaluator, RunSummary};
use crate::extraction::ProfileExtractor;
use crate::models::{MatchLevel, StoredProfile, Verdict};
use crate::stores::{ProfileStore, VerdictCache};
use crate::tender_source::TenderCatalog;
use moka::future::Cache;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Companies with a live run lock kept at once.
const MAX_RUN_LOCKS: u64 = 10_000;

type RunLocks = Cache<String, Arc<Mutex<()>>>;

/// Lock registry without time-based expiry: a lock held by a long run must not
/// be evicted and recreated under a second caller.
fn run_lock_registry() -> RunLocks {
    Cache::builder().max_capacity(MAX_RUN_LOCKS).build()
}

/// Serves recommendation reads and refreshes for all companies.
#[derive(Clone)]
pub struct RecommendationService {
    evaluator: Evaluator,
    profiles: Arc<dyn ProfileStore>,
    verdicts: Arc<dyn VerdictCache>,
    tenders: Arc<TenderCatalog>,
    source: RecommendationSource,
    /// One lock per company so live reads for the same company don't run
    /// overlapping bulk passes.
    run_locks: RunLocks,
}

impl RecommendationService {
    pub fn new(
        evaluator: Evaluator,
        profiles: Arc<dyn ProfileStore>,
        verdicts: Arc<dyn VerdictCache>,
        source: RecommendationSource,
    ) -> Self {
        let tenders = evaluator.tenders().clone();

        Self {
            evaluator,
            profiles,
            verdicts,
            tenders,
            source,
            run_locks: run_lock_registry(),
        }
    }

    pub fn source(&self) -> RecommendationSource {
        self.source
    }

    /// Verdicts for the company matching both levels exactly.
    ///
    /// In live mode a full evaluation pass runs first.
    pub async fn get(
        &self,
        company_id: &str,
        name_match: MatchLevel,
        industry_match: MatchLevel,
    ) -> Result<Vec<Verdict>, AppError> {
        match self.source {
            RecommendationSource::Live => {
                let summary = self.run_exclusive(company_id).await?;
                tracing::debug!("Live pass for '{}' done: {:?}", company_id, summary);
            }
            RecommendationSource::Cached => self.ensure_company(company_id).await?,
        }

        let records = self
            .verdicts
            .query(company_id, name_match, industry_match)
            .await?;

        let legacy = records.iter().filter(|r| r.is_legacy()).count();
        if legacy > 0 {
            tracing::debug!(
                "Backfilling organization on {} legacy verdict(s) for '{}'",
                legacy,
                company_id
            );
        }

        Ok(records
            .into_iter()
            .map(|record| record.into_verdict(|name| self.tenders.organization_of(name)))
            .collect())
    }

    /// Re-evaluates one tender; see [`Evaluator::refresh`].
    pub async fn refresh(
        &self,
        company_id: &str,
        tender_name: &str,
        organization: Option<&str>,
    ) -> Result<Verdict, AppError> {
        self.evaluator
            .refresh(company_id, tender_name, organization)
            .await
    }

    /// Runs a bulk pass while holding the company's run lock.
    pub async fn run_exclusive(&self, company_id: &str) -> Result<RunSummary, AppError> {
        let lock = self
            .run_locks
            .get_with(company_id.to_string(), async { Arc::new(Mutex::new(())) })
            .await;

        let _guard = match lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::info!(
                    "Evaluation for '{}' already running, waiting for it to finish",
                    company_id
                );
                lock.lock().await
            }
        };

        self.evaluator.run(company_id).await
    }

    async fn ensure_company(&self, company_id: &str) -> Result<(), AppError> {
        match self.profiles.get(company_id).await? {
            Some(_) => Ok(()),
            None => {
                tracing::warn!("Company not found: '{}'", company_id);
                Err(AppError::NotFound(format!("Company not found: {}", company_id)))
            }
        }
    }
}

/// Company profile reads and description-driven upserts.
#[derive(Clone)]
pub struct CompanyService {
    profiles: Arc<dyn ProfileStore>,
    extractor: Arc<dyn ProfileExtractor>,
}

impl CompanyService {
    pub fn new(profiles: Arc<dyn ProfileStore>, extractor: Arc<dyn ProfileExtractor>) -> Self {
        Self {
            profiles,
            extractor,
        }
    }

    pub async fn get(&self, company_name: &str) -> Result<StoredProfile, AppError> {
        tracing::info!("Looking up company profile: '{}'", company_name);
        self.profiles.fetch(company_name).await?.ok_or_else(|| {
            tracing::warn!("Company profile not found: '{}'", company_name);
            AppError::NotFound(format!("Company not found: {}", company_name))
        })
    }

    /// Extracts a profile from `description` and stores it under
    /// `company_name`, replacing any previous profile.
    pub async fn upsert_from_description(
        &self,
        company_name: &str,
        description: &str,
    ) -> Result<StoredProfile, AppError> {
        if description.trim().is_empty() {
            return Err(AppError::BadRequest(
                "description cannot be empty".to_string(),
            ));
        }

        let profile = self.extractor.extract(company_name, description).await?;
        let stored = self.profiles.upsert(company_name, &profile).await?;

        tracing::info!(
            "Saved profile for '{}': {} industries, {} service categories",
            company_name,
            stored.profile.industries.len(),
            stored.profile.service_categories.len()
        );
        Ok(stored)
    }
}
