//! Tender evaluation against a company profile.
//!
//! The bulk pass ([`Evaluator::run`]) does, for one company:
//! 1. Load the profile (missing profile aborts the run)
//! 2. Snapshot the industry index and feedback (failures degrade to empty)
//! 3. Judge every tender, at most `concurrency` calls in flight
//! 4. Drop confidently irrelevant verdicts (skip policy)
//! 5. Upsert the rest into the verdict cache
//!
//! [`Evaluator::refresh`] judges a single tender and always upserts.

use crate::errors::AppError;
use crate::judge::Judge;
use crate::models::{CompanyProfile, MatchLevel, Tender, Verdict};
use crate::prompt::{build_user_prompt, IndustryMap, RECOMMENDATION_SYSTEM_PROMPT};
use crate::stores::Stores;
use crate::tender_source::TenderCatalog;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Default number of simultaneous judge calls.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Whether a verdict is too confidently irrelevant to be stored.
///
/// Skipping means "don't write": an older cached verdict for the same tender
/// stays as it was.
pub fn should_skip(name_match: MatchLevel, industry_match: MatchLevel) -> bool {
    match (name_match, industry_match) {
        (MatchLevel::NoMatch, MatchLevel::NoMatch | MatchLevel::DontKnow) => true,
        (MatchLevel::NoMatch, MatchLevel::PerfectMatch | MatchLevel::PartialMatch) => false,
        (MatchLevel::PerfectMatch | MatchLevel::PartialMatch | MatchLevel::DontKnow, _) => false,
    }
}

/// Per-run immutable inputs shared by every tender task.
#[derive(Debug)]
pub struct EvaluationContext {
    pub company_id: String,
    pub profile: CompanyProfile,
    pub org_industries: IndustryMap,
    pub feedbacks: Vec<String>,
}

impl EvaluationContext {
    pub fn prompt_for(&self, tender: &Tender) -> String {
        build_user_prompt(&self.profile, tender, &self.org_industries, &self.feedbacks)
    }
}

/// What happened to one tender during a bulk run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TenderOutcome {
    Saved,
    Skipped,
    Failed,
}

/// Counters for a finished bulk run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub saved: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: TenderOutcome) {
        match outcome {
            TenderOutcome::Saved => self.saved += 1,
            TenderOutcome::Skipped => self.skipped += 1,
            TenderOutcome::Failed => self.failed += 1,
        }
    }
}

/// Runs the judge over tenders for one company at a time.
#[derive(Clone)]
pub struct Evaluator {
    judge: Arc<dyn Judge>,
    stores: Stores,
    tenders: Arc<TenderCatalog>,
    concurrency: usize,
}

impl Evaluator {
    pub fn new(
        judge: Arc<dyn Judge>,
        stores: Stores,
        tenders: Arc<TenderCatalog>,
        concurrency: usize,
    ) -> Self {
        Self {
            judge,
            stores,
            tenders,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn tenders(&self) -> &Arc<TenderCatalog> {
        &self.tenders
    }

    /// Loads the profile, industry index and feedback once for a run.
    pub async fn load_context(&self, company_id: &str) -> Result<EvaluationContext, AppError> {
        tracing::info!("Loading company profile for '{}'", company_id);
        let profile = self
            .stores
            .profiles
            .get(company_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!("Company not found: '{}'", company_id);
                AppError::NotFound(format!("Company not found: {}", company_id))
            })?;

        let org_industries = match self.stores.industries.load_all().await {
            Ok(industries) => {
                tracing::info!("Loaded industries for {} organizations", industries.len());
                industries
            }
            Err(e) => {
                tracing::warn!(
                    "Industry index unavailable, continuing without it: {}",
                    e
                );
                IndustryMap::new()
            }
        };

        let feedbacks = match self.stores.feedback.list(company_id).await {
            Ok(feedbacks) => {
                tracing::info!(
                    "Loaded {} feedbacks for company '{}'",
                    feedbacks.len(),
                    company_id
                );
                feedbacks.into_iter().map(|f| f.feedback_comment).collect()
            }
            Err(e) => {
                tracing::warn!(
                    "Feedback for '{}' unavailable, continuing without it: {}",
                    company_id,
                    e
                );
                Vec::new()
            }
        };

        Ok(EvaluationContext {
            company_id: company_id.to_string(),
            profile,
            org_industries,
            feedbacks,
        })
    }

    /// Bulk pass over the whole corpus for one company.
    ///
    /// Individual judge or store failures are logged and counted; only a
    /// missing or unreadable profile fails the run. Each permit is taken before
    /// its task is spawned, so dropping this future stops new dispatch while
    /// tasks already spawned run to completion.
    pub async fn run(&self, company_id: &str) -> Result<RunSummary, AppError> {
        tracing::info!("Starting evaluation for company '{}'", company_id);
        let ctx = Arc::new(self.load_context(company_id).await?);

        let total = self.tenders.len();
        tracing::info!(
            "Processing {} tenders ({} concurrent) for '{}'",
            total,
            self.concurrency,
            company_id
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(total);

        for index in 0..total {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AppError::InternalError(format!("Semaphore closed: {}", e)))?;
            let this = self.clone();
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                this.evaluate_one(&ctx, index, total).await
            }));
        }

        let mut summary = RunSummary {
            total,
            ..RunSummary::default()
        };
        for handle in handles {
            match handle.await {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    tracing::error!("Tender task for '{}' aborted: {}", company_id, e);
                    summary.record(TenderOutcome::Failed);
                }
            }
        }

        tracing::info!(
            "Finished processing all {} tenders for '{}': {} saved, {} skipped, {} failed",
            total,
            company_id,
            summary.saved,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }

    async fn evaluate_one(&self, ctx: &EvaluationContext, index: usize, total: usize) -> TenderOutcome {
        let tender = &self.tenders.all()[index];
        tracing::info!(
            "[{}/{}] Evaluating tender: '{}'",
            index + 1,
            total,
            tender.name
        );

        let verdict = match self.judge_tender(ctx, tender).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(
                    "Judge failed for tender '{}' (org '{}'), skipping: {}",
                    tender.name,
                    tender.organization,
                    e
                );
                return TenderOutcome::Failed;
            }
        };

        if should_skip(verdict.name_match, verdict.industry_match) {
            tracing::info!(
                "Skipping tender '{}' - name={}, industry={}",
                tender.name,
                verdict.name_match,
                verdict.industry_match
            );
            return TenderOutcome::Skipped;
        }

        match self.stores.verdicts.upsert(&ctx.company_id, &verdict).await {
            Ok(()) => {
                tracing::info!(
                    "Saved recommendation for tender '{}' (company '{}'): name={}, industry={}",
                    verdict.tender_name,
                    ctx.company_id,
                    verdict.name_match,
                    verdict.industry_match
                );
                TenderOutcome::Saved
            }
            Err(e) => {
                tracing::error!(
                    "Failed to store verdict for tender '{}' (company '{}'): {}",
                    verdict.tender_name,
                    ctx.company_id,
                    e
                );
                TenderOutcome::Failed
            }
        }
    }

    async fn judge_tender(&self, ctx: &EvaluationContext, tender: &Tender) -> Result<Verdict, AppError> {
        let user_prompt = ctx.prompt_for(tender);
        tracing::debug!(
            "Calling judge for tender='{}', org='{}'",
            tender.name,
            tender.organization
        );
        let judgement = self
            .judge
            .evaluate(RECOMMENDATION_SYSTEM_PROMPT, &user_prompt)
            .await?;
        tracing::debug!(
            "Judge result for tender='{}': name_match={}, industry_match={}",
            tender.name,
            judgement.name_match,
            judgement.industry_match
        );
        Ok(Verdict::from_judgement(tender, judgement, Utc::now()))
    }

    /// Re-judges one tender with current feedback and stores the result
    /// regardless of the skip policy.
    ///
    /// `organization` is required only when several organizations published a
    /// tender with this name.
    pub async fn refresh(
        &self,
        company_id: &str,
        tender_name: &str,
        organization: Option<&str>,
    ) -> Result<Verdict, AppError> {
        tracing::info!(
            "Refreshing recommendation for company='{}', tender='{}'",
            company_id,
            tender_name
        );

        let tender = self.tenders.resolve(tender_name, organization)?.clone();
        let ctx = self.load_context(company_id).await?;

        let verdict = self.judge_tender(&ctx, &tender).await?;
        self.stores.verdicts.upsert(company_id, &verdict).await?;

        tracing::info!(
            "Refresh complete for tender='{}': name_match={}, industry_match={}",
            tender_name,
            verdict.name_match,
            verdict.industry_match
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_policy_truth_table() {
        for name in MatchLevel::ALL {
            for industry in MatchLevel::ALL {
                let expected = name == MatchLevel::NoMatch
                    && matches!(industry, MatchLevel::NoMatch | MatchLevel::DontKnow);
                assert_eq!(
                    should_skip(name, industry),
                    expected,
                    "name={} industry={}",
                    name,
                    industry
                );
            }
        }
    }

    #[test]
    fn test_no_match_name_with_positive_industry_is_kept() {
        assert!(!should_skip(MatchLevel::NoMatch, MatchLevel::PartialMatch));
        assert!(!should_skip(MatchLevel::NoMatch, MatchLevel::PerfectMatch));
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::default();
        summary.record(TenderOutcome::Saved);
        summary.record(TenderOutcome::Saved);
        summary.record(TenderOutcome::Skipped);
        summary.record(TenderOutcome::Failed);

        assert_eq!(
            summary,
            RunSummary {
                total: 0,
                saved: 2,
                skipped: 1,
                failed: 1
            }
        );
    }
}
