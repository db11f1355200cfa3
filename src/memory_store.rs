//! In-process store implementations.
//!
//! Used by the test suites and handy for running the pipeline without a
//! database. Semantics match the Postgres stores, including the legacy-row
//! replacement on upsert.

use crate::errors::AppError;
use crate::models::{
    CompanyProfile, Feedback, IndustryClassification, MatchLevel, OrganizationClassification,
    StoredProfile, TenderKey, Verdict, VerdictRecord,
};
use crate::stores::{FeedbackStore, IndustryIndex, ProfileStore, Stores, VerdictCache};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

fn poisoned(what: &str) -> AppError {
    AppError::StoreError(format!("{} lock poisoned", what))
}

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, StoredProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, company_id: &str, profile: CompanyProfile) {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.insert(company_id.to_string(), stored(company_id, profile));
        }
    }
}

fn stored(company_id: &str, profile: CompanyProfile) -> StoredProfile {
    StoredProfile {
        company_name: company_id.to_string(),
        profile,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn fetch(&self, company_id: &str) -> Result<Option<StoredProfile>, AppError> {
        let profiles = self.profiles.read().map_err(|_| poisoned("profile"))?;
        Ok(profiles.get(company_id).cloned())
    }

    async fn upsert(
        &self,
        company_id: &str,
        profile: &CompanyProfile,
    ) -> Result<StoredProfile, AppError> {
        let record = stored(company_id, profile.clone());
        self.profiles
            .write()
            .map_err(|_| poisoned("profile"))?
            .insert(company_id.to_string(), record.clone());
        Ok(record)
    }
}

#[derive(Default)]
pub struct InMemoryIndustryIndex {
    industries: RwLock<BTreeMap<String, Vec<IndustryClassification>>>,
}

impl InMemoryIndustryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds labels without reasoning.
    pub fn insert(&self, organization: &str, labels: Vec<String>) {
        let entries = labels
            .into_iter()
            .map(|industry| IndustryClassification {
                industry,
                reasoning: String::new(),
            })
            .collect();
        if let Ok(mut industries) = self.industries.write() {
            industries.insert(organization.to_string(), entries);
        }
    }
}

#[async_trait]
impl IndustryIndex for InMemoryIndustryIndex {
    async fn list(&self) -> Result<Vec<OrganizationClassification>, AppError> {
        let industries = self.industries.read().map_err(|_| poisoned("industry"))?;
        Ok(industries
            .iter()
            .map(|(organization, industries)| OrganizationClassification {
                organization: organization.clone(),
                industries: industries.clone(),
            })
            .collect())
    }

    async fn upsert(&self, classification: &OrganizationClassification) -> Result<(), AppError> {
        self.industries
            .write()
            .map_err(|_| poisoned("industry"))?
            .insert(
                classification.organization.clone(),
                classification.industries.clone(),
            );
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryFeedbackStore {
    feedbacks: RwLock<Vec<Feedback>>,
}

impl InMemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedbackStore for InMemoryFeedbackStore {
    async fn list(&self, company_id: &str) -> Result<Vec<Feedback>, AppError> {
        let feedbacks = self.feedbacks.read().map_err(|_| poisoned("feedback"))?;
        Ok(feedbacks
            .iter()
            .filter(|f| f.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn append(&self, company_id: &str, comment: &str) -> Result<Feedback, AppError> {
        let feedback = Feedback {
            id: Uuid::new_v4(),
            company_id: company_id.to_string(),
            feedback_comment: comment.to_string(),
            created_at: Utc::now(),
        };
        self.feedbacks
            .write()
            .map_err(|_| poisoned("feedback"))?
            .push(feedback.clone());
        Ok(feedback)
    }
}

#[derive(Default)]
pub struct InMemoryVerdictCache {
    records: RwLock<HashMap<(String, TenderKey), VerdictRecord>>,
}

impl InMemoryVerdictCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record as-is, bypassing upsert semantics. Lets tests seed
    /// legacy rows.
    pub fn insert_record(&self, record: VerdictRecord) {
        if let Ok(mut records) = self.records.write() {
            records.insert(
                (record.company_id.clone(), record.tender_key.clone()),
                record,
            );
        }
    }

    pub fn get(&self, company_id: &str, key: &TenderKey) -> Option<VerdictRecord> {
        self.records
            .read()
            .ok()?
            .get(&(company_id.to_string(), key.clone()))
            .cloned()
    }

    /// Number of records stored for the company.
    pub fn len_for(&self, company_id: &str) -> usize {
        self.records
            .read()
            .map(|records| records.keys().filter(|(c, _)| c == company_id).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl VerdictCache for InMemoryVerdictCache {
    async fn upsert(&self, company_id: &str, verdict: &Verdict) -> Result<(), AppError> {
        let record = VerdictRecord::from_verdict(company_id, verdict);
        let mut records = self.records.write().map_err(|_| poisoned("verdict"))?;

        records.retain(|(c, _), r| {
            !(c == company_id && r.is_legacy() && r.tender_name == verdict.tender_name)
        });
        records.insert((company_id.to_string(), record.tender_key.clone()), record);
        Ok(())
    }

    async fn query(
        &self,
        company_id: &str,
        name_match: MatchLevel,
        industry_match: MatchLevel,
    ) -> Result<Vec<VerdictRecord>, AppError> {
        let records = self.records.read().map_err(|_| poisoned("verdict"))?;
        let mut matching: Vec<VerdictRecord> = records
            .values()
            .filter(|r| {
                r.company_id == company_id
                    && r.name_match == name_match
                    && r.industry_match == industry_match
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.tender_name.cmp(&b.tender_name));
        Ok(matching)
    }
}

/// A complete in-memory store set, with typed handles kept for inspection.
#[derive(Clone, Default)]
pub struct InMemoryStores {
    pub profiles: Arc<InMemoryProfileStore>,
    pub industries: Arc<InMemoryIndustryIndex>,
    pub feedback: Arc<InMemoryFeedbackStore>,
    pub verdicts: Arc<InMemoryVerdictCache>,
}

impl InMemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stores(&self) -> Stores {
        Stores {
            profiles: self.profiles.clone(),
            industries: self.industries.clone(),
            feedback: self.feedback.clone(),
            verdicts: self.verdicts.clone(),
        }
    }
}
