use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============ Match Levels ============

/// Judge confidence that a tender is relevant on one axis.
///
/// Levels are only ever compared for equality or set membership; the order of
/// the variants documents decreasing confidence and carries no arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchLevel {
    /// Direct, obvious match.
    PerfectMatch,
    /// Plausible but indirect match.
    PartialMatch,
    /// Not enough information to judge.
    DontKnow,
    /// Completely unrelated.
    NoMatch,
}

impl MatchLevel {
    pub const ALL: [MatchLevel; 4] = [
        MatchLevel::PerfectMatch,
        MatchLevel::PartialMatch,
        MatchLevel::DontKnow,
        MatchLevel::NoMatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchLevel::PerfectMatch => "PERFECT_MATCH",
            MatchLevel::PartialMatch => "PARTIAL_MATCH",
            MatchLevel::DontKnow => "DONT_KNOW",
            MatchLevel::NoMatch => "NO_MATCH",
        }
    }
}

impl fmt::Display for MatchLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERFECT_MATCH" => Ok(MatchLevel::PerfectMatch),
            "PARTIAL_MATCH" => Ok(MatchLevel::PartialMatch),
            "DONT_KNOW" => Ok(MatchLevel::DontKnow),
            "NO_MATCH" => Ok(MatchLevel::NoMatch),
            other => Err(format!("unknown match level '{}'", other)),
        }
    }
}

// ============ Company Profile ============

/// Structured company profile as extracted from a free-text description.
///
/// Read-only for the recommendation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    /// Display name of the company.
    #[serde(default)]
    pub name: String,
    /// Industries the company operates in.
    pub industries: Vec<String>,
    /// Services the company offers.
    pub service_categories: Vec<String>,
    /// CPV codes the company usually bids on.
    #[serde(default)]
    pub cpv_codes: Vec<String>,
    /// Kinds of contracting authorities the company targets.
    pub target_authorities: Vec<String>,
    /// Country the company primarily operates in.
    #[serde(default)]
    pub primary_country: String,
}

/// A profile as persisted, keyed by the company name used in the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProfile {
    pub company_name: String,
    pub profile: CompanyProfile,
    pub created_at: DateTime<Utc>,
}

// ============ Organization Industries ============

/// One industry assigned to a contracting organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryClassification {
    pub industry: String,
    #[serde(default)]
    pub reasoning: String,
}

/// Industries of one organization, most relevant first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationClassification {
    pub organization: String,
    pub industries: Vec<IndustryClassification>,
}

/// Upper bound on industries kept per organization.
pub const MAX_ORGANIZATION_INDUSTRIES: usize = 3;

// ============ Tenders ============

/// A single tender from the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tender {
    /// Stable URL of the tender notice.
    pub tender_url: String,
    /// Display name of the tender.
    pub name: String,
    /// Contracting organization.
    pub organization: String,
    /// Submission deadline as published (e.g. "2026-03-01 12:00").
    pub submission_deadline: String,
    /// Date the procedure was initiated.
    pub initiation_date: String,
    /// Procurement procedure type, if published.
    pub procedure_type: Option<String>,
    /// Source the tender was scraped from.
    pub source_type: String,
    /// Attached documents.
    pub file_urls: Vec<String>,
}

impl Tender {
    pub fn key(&self) -> TenderKey {
        TenderKey::new(&self.organization, &self.name)
    }
}

/// Collision-free identity of a tender within a corpus.
///
/// Tender names repeat across organizations, so the key hashes the
/// (organization, name) pair instead of using the name alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenderKey(String);

impl TenderKey {
    pub fn new(organization: &str, name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(organization.as_bytes());
        // Unit separator keeps ("ab", "c") and ("a", "bc") apart.
        hasher.update([0x1f]);
        hasher.update(name.as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(digest[..32].to_string())
    }

    /// Wraps a key read back from storage.
    pub fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============ Verdicts ============

/// Structured answer of the judge for one prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judgement {
    pub name_match: MatchLevel,
    pub name_reason: String,
    pub industry_match: MatchLevel,
    pub industry_reason: String,
}

/// Evaluation result for one tender under one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Name of the evaluated tender.
    pub tender_name: String,
    /// Contracting organization of the evaluated tender.
    pub organization: String,
    /// How well the tender subject matches the company's services.
    pub name_match: MatchLevel,
    /// Judge reasoning for `name_match`.
    pub name_reason: String,
    /// How well the organization's industries match the company's.
    pub industry_match: MatchLevel,
    /// Judge reasoning for `industry_match`.
    pub industry_reason: String,
    /// When the verdict was produced.
    pub created_at: DateTime<Utc>,
}

impl Verdict {
    pub fn from_judgement(tender: &Tender, judgement: Judgement, created_at: DateTime<Utc>) -> Self {
        Self {
            tender_name: tender.name.clone(),
            organization: tender.organization.clone(),
            name_match: judgement.name_match,
            name_reason: judgement.name_reason,
            industry_match: judgement.industry_match,
            industry_reason: judgement.industry_reason,
            created_at,
        }
    }

    pub fn key(&self) -> TenderKey {
        TenderKey::new(&self.organization, &self.tender_name)
    }
}

/// Schema version written by this service.
pub const VERDICT_SCHEMA_VERSION: i16 = 2;

/// A verdict as persisted in the verdict cache.
///
/// Version 1 records predate the organization column and carry
/// `organization: None`; they are repaired on read by
/// [`VerdictRecord::into_verdict`].
#[derive(Debug, Clone, PartialEq)]
pub struct VerdictRecord {
    pub company_id: String,
    pub tender_key: TenderKey,
    pub tender_name: String,
    pub organization: Option<String>,
    pub name_match: MatchLevel,
    pub name_reason: String,
    pub industry_match: MatchLevel,
    pub industry_reason: String,
    pub schema_version: i16,
    pub created_at: DateTime<Utc>,
}

impl VerdictRecord {
    pub fn from_verdict(company_id: &str, verdict: &Verdict) -> Self {
        Self {
            company_id: company_id.to_string(),
            tender_key: verdict.key(),
            tender_name: verdict.tender_name.clone(),
            organization: Some(verdict.organization.clone()),
            name_match: verdict.name_match,
            name_reason: verdict.name_reason.clone(),
            industry_match: verdict.industry_match,
            industry_reason: verdict.industry_reason.clone(),
            schema_version: VERDICT_SCHEMA_VERSION,
            created_at: verdict.created_at,
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.organization.is_none()
    }

    /// Converts the stored record into the served shape, filling a missing
    /// organization through `lookup_organization` (tender name -> organization).
    pub fn into_verdict<F>(self, lookup_organization: F) -> Verdict
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let organization = match self.organization {
            Some(org) => org,
            None => lookup_organization(&self.tender_name).unwrap_or_default(),
        };

        Verdict {
            tender_name: self.tender_name,
            organization,
            name_match: self.name_match,
            name_reason: self.name_reason,
            industry_match: self.industry_match,
            industry_reason: self.industry_reason,
            created_at: self.created_at,
        }
    }
}

// ============ Feedback ============

/// Free-text comment a company left about recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    #[serde(skip_serializing, default)]
    pub company_id: String,
    pub feedback_comment: String,
    pub created_at: DateTime<Utc>,
}

// ============ API Types ============

fn default_company() -> String {
    "greenworks".to_string()
}

fn default_match_level() -> MatchLevel {
    MatchLevel::PerfectMatch
}

/// Query parameters for `GET /api/v1/tenders/recommendations`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationQueryParams {
    #[serde(default = "default_company")]
    pub company: String,
    #[serde(default = "default_match_level")]
    pub name_match: MatchLevel,
    #[serde(default = "default_match_level")]
    pub industry_match: MatchLevel,
}

/// Query parameters for endpoints addressing a tender by name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenderLookupParams {
    /// Disambiguates tenders that share a name across organizations.
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationsResponse {
    pub company: String,
    pub recommendations: Vec<Verdict>,
}

/// Tender details for `GET /api/v1/tenders/:tender_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenderResponse {
    #[serde(flatten)]
    pub tender: Tender,
    pub files_count: usize,
}

impl From<Tender> for TenderResponse {
    fn from(tender: Tender) -> Self {
        let files_count = tender.file_urls.len();
        Self {
            tender,
            files_count,
        }
    }
}

/// Body of `PUT /api/v1/companies/:company_name`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertCompanyRequest {
    /// Free-text description the profile is extracted from.
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpsertIndustriesRequest {
    pub industries: Vec<IndustryClassification>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationsResponse {
    pub organizations: Vec<OrganizationClassification>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFeedbackRequest {
    pub feedback_comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackListResponse {
    pub company_name: String,
    pub feedbacks: Vec<Feedback>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tender(org: &str, name: &str) -> Tender {
        Tender {
            tender_url: format!("https://example.com/{}", name),
            name: name.to_string(),
            organization: org.to_string(),
            submission_deadline: "2026-03-01 12:00".to_string(),
            initiation_date: "2026-01-10".to_string(),
            procedure_type: None,
            source_type: String::new(),
            file_urls: vec![],
        }
    }

    #[test]
    fn test_match_level_wire_names() {
        assert_eq!(
            serde_json::to_string(&MatchLevel::DontKnow).unwrap(),
            "\"DONT_KNOW\""
        );
        assert_eq!(
            "PARTIAL_MATCH".parse::<MatchLevel>().unwrap(),
            MatchLevel::PartialMatch
        );
        assert!("perfect_match".parse::<MatchLevel>().is_err());
        assert!(serde_json::from_str::<MatchLevel>("\"MAYBE\"").is_err());
    }

    #[test]
    fn test_tender_key_separates_organizations() {
        let a = tender("Gmina X", "Koszenie trawników");
        let b = tender("Gmina Y", "Koszenie trawników");

        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), tender("Gmina X", "Koszenie trawników").key());
        assert_eq!(a.key().as_str().len(), 32);
    }

    #[test]
    fn test_tender_key_is_not_fooled_by_concatenation() {
        assert_ne!(TenderKey::new("ab", "c"), TenderKey::new("a", "bc"));
    }

    #[test]
    fn test_legacy_record_backfills_organization() {
        let verdict = Verdict::from_judgement(
            &tender("Gmina X", "Koszenie"),
            Judgement {
                name_match: MatchLevel::PerfectMatch,
                name_reason: "ok".to_string(),
                industry_match: MatchLevel::PartialMatch,
                industry_reason: "ok".to_string(),
            },
            Utc::now(),
        );
        let mut record = VerdictRecord::from_verdict("greenworks", &verdict);
        record.organization = None;
        assert!(record.is_legacy());

        let repaired = record.into_verdict(|name| {
            assert_eq!(name, "Koszenie");
            Some("Gmina X".to_string())
        });
        assert_eq!(repaired, verdict);
    }

    #[test]
    fn test_legacy_record_for_unknown_tender_gets_empty_organization() {
        let record = VerdictRecord {
            company_id: "greenworks".to_string(),
            tender_key: TenderKey::from_stored("legacy".to_string()),
            tender_name: "Gone".to_string(),
            organization: None,
            name_match: MatchLevel::PerfectMatch,
            name_reason: String::new(),
            industry_match: MatchLevel::PerfectMatch,
            industry_reason: String::new(),
            schema_version: 1,
            created_at: Utc::now(),
        };

        assert_eq!(record.into_verdict(|_| None).organization, "");
    }
}
