//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tenderec_api::evaluation::Evaluator;
use tenderec_api::extraction::ProfileExtractor;
use tenderec_api::judge::{Judge, JudgeError};
use tenderec_api::memory_store::InMemoryStores;
use tenderec_api::models::{CompanyProfile, Judgement, MatchLevel, Tender};
use tenderec_api::tender_source::TenderCatalog;

pub fn tender(org: &str, name: &str) -> Tender {
    Tender {
        tender_url: format!("https://ezamowienia.gov.pl/{}/{}", org, name),
        name: name.to_string(),
        organization: org.to_string(),
        submission_deadline: "2026-03-01 12:00".to_string(),
        initiation_date: "2026-01-10".to_string(),
        procedure_type: None,
        source_type: "ezamowienia".to_string(),
        file_urls: vec![],
    }
}

pub fn greenworks_profile() -> CompanyProfile {
    CompanyProfile {
        name: "GreenWorks".to_string(),
        industries: vec!["Utrzymanie zieleni".to_string()],
        service_categories: vec!["Koszenie trawników".to_string()],
        cpv_codes: vec![],
        target_authorities: vec!["Gminy".to_string()],
        primary_country: "Polska".to_string(),
    }
}

pub fn corpus(size: usize) -> Vec<Tender> {
    (0..size)
        .map(|i| tender("Gmina X", &format!("Przetarg {}", i)))
        .collect()
}

/// What the scripted judge answers for one tender.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Levels(MatchLevel, MatchLevel),
    Malformed,
}

/// Judge that answers from a per-tender script and records how it was called.
pub struct ScriptedJudge {
    replies: Mutex<HashMap<String, Reply>>,
    default: Reply,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedJudge {
    pub fn answering(name_match: MatchLevel, industry_match: MatchLevel) -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            default: Reply::Levels(name_match, industry_match),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn perfect() -> Self {
        Self::answering(MatchLevel::PerfectMatch, MatchLevel::PerfectMatch)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn reply(&self, tender_name: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert(tender_name.to_string(), reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

fn tender_name_of(prompt: &str) -> &str {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("**Name:** "))
        .unwrap_or_default()
}

#[async_trait]
impl Judge for ScriptedJudge {
    async fn evaluate(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
    ) -> Result<Judgement, JudgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(user_prompt.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(tender_name_of(user_prompt))
            .copied()
            .unwrap_or(self.default);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Reply::Levels(name_match, industry_match) => Ok(Judgement {
                name_match,
                name_reason: format!("name: {}", name_match),
                industry_match,
                industry_reason: format!("industry: {}", industry_match),
            }),
            Reply::Malformed => Err(JudgeError::Malformed("missing field `name_match`".into())),
        }
    }
}

/// Extractor that returns a fixed profile named after the company, or fails
/// when built with [`ScriptedExtractor::failing`].
pub struct ScriptedExtractor {
    profile: Option<CompanyProfile>,
    descriptions: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    pub fn returning(profile: CompanyProfile) -> Self {
        Self {
            profile: Some(profile),
            descriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            profile: None,
            descriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.descriptions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileExtractor for ScriptedExtractor {
    async fn extract(
        &self,
        company_name: &str,
        description: &str,
    ) -> Result<CompanyProfile, JudgeError> {
        self.descriptions
            .lock()
            .unwrap()
            .push(description.to_string());
        match &self.profile {
            Some(profile) => Ok(CompanyProfile {
                name: company_name.to_string(),
                ..profile.clone()
            }),
            None => Err(JudgeError::EmptyResponse),
        }
    }
}

/// In-memory stores with the greenworks profile already present.
pub fn seeded_stores() -> InMemoryStores {
    let stores = InMemoryStores::new();
    stores.profiles.insert("greenworks", greenworks_profile());
    stores
}

pub fn evaluator(
    stores: &InMemoryStores,
    judge: &Arc<ScriptedJudge>,
    tenders: Vec<Tender>,
    concurrency: usize,
) -> Evaluator {
    Evaluator::new(
        judge.clone(),
        stores.stores(),
        Arc::new(TenderCatalog::new(tenders)),
        concurrency,
    )
}
