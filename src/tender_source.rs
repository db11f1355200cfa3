//! Read-only tender corpus, loaded once per process.

use crate::errors::AppError;
use crate::models::{Tender, TenderKey};
use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct TenderCorpusFile {
    tenders: Vec<TenderEntry>,
}

#[derive(Debug, Deserialize)]
struct TenderEntry {
    tender_url: String,
    metadata: TenderMetadata,
    #[serde(default)]
    file_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TenderMetadata {
    name: String,
    organization: String,
    #[serde(default)]
    submission_deadline: String,
    #[serde(default)]
    initiation_date: String,
    #[serde(default)]
    procedure_type: Option<String>,
    #[serde(default)]
    source_type: Option<String>,
}

impl From<TenderEntry> for Tender {
    fn from(entry: TenderEntry) -> Self {
        Tender {
            tender_url: entry.tender_url,
            name: entry.metadata.name,
            organization: entry.metadata.organization,
            submission_deadline: entry.metadata.submission_deadline,
            initiation_date: entry.metadata.initiation_date,
            procedure_type: entry.metadata.procedure_type,
            source_type: entry.metadata.source_type.unwrap_or_default(),
            file_urls: entry.file_urls,
        }
    }
}

/// Outcome of looking a tender up by its display name.
#[derive(Debug)]
pub enum NameLookup<'a> {
    Found(&'a Tender),
    Missing,
    /// Several organizations published a tender with this name.
    Ambiguous(Vec<&'a Tender>),
}

/// Ordered tender corpus with lookup indexes.
#[derive(Debug, Default)]
pub struct TenderCatalog {
    tenders: Vec<Tender>,
    by_key: HashMap<TenderKey, usize>,
    by_name: HashMap<String, Vec<usize>>,
}

impl TenderCatalog {
    /// Builds the catalog, dropping repeated (organization, name) pairs so that
    /// every tender key appears once.
    pub fn new(input: Vec<Tender>) -> Self {
        let mut tenders = Vec::with_capacity(input.len());
        let mut by_key = HashMap::with_capacity(input.len());
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();

        for tender in input {
            let key = tender.key();
            if by_key.contains_key(&key) {
                tracing::warn!(
                    "Duplicate tender '{}' from '{}' in corpus, keeping the first entry",
                    tender.name,
                    tender.organization
                );
                continue;
            }

            let idx = tenders.len();
            by_key.insert(key, idx);
            by_name.entry(tender.name.clone()).or_default().push(idx);
            tenders.push(tender);
        }

        Self {
            tenders,
            by_key,
            by_name,
        }
    }

    /// Parses a corpus from its JSON representation.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let file: TenderCorpusFile =
            serde_json::from_str(raw).context("Invalid tender corpus JSON")?;
        Ok(Self::new(file.tenders.into_iter().map(Tender::from).collect()))
    }

    /// Loads the corpus from disk.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tender corpus {}", path.display()))?;
        let catalog = Self::from_json(&raw)?;
        tracing::info!("Loaded {} tenders from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn all(&self) -> &[Tender] {
        &self.tenders
    }

    pub fn len(&self) -> usize {
        self.tenders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenders.is_empty()
    }

    pub fn get(&self, key: &TenderKey) -> Option<&Tender> {
        self.by_key.get(key).map(|idx| &self.tenders[*idx])
    }

    pub fn find(&self, organization: &str, name: &str) -> Option<&Tender> {
        self.get(&TenderKey::new(organization, name))
    }

    pub fn lookup_name(&self, name: &str) -> NameLookup<'_> {
        match self.by_name.get(name).map(Vec::as_slice) {
            None | Some([]) => NameLookup::Missing,
            Some([idx]) => NameLookup::Found(&self.tenders[*idx]),
            Some(indexes) => {
                NameLookup::Ambiguous(indexes.iter().map(|idx| &self.tenders[*idx]).collect())
            }
        }
    }

    /// Organization that published the tender with this name, if exactly one did.
    pub fn organization_of(&self, name: &str) -> Option<String> {
        match self.lookup_name(name) {
            NameLookup::Found(tender) => Some(tender.organization.clone()),
            NameLookup::Missing | NameLookup::Ambiguous(_) => None,
        }
    }

    /// Resolves a tender by name. `organization` is required only when several
    /// organizations published a tender with this name.
    pub fn resolve(&self, name: &str, organization: Option<&str>) -> Result<&Tender, AppError> {
        if let Some(org) = organization {
            return self.find(org, name).ok_or_else(|| {
                tracing::warn!("Tender not found: '{}' ({})", name, org);
                AppError::NotFound(format!("Tender not found: {} ({})", name, org))
            });
        }

        match self.lookup_name(name) {
            NameLookup::Found(tender) => Ok(tender),
            NameLookup::Missing => {
                tracing::warn!("Tender not found: '{}'", name);
                Err(AppError::NotFound(format!("Tender not found: {}", name)))
            }
            NameLookup::Ambiguous(candidates) => {
                let organizations: Vec<&str> =
                    candidates.iter().map(|t| t.organization.as_str()).collect();
                Err(AppError::BadRequest(format!(
                    "Tender name '{}' is published by several organizations ({}); pass organization",
                    name,
                    organizations.join(", ")
                )))
            }
        }
    }
}
