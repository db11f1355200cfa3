//! Company profile extraction from a free-text description.

use crate::judge::{unfence, JudgeError, OpenAiJudge};
use crate::models::CompanyProfile;
use async_trait::async_trait;
use serde::Deserialize;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"Jesteś ekspertem od analizy profili firm w kontekście polskiego rynku zamówień publicznych.

Dostajesz nazwę firmy i jej opis. Twoim zadaniem jest wyekstrahować kluczowe informacje o firmie w ustrukturyzowanym formacie JSON.

WAŻNE: Wszystkie wartości tekstowe (nazwy branż, kategorie usług, kody CPV, typy zamawiających, nazwy krajów) muszą być zapisane PO POLSKU.

Odpowiedz WYŁĄCZNIE poprawnym JSON-em w formacie:
{
  "company_info": {
    "name": "<pełna nazwa firmy>",
    "industries": ["<branża 1>", "<branża 2>"]
  },
  "matching_criteria": {
    "service_categories": ["<kategoria usług 1>", "<kategoria usług 2>"],
    "cpv_codes": ["<kod CPV z numerem, np. 77310000-6>"],
    "target_authorities": ["<typ zamawiającego 1>", "<typ zamawiającego 2>"],
    "geography": {
      "primary_country": "<główny kraj działalności>"
    }
  }
}

Zasady:
- "industries": główne branże, w których firma działa
- "service_categories": konkretne kategorie usług/produktów firmy, szczegółowo
- "cpv_codes": kody CPV pasujące do usług firmy, w formacie "XXXXXXXX-X"
- "target_authorities": typy zamawiających publicznych, do których firma mogłaby składać oferty
- "geography.primary_country": główny kraj działalności firmy

Bądź precyzyjny i wyciągaj informacje bezpośrednio z opisu. Jeśli czegoś brakuje, wnioskuj na podstawie kontekstu branżowego.

Nie dodawaj żadnego tekstu poza JSON-em."#;

/// Turns a company description into a structured profile.
#[async_trait]
pub trait ProfileExtractor: Send + Sync {
    async fn extract(
        &self,
        company_name: &str,
        description: &str,
    ) -> Result<CompanyProfile, JudgeError>;
}

#[derive(Debug, Deserialize)]
struct ExtractedProfile {
    company_info: CompanyInfo,
    matching_criteria: MatchingCriteria,
}

#[derive(Debug, Deserialize)]
struct CompanyInfo {
    #[serde(default)]
    name: String,
    industries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MatchingCriteria {
    service_categories: Vec<String>,
    #[serde(default)]
    cpv_codes: Vec<String>,
    target_authorities: Vec<String>,
    #[serde(default)]
    geography: Geography,
}

#[derive(Debug, Default, Deserialize)]
struct Geography {
    #[serde(default)]
    primary_country: String,
}

pub fn build_extraction_prompt(company_name: &str, description: &str) -> String {
    format!(
        "## Company name\n\n{}\n\n## Company description\n\n{}",
        company_name, description
    )
}

/// Parses the model's nested profile document into a [`CompanyProfile`].
///
/// An empty extracted name falls back to `company_name`.
pub fn parse_profile(company_name: &str, raw: &str) -> Result<CompanyProfile, JudgeError> {
    let extracted: ExtractedProfile =
        serde_json::from_str(unfence(raw)).map_err(|e| JudgeError::Malformed(e.to_string()))?;

    let name = match extracted.company_info.name.trim() {
        "" => company_name.to_string(),
        name => name.to_string(),
    };

    Ok(CompanyProfile {
        name,
        industries: extracted.company_info.industries,
        service_categories: extracted.matching_criteria.service_categories,
        cpv_codes: extracted.matching_criteria.cpv_codes,
        target_authorities: extracted.matching_criteria.target_authorities,
        primary_country: extracted.matching_criteria.geography.primary_country,
    })
}

#[async_trait]
impl ProfileExtractor for OpenAiJudge {
    async fn extract(
        &self,
        company_name: &str,
        description: &str,
    ) -> Result<CompanyProfile, JudgeError> {
        tracing::info!("Extracting profile for company '{}'", company_name);
        let content = self
            .chat(
                EXTRACTION_SYSTEM_PROMPT,
                &build_extraction_prompt(company_name, description),
            )
            .await?;
        tracing::debug!("Extraction response for '{}': {}", company_name, content);
        parse_profile(company_name, &content)
    }
}
