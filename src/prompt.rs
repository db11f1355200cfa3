//! Prompt construction for the tender judge.
//!
//! [`build_user_prompt`] is pure: the same profile, tender, industry index and
//! feedback always render the same text. Every non-empty input category shows
//! up in the output; empty ones are left out rather than rendered as blanks.

use crate::models::{CompanyProfile, Tender};
use std::collections::HashMap;

/// Organization name -> industry labels, as produced by the classification pipeline.
pub type IndustryMap = HashMap<String, Vec<String>>;

pub const RECOMMENDATION_SYSTEM_PROMPT: &str = r#"You are a Polish public procurement expert specializing in matching tenders to company profiles.

You receive:
1. A company profile - its industries, service categories, and target contracting authorities.
2. A single tender with its contracting organization and the organization's industries.
3. Optionally, user feedback on previously rejected tenders - use it to understand the user's preferences and adjust your scoring accordingly.

Your task is to evaluate the tender against the company profile on TWO separate axes.

## Match levels

For each axis assign one of:

- **PERFECT_MATCH** - direct, obvious match.
- **PARTIAL_MATCH** - plausible but indirect match.
- **DONT_KNOW** - not enough information to judge.
- **NO_MATCH** - completely unrelated.

### Axis 1 - Tender name vs. company activities (name_match)
How closely the subject of the tender aligns with the company's service categories and competencies.
- PERFECT_MATCH example: company plants trees -> tender is about planting trees.
- PARTIAL_MATCH example: company plants trees -> tender is about street revitalization (likely includes greenery).
- NO_MATCH example: company plants trees -> tender is about IT services.

### Axis 2 - Organization industry vs. company industries (industry_match)
How closely the contracting organization's industries align with the company's industries and target contracting authorities.
- PERFECT_MATCH example: company targets municipal authorities -> organization is a city municipality.
- PARTIAL_MATCH example: company targets municipal authorities -> organization is a regional government.
- NO_MATCH example: company targets municipal authorities -> organization is a private tech corporation.

## User feedback

If user feedback on rejected tenders is provided, treat it as additional signal about the user's preferences. For example, if the user says "too short deadline" for a tender, penalize similar tenders. If they say "not our area", it reinforces NO_MATCH on the name axis.

## Response format

Respond ONLY with valid JSON:
{
  "name_match": "PERFECT_MATCH" | "PARTIAL_MATCH" | "DONT_KNOW" | "NO_MATCH",
  "name_reason": "<one sentence reasoning in Polish>",
  "industry_match": "PERFECT_MATCH" | "PARTIAL_MATCH" | "DONT_KNOW" | "NO_MATCH",
  "industry_reason": "<one sentence reasoning in Polish>"
}"#;

/// Renders the user prompt for one tender.
pub fn build_user_prompt(
    profile: &CompanyProfile,
    tender: &Tender,
    org_industries: &IndustryMap,
    feedbacks: &[String],
) -> String {
    let mut prompt = String::new();

    if profile.name.is_empty() {
        prompt.push_str("## Company profile\n");
    } else {
        prompt.push_str(&format!("## Company profile: {}\n", profile.name));
    }

    if !profile.industries.is_empty() {
        prompt.push_str("\n### Company's Industries\n");
        prompt.push_str(&profile.industries.join(", "));
        prompt.push('\n');
    }

    if !profile.service_categories.is_empty() {
        prompt.push_str("\n### Company's Service categories\n");
        prompt.push_str(&bullet_list(&profile.service_categories));
        prompt.push('\n');
    }

    if !profile.target_authorities.is_empty() {
        prompt.push_str("\n### Company's Target contracting authorities\n");
        prompt.push_str(&profile.target_authorities.join(", "));
        prompt.push('\n');
    }

    prompt.push_str("\n## Tender\n");
    prompt.push_str(&format!("**Name:** {}\n", tender.name));
    prompt.push_str(&format!("**Organization:** {}", tender.organization));

    if let Some(labels) = org_industries
        .get(&tender.organization)
        .filter(|labels| !labels.is_empty())
    {
        prompt.push_str(&format!("\n**Industries:** {}", labels.join(", ")));
    }

    if !feedbacks.is_empty() {
        prompt.push_str("\n\n## User feedback on previously rejected tenders\n");
        prompt.push_str(&bullet_list(feedbacks));
    }

    prompt
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greenworks() -> CompanyProfile {
        CompanyProfile {
            name: "GreenWorks Sp. z o.o.".to_string(),
            industries: vec!["Utrzymanie zieleni".to_string()],
            service_categories: vec![
                "Koszenie trawników".to_string(),
                "Nasadzenia drzew".to_string(),
            ],
            cpv_codes: vec!["77310000-6".to_string()],
            target_authorities: vec!["Gminy".to_string(), "Powiaty".to_string()],
            primary_country: "Polska".to_string(),
        }
    }

    fn tender() -> Tender {
        Tender {
            tender_url: "https://example.com/t/1".to_string(),
            name: "Koszenie trawników w Gminie X".to_string(),
            organization: "Gmina X".to_string(),
            submission_deadline: "2026-03-01 12:00".to_string(),
            initiation_date: "2026-01-10".to_string(),
            procedure_type: None,
            source_type: String::new(),
            file_urls: vec![],
        }
    }

    #[test]
    fn test_prompt_renders_profile_and_tender() {
        let prompt = build_user_prompt(&greenworks(), &tender(), &IndustryMap::new(), &[]);

        assert!(prompt.starts_with("## Company profile: GreenWorks Sp. z o.o.\n"));
        assert!(prompt.contains("### Company's Industries\nUtrzymanie zieleni\n"));
        assert!(prompt.contains("- Koszenie trawników\n- Nasadzenia drzew"));
        assert!(prompt.contains("Gminy, Powiaty"));
        assert!(prompt.contains("**Name:** Koszenie trawników w Gminie X\n"));
        assert!(prompt.ends_with("**Organization:** Gmina X"));
        assert!(!prompt.contains("**Industries:**"));
        assert!(!prompt.contains("User feedback"));
    }

    #[test]
    fn test_prompt_includes_organization_industries() {
        let mut industries = IndustryMap::new();
        industries.insert(
            "Gmina X".to_string(),
            vec!["Administracja publiczna".to_string(), "Zieleń".to_string()],
        );

        let prompt = build_user_prompt(&greenworks(), &tender(), &industries, &[]);

        assert!(prompt.contains(
            "**Organization:** Gmina X\n**Industries:** Administracja publiczna, Zieleń"
        ));
    }

    #[test]
    fn test_feedback_section_follows_tender() {
        let feedback = vec!["za krótki termin".to_string(), "nie nasza branża".to_string()];
        let prompt = build_user_prompt(&greenworks(), &tender(), &IndustryMap::new(), &feedback);

        let tender_at = prompt.find("## Tender").unwrap();
        let feedback_at = prompt
            .find("## User feedback on previously rejected tenders")
            .unwrap();
        assert!(feedback_at > tender_at);
        assert!(prompt.ends_with("- za krótki termin\n- nie nasza branża"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let feedback = vec!["za drogo".to_string()];
        let a = build_user_prompt(&greenworks(), &tender(), &IndustryMap::new(), &feedback);
        let b = build_user_prompt(&greenworks(), &tender(), &IndustryMap::new(), &feedback);
        assert_eq!(a, b);
    }
}
