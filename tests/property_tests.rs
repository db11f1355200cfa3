/// Property-based tests using proptest
/// Tests invariants of the skip policy, tender keys, prompts and cache queries
use proptest::prelude::*;
use tenderec_api::evaluation::should_skip;
use tenderec_api::memory_store::InMemoryVerdictCache;
use tenderec_api::models::{CompanyProfile, MatchLevel, Tender, TenderKey, Verdict};
use tenderec_api::prompt::{build_user_prompt, IndustryMap};
use tenderec_api::stores::VerdictCache;

fn match_level() -> impl Strategy<Value = MatchLevel> {
    prop::sample::select(MatchLevel::ALL.to_vec())
}

fn label() -> impl Strategy<Value = String> {
    "[A-Za-zżółćęśąźń ]{1,24}".prop_map(|s| s.trim().to_string())
        .prop_filter("non-empty", |s| !s.is_empty())
}

// Skip policy
proptest! {
    #[test]
    fn skip_only_confident_irrelevance(name in match_level(), industry in match_level()) {
        let skipped = should_skip(name, industry);
        if name != MatchLevel::NoMatch {
            prop_assert!(!skipped);
        }
        if industry == MatchLevel::PerfectMatch || industry == MatchLevel::PartialMatch {
            prop_assert!(!skipped);
        }
        if name == MatchLevel::NoMatch
            && (industry == MatchLevel::NoMatch || industry == MatchLevel::DontKnow)
        {
            prop_assert!(skipped);
        }
    }

    #[test]
    fn match_level_round_trips_through_wire_name(level in match_level()) {
        prop_assert_eq!(level.as_str().parse::<MatchLevel>().unwrap(), level);
    }
}

// Tender keys
proptest! {
    #[test]
    fn tender_key_is_stable_and_fixed_width(org in "\\PC{0,40}", name in "\\PC{0,80}") {
        let key = TenderKey::new(&org, &name);
        prop_assert_eq!(key.as_str().len(), 32);
        prop_assert_eq!(key, TenderKey::new(&org, &name));
    }

    #[test]
    fn tender_key_distinguishes_organizations(
        a in "[A-Za-z ]{1,20}",
        b in "[A-Za-z ]{1,20}",
        name in "[A-Za-z ]{1,40}"
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(TenderKey::new(&a, &name), TenderKey::new(&b, &name));
    }
}

// Prompt construction
proptest! {
    #[test]
    fn prompt_mentions_every_non_empty_input(
        industries in prop::collection::vec(label(), 0..4),
        services in prop::collection::vec(label(), 0..4),
        authorities in prop::collection::vec(label(), 0..3),
        org_industries in prop::collection::vec(label(), 0..3),
        feedbacks in prop::collection::vec(label(), 0..3),
        name in label(),
        org in label()
    ) {
        let profile = CompanyProfile {
            name: "Firma".to_string(),
            industries: industries.clone(),
            service_categories: services.clone(),
            cpv_codes: vec![],
            target_authorities: authorities.clone(),
            primary_country: String::new(),
        };
        let tender = Tender {
            tender_url: String::new(),
            name: name.clone(),
            organization: org.clone(),
            submission_deadline: String::new(),
            initiation_date: String::new(),
            procedure_type: None,
            source_type: String::new(),
            file_urls: vec![],
        };
        let mut index = IndustryMap::new();
        index.insert(org.clone(), org_industries.clone());

        let prompt = build_user_prompt(&profile, &tender, &index, &feedbacks);

        let name_line = format!("**Name:** {}", name);
        let org_line = format!("**Organization:** {}", org);
        prop_assert!(prompt.contains(&name_line));
        prop_assert!(prompt.contains(&org_line));
        for item in industries.iter().chain(&authorities).chain(&org_industries) {
            prop_assert!(prompt.contains(item.as_str()));
        }
        for item in services.iter().chain(&feedbacks) {
            let bullet = format!("- {}", item);
            prop_assert!(prompt.contains(&bullet));
        }
        prop_assert_eq!(prompt.contains("### Company's Industries"), !industries.is_empty());
        prop_assert_eq!(prompt.contains("### Company's Service categories"), !services.is_empty());
        prop_assert_eq!(prompt.contains("**Industries:**"), !org_industries.is_empty());
        prop_assert_eq!(prompt.contains("## User feedback"), !feedbacks.is_empty());
    }
}

// Verdict cache queries
proptest! {
    #[test]
    fn query_returns_exactly_the_requested_levels(
        levels in prop::collection::vec((match_level(), match_level()), 1..30),
        wanted_name in match_level(),
        wanted_industry in match_level()
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let cache = InMemoryVerdictCache::new();
            for (i, (name_match, industry_match)) in levels.iter().enumerate() {
                let verdict = Verdict {
                    tender_name: format!("T{}", i),
                    organization: "Gmina X".to_string(),
                    name_match: *name_match,
                    name_reason: String::new(),
                    industry_match: *industry_match,
                    industry_reason: String::new(),
                    created_at: chrono::Utc::now(),
                };
                cache.upsert("acme", &verdict).await.unwrap();
            }

            let found = cache.query("acme", wanted_name, wanted_industry).await.unwrap();
            let expected = levels
                .iter()
                .filter(|(n, i)| *n == wanted_name && *i == wanted_industry)
                .count();

            prop_assert_eq!(found.len(), expected);
            prop_assert!(found
                .iter()
                .all(|r| r.name_match == wanted_name && r.industry_match == wanted_industry));
            Ok(())
        })?;
    }
}
