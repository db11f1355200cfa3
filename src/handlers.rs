use crate::config::Config;
use crate::errors::AppError;
use crate::models::*;
use crate::services::{CompanyService, RecommendationService};
use crate::stores::{FeedbackStore, IndustryIndex};
use crate::tender_source::TenderCatalog;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Recommendation reads and refreshes.
    pub recommendations: RecommendationService,
    /// Company profile reads and upserts.
    pub companies: CompanyService,
    /// Per-company feedback comments.
    pub feedback: Arc<dyn FeedbackStore>,
    /// Organization industry classifications.
    pub industries: Arc<dyn IndustryIndex>,
    /// The tender corpus.
    pub tenders: Arc<TenderCatalog>,
}

/// Health check endpoint.
///
/// Returns the service status, version and where recommendations are read
/// from.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "tenderec-api",
            "version": env!("CARGO_PKG_VERSION"),
            "recommendations_source": state.config.recommendations_source.to_string(),
            "tenders": state.tenders.len()
        })),
    )
}

/// GET /api/v1/companies/:company_name
pub async fn get_company(
    State(state): State<Arc<AppState>>,
    Path(company_name): Path<String>,
) -> Result<Json<StoredProfile>, AppError> {
    tracing::info!("GET company profile: '{}'", company_name);

    let profile = state.companies.get(&company_name).await?;
    Ok(Json(profile))
}

/// PUT /api/v1/companies/:company_name
///
/// Extracts a structured profile from the description with the LLM and saves
/// it, replacing any previous profile.
pub async fn upsert_company(
    State(state): State<Arc<AppState>>,
    Path(company_name): Path<String>,
    Json(payload): Json<UpsertCompanyRequest>,
) -> Result<(StatusCode, Json<StoredProfile>), AppError> {
    tracing::info!("PUT company profile: '{}'", company_name);

    let profile = state
        .companies
        .upsert_from_description(&company_name, &payload.description)
        .await?;

    Ok((StatusCode::CREATED, Json(profile)))
}

/// GET /api/v1/tenders/:tender_name
///
/// Looks a tender up in the corpus. Names shared by several organizations
/// need `?organization=`.
pub async fn get_tender(
    State(state): State<Arc<AppState>>,
    Path(tender_name): Path<String>,
    Query(params): Query<TenderLookupParams>,
) -> Result<Json<TenderResponse>, AppError> {
    tracing::info!("GET tender: '{}'", tender_name);

    let organization = params
        .organization
        .as_deref()
        .map(str::trim)
        .filter(|org| !org.is_empty());

    let tender = state.tenders.resolve(&tender_name, organization)?;
    Ok(Json(TenderResponse::from(tender.clone())))
}

/// GET /api/v1/organizations/industries
pub async fn list_organization_industries(
    State(state): State<Arc<AppState>>,
) -> Result<Json<OrganizationsResponse>, AppError> {
    tracing::info!("GET organization industries");

    let organizations = state.industries.list().await?;
    tracing::info!("Returning industries for {} organizations", organizations.len());

    Ok(Json(OrganizationsResponse { organizations }))
}

/// PUT /api/v1/organizations/:organization/industries
///
/// Replaces the organization's industries. Between one and three non-blank
/// industries, most relevant first.
pub async fn upsert_organization_industries(
    State(state): State<Arc<AppState>>,
    Path(organization): Path<String>,
    Json(payload): Json<UpsertIndustriesRequest>,
) -> Result<Json<OrganizationClassification>, AppError> {
    tracing::info!("PUT industries for organization: '{}'", organization);

    let count = payload.industries.len();
    if count == 0 || count > MAX_ORGANIZATION_INDUSTRIES {
        return Err(AppError::BadRequest(format!(
            "expected 1 to {} industries, got {}",
            MAX_ORGANIZATION_INDUSTRIES, count
        )));
    }
    if payload.industries.iter().any(|i| i.industry.trim().is_empty()) {
        return Err(AppError::BadRequest("industry cannot be empty".to_string()));
    }

    let classification = OrganizationClassification {
        organization,
        industries: payload.industries,
    };
    state.industries.upsert(&classification).await?;

    Ok(Json(classification))
}

/// GET /api/v1/tenders/recommendations
///
/// Lists verdicts for a company filtered by exact name and industry match
/// levels. Both levels default to `PERFECT_MATCH`, the company to `greenworks`.
pub async fn list_recommendations(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecommendationQueryParams>,
) -> Result<Json<RecommendationsResponse>, AppError> {
    tracing::info!(
        "GET /tenders/recommendations - company={}, name_match={}, industry_match={}",
        params.company,
        params.name_match,
        params.industry_match
    );

    let recommendations = state
        .recommendations
        .get(&params.company, params.name_match, params.industry_match)
        .await?;

    tracing::info!(
        "Returning {} recommendations for '{}'",
        recommendations.len(),
        params.company
    );

    Ok(Json(RecommendationsResponse {
        company: params.company,
        recommendations,
    }))
}

/// POST /api/v1/tenders/recommendations/:company/:tender_name/refresh
///
/// Re-evaluates one tender with the company's current feedback and returns the
/// fresh verdict.
pub async fn refresh_recommendation(
    State(state): State<Arc<AppState>>,
    Path((company, tender_name)): Path<(String, String)>,
    Query(params): Query<TenderLookupParams>,
) -> Result<Json<Verdict>, AppError> {
    tracing::info!(
        "POST /tenders/recommendations/{}/{}/refresh",
        company,
        tender_name
    );

    let organization = params
        .organization
        .as_deref()
        .map(str::trim)
        .filter(|org| !org.is_empty());

    let verdict = state
        .recommendations
        .refresh(&company, &tender_name, organization)
        .await?;

    Ok(Json(verdict))
}

/// GET /api/v1/feedback/:company_name
pub async fn get_feedback(
    State(state): State<Arc<AppState>>,
    Path(company_name): Path<String>,
) -> Result<Json<FeedbackListResponse>, AppError> {
    tracing::info!("GET feedbacks for company: '{}'", company_name);

    let feedbacks = state.feedback.list(&company_name).await?;

    Ok(Json(FeedbackListResponse {
        company_name,
        feedbacks,
    }))
}

/// POST /api/v1/feedback/:company_name
///
/// Stores a feedback comment. Blank comments are rejected.
pub async fn create_feedback(
    State(state): State<Arc<AppState>>,
    Path(company_name): Path<String>,
    Json(payload): Json<CreateFeedbackRequest>,
) -> Result<(StatusCode, Json<Feedback>), AppError> {
    tracing::info!("POST feedback for company: '{}'", company_name);

    if payload.feedback_comment.trim().is_empty() {
        return Err(AppError::BadRequest(
            "feedback_comment cannot be empty".to_string(),
        ));
    }

    let feedback = state
        .feedback
        .append(&company_name, &payload.feedback_comment)
        .await?;

    Ok((StatusCode::CREATED, Json(feedback)))
}

/// API routes without state or middleware; the caller adds rate limiting.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/v1/tenders/recommendations",
            get(list_recommendations),
        )
        .route(
            "/api/v1/tenders/recommendations/:company/:tender_name/refresh",
            post(refresh_recommendation),
        )
        .route(
            "/api/v1/tenders/:tender_name",
            get(get_tender),
        )
        .route(
            "/api/v1/companies/:company_name",
            get(get_company).put(upsert_company),
        )
        .route(
            "/api/v1/organizations/industries",
            get(list_organization_industries),
        )
        .route(
            "/api/v1/organizations/:organization/industries",
            put(upsert_organization_industries),
        )
        .route(
            "/api/v1/feedback/:company_name",
            get(get_feedback).post(create_feedback),
        )
}

/// Health check plus API routes, bound to `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(api_routes())
        .with_state(state)
}
