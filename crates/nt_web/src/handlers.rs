use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use nt_core::{Article, ArticleId, Category, EngagementKind, SearchFilters, Sentiment};
use nt_ingest::{IngestionStatus, Trigger};
use nt_search::{
    Answer, ScoreWeights, SearchOptions, SearchResults, DEFAULT_TRENDING_DAYS, MAX_TRENDING_DAYS,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

fn page_size(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

fn trending_window(days: Option<i64>) -> i64 {
    days.unwrap_or(DEFAULT_TRENDING_DAYS).clamp(1, MAX_TRENDING_DAYS)
}

fn parse_id(raw: &str) -> ApiResult<ArticleId> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid article id: {}", raw)))
}

// --- Query structs ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    q: String,
    limit: Option<usize>,
    skip: Option<usize>,
    min_trust_score: Option<u8>,
    keyword_weight: Option<f64>,
    semantic_weight: Option<f64>,
    trust_weight: Option<f64>,
    category: Option<Category>,
    source: Option<String>,
    company: Option<String>,
    industry: Option<String>,
    date_from: Option<DateTime<Utc>>,
    date_to: Option<DateTime<Utc>>,
    sentiment: Option<Sentiment>,
}

impl SearchParams {
    fn options(&self) -> SearchOptions {
        let defaults = ScoreWeights::default();
        SearchOptions {
            limit: page_size(self.limit),
            skip: self.skip.unwrap_or(0),
            filters: SearchFilters {
                category: self.category,
                source: self.source.clone(),
                company: self.company.clone(),
                industry: self.industry.clone(),
                date_from: self.date_from,
                date_to: self.date_to,
                sentiment: self.sentiment,
            },
            min_trust: self.min_trust_score.unwrap_or(0),
            weights: ScoreWeights {
                keyword: self.keyword_weight.unwrap_or(defaults.keyword),
                semantic: self.semantic_weight.unwrap_or(defaults.semantic),
                trust: self.trust_weight.unwrap_or(defaults.trust),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    limit: Option<usize>,
    days: Option<i64>,
    category: Option<Category>,
    source: Option<String>,
    company: Option<String>,
    industry: Option<String>,
    sentiment: Option<Sentiment>,
}

impl ListParams {
    fn filters(&self) -> SearchFilters {
        SearchFilters {
            category: self.category,
            source: self.source.clone(),
            company: self.company.clone(),
            industry: self.industry.clone(),
            sentiment: self.sentiment,
            ..SearchFilters::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionParams {
    q: String,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct EngagementBody {
    kind: EngagementKind,
}

#[derive(Debug, Deserialize)]
pub struct AskBody {
    question: String,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngestParams {
    /// Block until the run finishes and return its report.
    #[serde(default)]
    wait: bool,
}

#[derive(Debug, Serialize)]
pub struct CategoryCount {
    category: Category,
    count: u64,
}

// --- Handlers ---

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResults>> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query parameter `q` is required".to_string()));
    }
    let results = state.search.search(query, &params.options()).await?;
    Ok(Json(results))
}

pub async fn trending(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<Article>>> {
    let articles = state
        .search
        .get_trending_articles(
            page_size(params.limit),
            &params.filters(),
            trending_window(params.days),
        )
        .await?;
    Ok(Json(articles))
}

pub async fn high_trust(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<Article>>> {
    let articles = state
        .search
        .get_high_trust_articles(page_size(params.limit), &params.filters())
        .await?;
    Ok(Json(articles))
}

pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Article>> {
    let article = state.search.get_article(parse_id(&id)?).await?;
    Ok(Json(article))
}

pub async fn related_articles(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Vec<Article>>> {
    let limit = params.limit.unwrap_or(5).clamp(1, MAX_LIMIT);
    let articles = state.search.get_related_articles(parse_id(&id)?, limit).await?;
    Ok(Json(articles))
}

pub async fn record_engagement(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<EngagementBody>,
) -> ApiResult<StatusCode> {
    state.search.update_engagement(parse_id(&id)?, body.kind).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn suggestions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestionParams>,
) -> ApiResult<Json<Vec<String>>> {
    let limit = params.limit.unwrap_or(10).clamp(1, MAX_LIMIT);
    Ok(Json(state.search.get_suggestions(&params.q, limit).await?))
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AskBody>,
) -> ApiResult<Json<Answer>> {
    let question = body.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }
    let limit = body.limit.unwrap_or(5).clamp(1, 20);
    Ok(Json(state.search.ask(question, limit).await?))
}

pub async fn category_stats(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<CategoryCount>>> {
    let counts = state
        .search
        .category_counts()
        .await?
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect();
    Ok(Json(counts))
}

pub async fn trigger_ingestion(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IngestParams>,
) -> ApiResult<Response> {
    if params.wait {
        return match state.ingestor.run(Trigger::Manual).await {
            Some(report) => Ok(Json(report).into_response()),
            None => Err(ApiError::Conflict("ingestion already running".to_string())),
        };
    }

    if state.ingestor.is_running() {
        return Err(ApiError::Conflict("ingestion already running".to_string()));
    }
    let ingestor = state.ingestor.clone();
    tokio::spawn(async move {
        if ingestor.run(Trigger::Manual).await.is_none() {
            info!("manual ingestion lost the race to another run");
        }
    });
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "started" }))).into_response())
}

pub async fn ingestion_status(State(state): State<Arc<AppState>>) -> Json<IngestionStatus> {
    Json(state.ingestor.status().await)
}
