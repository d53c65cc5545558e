use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod error;
pub mod handlers;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/api/search", get(handlers::search))
        .route("/api/suggestions", get(handlers::suggestions))
        .route("/api/ask", post(handlers::ask))
        .route("/api/articles/trending", get(handlers::trending))
        .route("/api/articles/high-trust", get(handlers::high_trust))
        .route("/api/articles/:id", get(handlers::get_article))
        .route("/api/articles/:id/related", get(handlers::related_articles))
        .route("/api/articles/:id/engagement", post(handlers::record_engagement))
        .route("/api/stats/categories", get(handlers::category_stats))
        .route("/api/ingest", post(handlers::trigger_ingestion))
        .route("/api/ingest/status", get(handlers::ingestion_status))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(Arc::new(state))
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(state: AppState, addr: SocketAddr) -> nt_core::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "🌐 web server listening");
    axum::serve(listener, create_app(state)).await?;
    Ok(())
}

pub mod prelude {
    pub use crate::{create_app, serve, AppState};
    pub use nt_core::{Article, Error, Result};
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use nt_core::{Article, ArticleDraft, ArticleStore, Category, Enrichment, Source, TrustScore};
    use nt_inference::models::DummyModel;
    use nt_ingest::{HttpFeedFetcher, IngestConfig, Ingestor};
    use nt_search::HybridSearchEngine;
    use nt_storage::InMemoryStorage;
    use serde_json::Value;
    use tower::ServiceExt;

    fn article(title: &str, overall: u8) -> Article {
        let draft = ArticleDraft {
            url: format!("https://example.com/{}", title.replace(' ', "-")),
            title: title.to_string(),
            content: format!("{} explained.", title),
            author: None,
            published_at: Some(Utc::now()),
            source: Source::rss("Example", "https://example.com/feed"),
            source_categories: vec![],
        };
        let mut article = draft.into_article(Enrichment::default(), Utc::now());
        article.trust = TrustScore::uniform(overall);
        article.category = Category::Energy;
        article
    }

    async fn app(articles: &[Article]) -> Router {
        let store = Arc::new(InMemoryStorage::new());
        for article in articles {
            store.insert_article(article).await.unwrap();
        }
        let model = Arc::new(DummyModel::new());
        let search = Arc::new(HybridSearchEngine::new(store.clone(), model.clone()));
        let ingestor = Arc::new(Ingestor::new(
            store,
            model,
            Arc::new(HttpFeedFetcher::new().unwrap()),
            vec![],
            IngestConfig::default(),
        ));
        create_app(AppState::new(search, ingestor))
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_search_endpoint() {
        let solar = article("Solar capacity doubles", 80);
        let app = app(&[solar.clone()]).await;

        let (status, body) = call(app.clone(), get("/api/search?q=solar&limit=5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["results"][0]["article"]["id"], solar.id.to_string());

        let (status, _) = call(app, get("/api/search?q=%20")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_article_lookup_and_engagement() {
        let a = article("Wind farm approved", 70);
        let app = app(&[a.clone()]).await;

        let uri = format!("/api/articles/{}", a.id);
        let (status, body) = call(app.clone(), get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Wind farm approved");

        let (status, _) = call(
            app.clone(),
            post_json(&format!("{}/engagement", uri), serde_json::json!({ "kind": "view" })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = call(app.clone(), get(&uri)).await;
        assert_eq!(body["engagement"]["views"], 1);

        let (status, _) = call(app.clone(), get("/api/articles/not-an-id")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = format!("/api/articles/{}", nt_core::ArticleId::new());
        let (status, _) = call(app, get(&missing)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_listings_and_stats() {
        let app = app(&[article("Grid upgrade", 90), article("Battery recall", 50)]).await;

        let (status, body) = call(app.clone(), get("/api/articles/high-trust")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let (_, body) = call(app.clone(), get("/api/articles/trending?category=energy")).await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let (status, body) =
            call(app.clone(), get("/api/articles/trending?days=1000000000")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));

        let (_, body) = call(app, get("/api/stats/categories")).await;
        assert_eq!(body[0]["category"], "energy");
        assert_eq!(body[0]["count"], 2);
    }

    #[tokio::test]
    async fn test_manual_ingestion_and_status() {
        let app = app(&[]).await;

        let (status, body) =
            call(app.clone(), post_json("/api/ingest?wait=true", Value::Null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["trigger"], "manual");

        let (status, body) = call(app, get("/api/ingest/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ingestionCount"], 1);
        assert_eq!(body["isRunning"], false);
    }

    #[tokio::test]
    async fn test_ask_endpoint() {
        let app = app(&[article("Nuclear plant restarts", 75)]).await;
        let (status, body) = call(
            app,
            post_json("/api/ask", serde_json::json!({ "question": "nuclear" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["answer"].as_str().is_some());
        assert_eq!(body["sources"].as_array().map(Vec::len), Some(1));
    }
}
