//! Gorse recommender client
//!
//! Talks to the Gorse REST API under `{base}/api/`. List reads are optionally
//! cached in Redis; a cache failure degrades to a direct call.

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{
        recommendation::GorseRecommendation, RecommendationWindow, RecommendedItem,
        RecommenderFeedback, RecommenderItem, RecommenderUser,
    },
    services::recommender::Recommender,
};
use reqwest::{Client as HttpClient, RequestBuilder};

#[derive(Clone)]
pub struct GorseRecommender {
    http_client: HttpClient,
    api_url: String,
    api_key: String,
    cache: Option<Cache>,
    cache_ttl: u64,
}

impl GorseRecommender {
    pub fn new(api_url: &str, api_key: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_url: format!("{}/api/", api_url.trim_end_matches('/')),
            api_key,
            cache: None,
            cache_ttl: 0,
        }
    }

    /// Serves list reads through `cache` for `ttl` seconds
    pub fn with_cache(mut self, cache: Cache, ttl: u64) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.api_url, endpoint)
    }

    /// Sends a request and turns any non-2xx status into an error
    async fn send(&self, request: RequestBuilder) -> AppResult<reqwest::Response> {
        let response = request.header("X-API-Key", &self.api_key).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Gorse API returned status {}: {}",
                status, body
            )));
        }

        Ok(response)
    }

    async fn fetch_list(
        &self,
        endpoint: &str,
        window: RecommendationWindow,
    ) -> AppResult<Vec<RecommendedItem>> {
        let response = self
            .send(
                self.http_client
                    .get(self.url(endpoint))
                    .query(&[("n", window.limit), ("offset", window.skip)]),
            )
            .await?;

        let entries: Vec<GorseRecommendation> = response.json().await?;

        tracing::debug!(
            endpoint = endpoint,
            count = entries.len(),
            "Fetched recommendation list"
        );

        Ok(entries.into_iter().map(Into::into).collect())
    }

    async fn fetch_cached(
        &self,
        cache: &Cache,
        key: CacheKey,
        endpoint: &str,
        window: RecommendationWindow,
    ) -> AppResult<Vec<RecommendedItem>> {
        cached!(cache, key, self.cache_ttl, self.fetch_list(endpoint, window))
    }

    async fn read_list(
        &self,
        key: CacheKey,
        endpoint: String,
        window: RecommendationWindow,
    ) -> AppResult<Vec<RecommendedItem>> {
        if let Some(cache) = &self.cache {
            match self.fetch_cached(cache, key.clone(), &endpoint, window).await {
                Err(AppError::Cache(e)) => {
                    tracing::warn!(key = %key, error = %e, "Recommendation cache unavailable");
                }
                result => return result,
            }
        }

        self.fetch_list(&endpoint, window).await
    }
}

/// Appends the optional category segment used by every list endpoint
fn list_endpoint(base: &str, category: Option<i32>) -> String {
    match category {
        Some(category) => format!("{}/{}", base, category),
        None => base.to_string(),
    }
}

#[async_trait::async_trait]
impl Recommender for GorseRecommender {
    async fn insert_user(&self, user: &RecommenderUser) -> AppResult<()> {
        self.send(self.http_client.post(self.url("user")).json(user))
            .await?;
        Ok(())
    }

    async fn update_user(&self, user: &RecommenderUser) -> AppResult<()> {
        let endpoint = format!("user/{}", user.user_id);
        self.send(self.http_client.patch(self.url(&endpoint)).json(user))
            .await?;
        Ok(())
    }

    async fn remove_user(&self, user_id: i32) -> AppResult<()> {
        let endpoint = format!("user/{}", user_id);
        self.send(self.http_client.delete(self.url(&endpoint)))
            .await?;
        Ok(())
    }

    async fn insert_item(&self, item: &RecommenderItem) -> AppResult<()> {
        self.send(self.http_client.post(self.url("item")).json(item))
            .await?;
        Ok(())
    }

    async fn update_item(&self, item: &RecommenderItem) -> AppResult<()> {
        let endpoint = format!("item/{}", item.item_id);
        self.send(self.http_client.patch(self.url(&endpoint)).json(item))
            .await?;
        Ok(())
    }

    async fn remove_item(&self, item_id: i32) -> AppResult<()> {
        let endpoint = format!("item/{}", item_id);
        self.send(self.http_client.delete(self.url(&endpoint)))
            .await?;
        Ok(())
    }

    async fn add_item_category(&self, item_id: i32, category: i32) -> AppResult<()> {
        let endpoint = format!("item/{}/category/{}", item_id, category);
        self.send(self.http_client.put(self.url(&endpoint))).await?;
        Ok(())
    }

    async fn remove_item_category(&self, item_id: i32, category: i32) -> AppResult<()> {
        let endpoint = format!("item/{}/category/{}", item_id, category);
        self.send(self.http_client.delete(self.url(&endpoint)))
            .await?;
        Ok(())
    }

    async fn insert_feedback(&self, feedback: &[RecommenderFeedback]) -> AppResult<()> {
        self.send(self.http_client.put(self.url("feedback")).json(feedback))
            .await?;
        Ok(())
    }

    async fn remove_feedback(
        &self,
        feedback_type: &str,
        user_id: i32,
        item_id: i32,
    ) -> AppResult<()> {
        let endpoint = format!(
            "feedback/{}/{}/{}",
            feedback_type.to_lowercase(),
            user_id,
            item_id
        );
        self.send(self.http_client.delete(self.url(&endpoint)))
            .await?;
        Ok(())
    }

    async fn latest(&self, window: RecommendationWindow) -> AppResult<Vec<RecommendedItem>> {
        let endpoint = list_endpoint("latest", window.category);
        self.read_list(CacheKey::Latest(window), endpoint, window)
            .await
    }

    async fn popular(&self, window: RecommendationWindow) -> AppResult<Vec<RecommendedItem>> {
        let endpoint = list_endpoint("popular", window.category);
        self.read_list(CacheKey::Popular(window), endpoint, window)
            .await
    }

    async fn recommended(
        &self,
        user_id: i32,
        window: RecommendationWindow,
    ) -> AppResult<Vec<RecommendedItem>> {
        let endpoint = list_endpoint(&format!("recommend/{}", user_id), window.category);
        self.read_list(CacheKey::Recommended(user_id, window), endpoint, window)
            .await
    }

    async fn neighbors(
        &self,
        item_id: i32,
        window: RecommendationWindow,
    ) -> AppResult<Vec<RecommendedItem>> {
        let endpoint = list_endpoint(&format!("item/{}/neighbors", item_id), window.category);
        self.read_list(CacheKey::Neighbors(item_id, window), endpoint, window)
            .await
    }

    fn name(&self) -> &'static str {
        "gorse"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        routing::{get, put},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::collections::HashMap;

    /// Serves a minimal Gorse API on an ephemeral port
    async fn spawn_gorse(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn window(category: Option<i32>) -> RecommendationWindow {
        RecommendationWindow {
            category,
            skip: 5,
            limit: 2,
        }
    }

    #[test]
    fn test_list_endpoint() {
        assert_eq!(list_endpoint("latest", None), "latest");
        assert_eq!(list_endpoint("latest", Some(3)), "latest/3");
        assert_eq!(
            list_endpoint("item/9/neighbors", Some(1)),
            "item/9/neighbors/1"
        );
    }

    #[test]
    fn test_base_url_is_normalised() {
        let gorse = GorseRecommender::new("http://gorse:8087/", String::new());
        assert_eq!(gorse.url("latest"), "http://gorse:8087/api/latest");
    }

    #[tokio::test]
    async fn test_latest_sends_paging_and_parses_scores() {
        let router = Router::new().route(
            "/api/latest/4",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("n").map(String::as_str), Some("2"));
                assert_eq!(params.get("offset").map(String::as_str), Some("5"));
                Json(json!([{"Id": "8", "Score": 1.5}, {"Id": "3", "Score": 0.5}]))
            }),
        );
        let base = spawn_gorse(router).await;
        let gorse = GorseRecommender::new(&base, "secret".into());

        let items = gorse.latest(window(Some(4))).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_id, "8");
        assert_eq!(items[0].score, Some(1.5));
    }

    #[tokio::test]
    async fn test_recommended_parses_bare_ids() {
        let router = Router::new().route(
            "/api/recommend/:user_id",
            get(|Path(user_id): Path<i32>| async move {
                assert_eq!(user_id, 12);
                Json(json!(["4", "1"]))
            }),
        );
        let base = spawn_gorse(router).await;
        let gorse = GorseRecommender::new(&base, String::new());

        let items = gorse.recommended(12, window(None)).await.unwrap();

        assert_eq!(items[0].item_id, "4");
        assert_eq!(items[1].score, None);
    }

    #[tokio::test]
    async fn test_api_key_header_and_error_status() {
        let router = Router::new().route(
            "/api/feedback",
            put(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["x-api-key"], "secret");
                assert_eq!(body[0]["FeedbackType"], "favorite");
                (StatusCode::INTERNAL_SERVER_ERROR, "boom")
            }),
        );
        let base = spawn_gorse(router).await;
        let gorse = GorseRecommender::new(&base, "secret".into());

        let result = gorse
            .insert_feedback(&[RecommenderFeedback {
                feedback_type: "favorite".into(),
                user_id: "1".into(),
                item_id: "2".into(),
                timestamp: "2022-01-05T07:49:55.578Z".into(),
                comment: String::new(),
            }])
            .await;

        match result {
            Err(AppError::ExternalApi(msg)) => assert!(msg.contains("500")),
            other => panic!("expected ExternalApi error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_http_error() {
        let gorse = GorseRecommender::new("http://127.0.0.1:1", String::new());
        let result = gorse.remove_item(1).await;
        assert!(matches!(result, Err(AppError::HttpClient(_))));
    }
}
