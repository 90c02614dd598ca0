//! HTTP adapter for the hosted entity API.
//!
//! Entities are addressed as `{base}/apps/{app_id}/entities/{Kind}[/{id}]`.
//! Conditional updates send the last-read revision in `If-Match`.

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{Entity, EntityKind, Fields, Query, Store, StoreError, StoreFault, StoreOp};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 500;

/// Clone is cheap - reqwest::Client shares its connection pool.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    app_id: String,
    token: Option<String>,
}

impl RestStore {
    pub fn new(base_url: &str, app_id: &str) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| StoreError::new(EntityKind::User, StoreOp::List, None, e.into()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
            token: None,
        })
    }

    /// Same client and connection pool, authenticated with `token`.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            app_id: self.app_id.clone(),
            token: Some(token),
        }
    }

    fn collection_url(&self, kind: EntityKind) -> String {
        format!("{}/apps/{}/entities/{}", self.base_url, self.app_id, kind)
    }

    fn record_url(&self, kind: EntityKind, id: &str) -> String {
        format!("{}/{}", self.collection_url(kind), id)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request, backing off on 429 and mapping error statuses.
    async fn send(
        &self,
        kind: EntityKind,
        op: StoreOp,
        id: Option<&str>,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response, StoreError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build()
                .send()
                .await
                .map_err(|e| StoreError::new(kind, op, id, e.into()))?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if status.as_u16() == 429 && retries < MAX_RATE_LIMIT_RETRIES {
                retries += 1;
                warn!(kind = %kind, op = %op, retry = retries, backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::new(kind, op, id, StoreFault::from_status(status, &body)));
        }
    }

    async fn decode<T: DeserializeOwned>(
        kind: EntityKind,
        op: StoreOp,
        id: Option<&str>,
        response: Response,
    ) -> Result<T, StoreError> {
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::new(kind, op, id, e.into()))?;
        serde_json::from_str(&text).map_err(|e| StoreError::new(kind, op, id, e.into()))
    }

    async fn fetch_list<E: Entity>(
        &self,
        op: StoreOp,
        params: Vec<(&'static str, String)>,
    ) -> Result<Vec<E>, StoreError> {
        let url = self.collection_url(E::KIND);
        let response = self
            .send(E::KIND, op, None, || {
                self.request(Method::GET, &url).query(&params)
            })
            .await?;
        let items: Vec<E> = Self::decode(E::KIND, op, None, response).await?;
        debug!(kind = %E::KIND, op = %op, count = items.len(), "Fetched list");
        Ok(items)
    }
}

impl Store for RestStore {
    async fn list<E: Entity>(&self) -> Result<Vec<E>, StoreError> {
        self.fetch_list(StoreOp::List, Vec::new()).await
    }

    async fn list_sorted<E: Entity>(&self, sort_key: &str) -> Result<Vec<E>, StoreError> {
        self.fetch_list(StoreOp::List, vec![("sort", sort_key.to_string())])
            .await
    }

    async fn get<E: Entity>(&self, id: &str) -> Result<E, StoreError> {
        let url = self.record_url(E::KIND, id);
        let response = self
            .send(E::KIND, StoreOp::Get, Some(id), || {
                self.request(Method::GET, &url)
            })
            .await?;
        Self::decode(E::KIND, StoreOp::Get, Some(id), response).await
    }

    async fn filter<E: Entity>(&self, query: &Query) -> Result<Vec<E>, StoreError> {
        self.fetch_list(StoreOp::Filter, vec![("q", query.to_json().to_string())])
            .await
    }

    async fn create<E: Entity>(&self, fields: Fields) -> Result<E, StoreError> {
        let url = self.collection_url(E::KIND);
        let response = self
            .send(E::KIND, StoreOp::Create, None, || {
                self.request(Method::POST, &url).json(&fields)
            })
            .await?;
        Self::decode(E::KIND, StoreOp::Create, None, response).await
    }

    async fn update<E: Entity>(
        &self,
        id: &str,
        fields: Fields,
        expected_revision: Option<&str>,
    ) -> Result<E, StoreError> {
        let url = self.record_url(E::KIND, id);
        let response = self
            .send(E::KIND, StoreOp::Update, Some(id), || {
                let builder = self.request(Method::PUT, &url).json(&fields);
                match expected_revision {
                    Some(revision) => builder.header(header::IF_MATCH, revision),
                    None => builder,
                }
            })
            .await?;
        Self::decode(E::KIND, StoreOp::Update, Some(id), response).await
    }

    async fn delete<E: Entity>(&self, id: &str) -> Result<(), StoreError> {
        let url = self.record_url(E::KIND, id);
        self.send(E::KIND, StoreOp::Delete, Some(id), || {
            self.request(Method::DELETE, &url)
        })
        .await?;
        Ok(())
    }
}
