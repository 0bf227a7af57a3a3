//! HTTP document store client.
//!
//! Collections live at `{base}/{collection}`; documents at
//! `{base}/{collection}/{id}`. Realtime updates are emulated by polling.
//!
//! Client errors other than auth, timeout and throttling come back as
//! [`Error::Rejected`]: replaying the same request can never succeed.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tokio::task::JoinHandle;

use super::{ChangeCallback, RemoteDataProvider, SubscriptionHandle};
use crate::models::{Entity, EntityId};
use crate::util::{compact_text, is_http_url, normalize_text_option};
use crate::{Error, Result};

/// Remote provider backed by a JSON REST API
pub struct RestRemote<E> {
    base_url: String,
    client: reqwest::Client,
    poll_interval: Duration,
    subscriptions: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
    next_handle: AtomicU64,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> RestRemote<E> {
    /// Build a client for `base_url` with a per-request `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    /// Share one HTTP client between several providers.
    pub fn with_client(base_url: String, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            poll_interval: Duration::from_secs(30),
            subscriptions: Arc::default(),
            next_handle: AtomicU64::new(1),
            _entity: PhantomData,
        }
    }

    /// How often subscriptions poll for changes.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn collection_url(&self) -> String {
        collection_url::<E>(&self.base_url)
    }

    fn document_url(&self, id: &EntityId) -> String {
        format!(
            "{}/{}",
            self.collection_url(),
            urlencoding::encode(id.as_str())
        )
    }
}

#[async_trait]
impl<E: Entity> RemoteDataProvider<E> for RestRemote<E> {
    async fn fetch_all(&self, user_id: &str) -> Result<Vec<E>> {
        fetch_collection(&self.client, &self.collection_url(), user_id).await
    }

    async fn create(&self, entity: &E) -> Result<()> {
        let response = self
            .client
            .post(self.collection_url())
            .json(entity)
            .send()
            .await?;
        // A replayed create whose first response was lost.
        if response.status() == StatusCode::CONFLICT {
            return Ok(());
        }
        check_status(response, "create").await.map(drop)
    }

    async fn update(&self, entity: &E) -> Result<()> {
        let response = self
            .client
            .put(self.document_url(entity.id()))
            .json(entity)
            .send()
            .await?;
        check_status(response, "update").await.map(drop)
    }

    async fn delete(&self, id: &EntityId) -> Result<()> {
        let response = self.client.delete(self.document_url(id)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response, "delete").await.map(drop)
    }

    async fn subscribe(
        &self,
        user_id: &str,
        on_change: ChangeCallback<E>,
    ) -> Result<SubscriptionHandle> {
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        let client = self.client.clone();
        let url = self.collection_url();
        let user_id = user_id.to_string();
        let poll_interval = self.poll_interval;

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            let mut last_seen: Option<String> = None;
            loop {
                interval.tick().await;
                let entities = match fetch_collection::<E>(&client, &url, &user_id).await {
                    Ok(entities) => entities,
                    Err(error) => {
                        tracing::debug!("Poll of {url} failed: {error}");
                        continue;
                    }
                };
                let fingerprint = serde_json::to_string(&entities).unwrap_or_default();
                if last_seen.as_deref() != Some(fingerprint.as_str()) {
                    last_seen = Some(fingerprint);
                    on_change(entities);
                }
            }
        });

        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, task);
        Ok(SubscriptionHandle::new(id))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        let task = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id());
        if let Some(task) = task {
            task.abort();
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}

impl<E> Drop for RestRemote<E> {
    fn drop(&mut self) {
        let tasks = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for task in tasks.values() {
            task.abort();
        }
    }
}

fn collection_url<E: Entity>(base_url: &str) -> String {
    format!("{base_url}/{}", E::KIND.collection())
}

async fn fetch_collection<E: Entity>(
    client: &reqwest::Client,
    url: &str,
    user_id: &str,
) -> Result<Vec<E>> {
    let response = client
        .get(format!("{url}?user_id={}", urlencoding::encode(user_id)))
        .header("Accept", "application/json")
        .send()
        .await?;
    let response = check_status(response, "fetch").await?;
    Ok(response.json::<Vec<E>>().await?)
}

async fn check_status(response: Response, operation: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::AuthenticationRequired);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_failure(status, operation, &body))
}

fn classify_failure(status: StatusCode, operation: &str, body: &str) -> Error {
    let message = format!("{operation} failed: {}", parse_api_error(status, body));
    let transient = matches!(
        status,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS
    );
    if status.is_client_error() && !transient {
        Error::Rejected(message)
    } else {
        Error::Remote(message)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{trimmed} ({})", status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config("remote base URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(
            "remote base URL must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Assignment, CalendarEvent};

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("api.example.com".to_string()).is_err());
        assert_eq!(
            normalize_base_url(" https://api.example.com/v1/ ".to_string()).unwrap(),
            "https://api.example.com/v1"
        );
    }

    #[test]
    fn urls_follow_collection_layout() {
        let remote =
            RestRemote::<CalendarEvent>::new("https://api.example.com", Duration::from_secs(10))
                .unwrap();
        assert_eq!(
            remote.collection_url(),
            "https://api.example.com/calendar_events"
        );
        assert_eq!(
            remote.document_url(&EntityId::from("a b/c")),
            "https://api.example.com/calendar_events/a%20b%2Fc"
        );
        assert_eq!(
            collection_url::<Assignment>("http://localhost:5000"),
            "http://localhost:5000/assignments"
        );
    }

    #[test]
    fn client_errors_are_permanent_rejections() {
        let missing = classify_failure(StatusCode::NOT_FOUND, "update", "");
        assert!(missing.is_rejected());
        assert_eq!(missing.to_string(), "Remote rejected: update failed: HTTP 404");
        assert!(classify_failure(StatusCode::UNPROCESSABLE_ENTITY, "create", "{}").is_rejected());

        assert!(classify_failure(StatusCode::TOO_MANY_REQUESTS, "update", "").is_remote());
        assert!(classify_failure(StatusCode::REQUEST_TIMEOUT, "update", "").is_remote());
        assert!(classify_failure(StatusCode::SERVICE_UNAVAILABLE, "fetch", "").is_remote());
    }

    #[test]
    fn parse_api_error_prefers_message_field() {
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, r#"{"message":"bad title"}"#),
            "bad title (400)"
        );
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, "  "),
            "HTTP 502"
        );
        assert_eq!(
            parse_api_error(StatusCode::INTERNAL_SERVER_ERROR, "oops"),
            "oops (500)"
        );
    }
}
