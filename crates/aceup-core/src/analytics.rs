//! Fire-and-forget analytics sinks.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

/// Event properties, ordered for stable log output.
pub type EventProperties = BTreeMap<String, Value>;

/// Receives product analytics events. Implementations must not block and
/// must never fail the caller.
pub trait AnalyticsSink: Send + Sync {
    fn track(&self, event: &str, properties: EventProperties);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    fn track(&self, _event: &str, _properties: EventProperties) {}
}

/// Emits each event as a structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn track(&self, event: &str, properties: EventProperties) {
        let properties = serde_json::to_string(&properties).unwrap_or_default();
        tracing::info!(target: "aceup::analytics", name = event, %properties, "Analytics event");
    }
}

#[derive(Debug, Serialize)]
struct EventPayload<'a> {
    event: &'a str,
    properties: EventProperties,
    timestamp: i64,
}

/// Posts events to `{base}/api/events` on a background task.
#[derive(Debug, Clone)]
pub struct HttpAnalytics {
    endpoint: String,
    client: reqwest::Client,
    in_flight: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl HttpAnalytics {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = normalize_text_option(Some(base_url.into()))
            .filter(|url| is_http_url(url))
            .ok_or_else(|| {
                Error::Config("analytics URL must include http:// or https://".to_string())
            })?;
        Ok(Self {
            endpoint: format!("{}/api/events", base_url.trim_end_matches('/')),
            client: reqwest::Client::builder().timeout(timeout).build()?,
            in_flight: Arc::default(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Events whose delivery has not finished yet
    pub fn in_flight(&self) -> usize {
        self.tasks()
            .iter()
            .filter(|task| !task.is_finished())
            .count()
    }

    /// Wait up to `timeout` for events still being delivered.
    ///
    /// Short-lived processes call this before exiting, since runtime
    /// shutdown drops unfinished tasks.
    pub async fn flush(&self, timeout: Duration) {
        let tasks = std::mem::take(&mut *self.tasks());
        if tasks.is_empty() {
            return;
        }

        let pending = tasks.len();
        let drained = tokio::time::timeout(timeout, async {
            for task in tasks {
                let _ = task.await;
            }
        })
        .await;
        if drained.is_err() {
            tracing::debug!("Gave up on {pending} analytics event(s) after {timeout:?}");
        }
    }

    fn tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AnalyticsSink for HttpAnalytics {
    fn track(&self, event: &str, properties: EventProperties) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("Dropping analytics event {event}: no runtime");
            return;
        };

        let payload = EventPayload {
            event,
            properties,
            timestamp: crate::util::now_millis(),
        };
        let body = match serde_json::to_value(&payload) {
            Ok(body) => body,
            Err(error) => {
                tracing::debug!("Failed to encode analytics event {event}: {error}");
                return;
            }
        };

        let request = self.client.post(&self.endpoint).json(&body);
        let event = event.to_string();
        let task = runtime.spawn(async move {
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::debug!("Analytics event {event} rejected: HTTP {}", response.status());
                }
                Ok(_) => {}
                Err(error) => tracing::debug!("Analytics event {event} failed: {error}"),
            }
        });

        let mut tasks = self.tasks();
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_analytics_requires_http_url() {
        assert!(HttpAnalytics::new("analytics.local", Duration::from_secs(5)).is_err());
        let sink = HttpAnalytics::new("http://localhost:5000/", Duration::from_secs(5)).unwrap();
        assert_eq!(sink.endpoint(), "http://localhost:5000/api/events");
    }

    #[test]
    fn track_without_runtime_is_silent() {
        let sink = HttpAnalytics::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        sink.track("sync_completed", EventProperties::new());
        TracingAnalytics.track("sync_completed", EventProperties::new());
        NoopAnalytics.track("sync_completed", EventProperties::new());
    }

    #[tokio::test]
    async fn track_with_unreachable_backend_never_fails() {
        let sink = HttpAnalytics::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let mut properties = EventProperties::new();
        properties.insert("scope".to_string(), Value::from("light"));
        sink.track("sync_completed", properties);
        sink.track("sync_failed", EventProperties::new());

        sink.flush(Duration::from_secs(2)).await;
        assert_eq!(sink.in_flight(), 0);
    }

    #[tokio::test]
    async fn flush_without_events_returns_immediately() {
        let sink = HttpAnalytics::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        tokio::time::timeout(Duration::from_millis(100), sink.flush(Duration::from_secs(30)))
            .await
            .unwrap();
    }
}
