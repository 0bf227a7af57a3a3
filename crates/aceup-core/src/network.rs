//! Network reachability monitor.
//!
//! A single boolean published over a `watch` channel. Platform glue (or the
//! health-check prober) calls [`NetworkMonitor::set_online`]; the sync
//! machinery subscribes to transitions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::Result;

/// Cloneable reachability handle. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

impl NetworkMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (sender, _) = watch::channel(initially_online);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn current_status(&self) -> bool {
        *self.sender.borrow()
    }

    /// Publish reachability. Returns `true` when this was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(online, "Network reachability changed");
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    /// Invoke `callback` on every transition until the monitor is dropped.
    pub fn on_transition<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: Fn(bool) + Send + 'static,
    {
        let mut receiver = self.subscribe();
        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let online = *receiver.borrow_and_update();
                callback(online);
            }
        })
    }

    /// Poll `url` every `interval`; any 2xx response counts as online.
    pub fn spawn_probe(
        &self,
        url: impl Into<String>,
        interval: Duration,
        timeout: Duration,
    ) -> Result<JoinHandle<()>> {
        let url = url.into();
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let monitor = self.clone();

        Ok(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                monitor.set_online(health_check(&client, &url).await);
            }
        }))
    }

    /// Check `url` once and publish the result.
    pub async fn probe_once(&self, url: &str, timeout: Duration) -> Result<bool> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let online = health_check(&client, url).await;
        self.set_online(online);
        Ok(online)
    }
}

async fn health_check(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(response) => response.status().is_success(),
        Err(error) => {
            tracing::debug!("Health check {url} failed: {error}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn set_online_reports_only_transitions() {
        let monitor = NetworkMonitor::default();
        assert!(!monitor.current_status());
        assert!(!monitor.set_online(false));
        assert!(monitor.set_online(true));
        assert!(!monitor.set_online(true));
        assert!(monitor.current_status());
    }

    #[tokio::test]
    async fn on_transition_delivers_each_change() {
        let monitor = NetworkMonitor::new(false);
        let seen: Arc<Mutex<Vec<bool>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let task = monitor.on_transition(move |online| sink.lock().unwrap().push(online));

        let mut receiver = monitor.subscribe();
        monitor.set_online(true);
        receiver.changed().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        monitor.set_online(false);
        receiver.changed().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        task.abort();
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test]
    async fn probe_marks_unreachable_host_offline() {
        let monitor = NetworkMonitor::new(true);
        let mut receiver = monitor.subscribe();
        let probe = monitor
            .spawn_probe(
                "http://127.0.0.1:9/api/health",
                Duration::from_secs(60),
                Duration::from_secs(2),
            )
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), receiver.wait_for(|online| !*online))
            .await
            .unwrap()
            .unwrap();
        probe.abort();
        assert!(!monitor.current_status());
    }

    #[tokio::test]
    async fn probe_once_publishes_result() {
        let monitor = NetworkMonitor::new(true);
        let online = monitor
            .probe_once("http://127.0.0.1:9/api/health", Duration::from_secs(2))
            .await
            .unwrap();
        assert!(!online);
        assert!(!monitor.current_status());
    }
}
