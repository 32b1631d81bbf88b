use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;

use crate::error::MonitorError;

/// Anything that can hand back the body of a URL. The HTTP implementation is
/// used in production; tests swap in [`MockSource`].
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Bytes, MonitorError>;
}

#[derive(Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> Result<Self, MonitorError> {
        let client = Client::builder()
            .user_agent(concat!("mrq-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MonitorError::fetch("<client>", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Bytes, MonitorError> {
        let resp = self.client.get(url).timeout(timeout).send().await
            .map_err(|e| MonitorError::fetch(url, e))?;
        let resp = resp.error_for_status().map_err(|e| MonitorError::fetch(url, e))?;
        resp.bytes().await.map_err(|e| MonitorError::fetch(url, e))
    }
}

#[cfg(test)]
pub use mock::MockSource;

#[cfg(test)]
mod mock {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Url-keyed canned responses; every call is recorded.
    #[derive(Default)]
    pub struct MockSource {
        pages: Mutex<HashMap<String, Vec<Result<String, String>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockSource {
        pub fn new() -> Self { Self::default() }

        /// Queue a body for `url`. The last queued response sticks once the
        /// queue is drained down to it.
        pub fn push_page(&self, url: &str, body: impl Into<String>) {
            self.pages.lock().unwrap().entry(url.to_string()).or_default().push(Ok(body.into()));
        }

        pub fn push_error(&self, url: &str, reason: impl Into<String>) {
            self.pages.lock().unwrap().entry(url.to_string()).or_default().push(Err(reason.into()));
        }

        pub fn calls(&self) -> Vec<String> { self.calls.lock().unwrap().clone() }
    }

    #[async_trait]
    impl PageSource for MockSource {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<Bytes, MonitorError> {
            self.calls.lock().unwrap().push(url.to_string());
            let mut pages = self.pages.lock().unwrap();
            let queue = pages.get_mut(url);
            let next = match queue {
                Some(q) if q.len() > 1 => q.remove(0),
                Some(q) if q.len() == 1 => q[0].clone(),
                _ => Err("no such page".to_string()),
            };
            match next {
                Ok(body) => Ok(Bytes::from(body)),
                Err(reason) => Err(MonitorError::Fetch { url: url.to_string(), reason, timeout: false }),
            }
        }
    }

    #[tokio::test]
    async fn mock_source_drains_then_sticks() {
        let src = MockSource::new();
        src.push_page("u", "one");
        src.push_page("u", "two");
        assert_eq!(src.fetch("u", Duration::from_secs(1)).await.unwrap(), Bytes::from("one"));
        assert_eq!(src.fetch("u", Duration::from_secs(1)).await.unwrap(), Bytes::from("two"));
        assert_eq!(src.fetch("u", Duration::from_secs(1)).await.unwrap(), Bytes::from("two"));
        assert!(src.fetch("missing", Duration::from_secs(1)).await.unwrap_err().is_fetch());
        assert_eq!(src.calls().len(), 4);
    }
}
