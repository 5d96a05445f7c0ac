//! Sync routine that delegates to a host application endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use larder_core::sync::SyncRoutine;
use larder_core::{Error, Network, ProxyRequest, RequestMode};

/// POSTs to a host endpoint and treats any non-2xx status as failure.
///
/// The host owns the actual synchronization logic; this only signals it
/// and reports back whether it finished.
pub struct EndpointSync {
    network: Arc<dyn Network>,
    endpoint: Url,
}

impl EndpointSync {
    pub fn new(network: Arc<dyn Network>, endpoint: Url) -> Self {
        Self { network, endpoint }
    }
}

#[async_trait]
impl SyncRoutine for EndpointSync {
    async fn run(&self) -> Result<(), Error> {
        let request = ProxyRequest::new("POST", self.endpoint.clone(), RequestMode::Other)
            .with_header("Content-Type", "application/json")
            .with_body("{}");

        let response = self.network.fetch(&request).await?;
        if !response.is_success() {
            return Err(Error::Network(format!("{}: status {}", self.endpoint, response.status)));
        }

        tracing::debug!(endpoint = %self.endpoint, "sync endpoint acknowledged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use larder_core::HttpResponse;

    struct Recording {
        status: u16,
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Network for Recording {
        async fn fetch(&self, request: &ProxyRequest) -> Result<HttpResponse, Error> {
            self.seen
                .lock()
                .unwrap()
                .push((request.method.clone(), request.url.to_string()));
            Ok(HttpResponse::new(self.status, ""))
        }
    }

    fn endpoint() -> Url {
        Url::parse("https://app.test/api/bids/sync").unwrap()
    }

    #[tokio::test]
    async fn test_posts_to_endpoint() {
        let net = Arc::new(Recording { status: 204, seen: Mutex::new(Vec::new()) });
        let routine = EndpointSync::new(net.clone(), endpoint());

        routine.run().await.unwrap();
        assert_eq!(
            *net.seen.lock().unwrap(),
            vec![("POST".to_string(), "https://app.test/api/bids/sync".to_string())]
        );
    }

    #[tokio::test]
    async fn test_error_status_fails() {
        let net = Arc::new(Recording { status: 503, seen: Mutex::new(Vec::new()) });
        let routine = EndpointSync::new(net, endpoint());
        assert!(matches!(routine.run().await, Err(Error::Network(_))));
    }
}
