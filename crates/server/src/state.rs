//! Shared server state and startup wiring.

use std::sync::Arc;

use larder_client::EndpointSync;
use larder_core::config::AppConfig;
use larder_core::request::resolve_url;
use larder_core::sync::{PrecacheRefresh, REFRESH_CACHE, SyncHooks};
use larder_core::{Error, Network, Registration};
use url::Url;

/// Everything a tool call needs.
pub struct ProxyState {
    pub registration: Arc<Registration>,
    pub hooks: Arc<SyncHooks>,
    pub origin: Url,
}

/// Wire the configured sync tags to their routines.
///
/// Connectivity tags go to the host's sync endpoints; the scheduled
/// `refresh-cache` trigger refreshes the active worker's precache.
pub fn build_hooks(
    config: &AppConfig, origin: &Url, network: Arc<dyn Network>, registration: Arc<Registration>,
) -> Result<SyncHooks, Error> {
    let mut hooks = SyncHooks::new().on_schedule(REFRESH_CACHE, Arc::new(PrecacheRefresh::new(registration)));

    for (tag, endpoint) in &config.sync_routes {
        let url = resolve_url(origin, endpoint)?;
        tracing::debug!(%tag, %url, "registering sync route");
        hooks = hooks.on_connectivity(tag.clone(), Arc::new(EndpointSync::new(network.clone(), url)));
    }

    Ok(hooks)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use larder_core::{CacheDb, HttpResponse, ProxyRequest, Worker};

    use super::*;

    /// Serves a fixed table of URLs; everything else is unreachable.
    pub struct TableNetwork(pub HashMap<String, HttpResponse>);

    #[async_trait]
    impl Network for TableNetwork {
        async fn fetch(&self, request: &ProxyRequest) -> Result<HttpResponse, Error> {
            self.0
                .get(request.url.as_str())
                .cloned()
                .ok_or_else(|| Error::Network(format!("{} unreachable", request.url)))
        }
    }

    pub const ORIGIN: &str = "http://localhost:8080";

    /// A state with one active worker that has precached `config.precache`.
    pub async fn state(config: AppConfig) -> ProxyState {
        state_with_db(config).await.0
    }

    pub async fn state_with_db(config: AppConfig) -> (ProxyState, CacheDb) {
        let settings = config.worker_settings().unwrap();
        let table = settings
            .manifest
            .resolve(&settings.origin)
            .unwrap()
            .into_iter()
            .map(|url| (url.to_string(), HttpResponse::new(200, format!("precached {}", url.path()))))
            .collect();
        let network: Arc<dyn Network> = Arc::new(TableNetwork(table));

        let db = CacheDb::open_in_memory().await.unwrap();
        let registration = Arc::new(Registration::new());
        let worker = Worker::new(config.cache_version(), db.clone(), network.clone(), settings.clone()).unwrap();
        registration.register(Arc::new(worker)).await.unwrap();

        let hooks = build_hooks(&config, &settings.origin, network, registration.clone()).unwrap();
        (ProxyState { registration, hooks: Arc::new(hooks), origin: settings.origin.clone() }, db)
    }
}
