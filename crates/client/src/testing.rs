//! Scripted network and worker fixtures shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use swcache_core::{CacheDb, Error, Request, Response, WorkerConfig};

use crate::fetch::Network;
use crate::worker::CacheManager;

/// Network that answers from a table of canned responses.
///
/// Unknown URLs get a 404; while offline every fetch fails with a network
/// error. Every call is counted, including failed ones.
pub(crate) struct MockNetwork {
    responses: Mutex<HashMap<String, Response>>,
    online: AtomicBool,
    calls: AtomicUsize,
}

impl MockNetwork {
    pub(crate) fn new() -> Self {
        Self { responses: Mutex::new(HashMap::new()), online: AtomicBool::new(true), calls: AtomicUsize::new(0) }
    }

    pub(crate) fn respond(&self, url: &str, response: Response) {
        self.responses.lock().unwrap().insert(url.to_string(), response);
    }

    pub(crate) fn go_offline(&self) {
        self.online.store(false, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: offline", request.url)));
        }
        let responses = self.responses.lock().unwrap();
        Ok(responses
            .get(request.url.as_str())
            .cloned()
            .unwrap_or_else(|| Response::new(404, "not found")))
    }
}

pub(crate) fn test_config() -> WorkerConfig {
    WorkerConfig {
        app_name: "app".into(),
        version: "v1".into(),
        origin: "https://example.com".into(),
        allowed_origins: vec!["https://fonts.gstatic.com".into()],
        install_manifest: Vec::new(),
        ..Default::default()
    }
}

pub(crate) async fn activated_manager() -> (CacheManager, Arc<MockNetwork>) {
    activated_manager_with(test_config()).await
}

/// Installed and activated worker over an in-memory store.
pub(crate) async fn activated_manager_with(config: WorkerConfig) -> (CacheManager, Arc<MockNetwork>) {
    let db = CacheDb::open_in_memory().await.unwrap().with_quota(config.quota_bytes);
    let network = Arc::new(MockNetwork::new());
    let manager = CacheManager::new(config, db, network.clone()).unwrap();
    manager.install().await.unwrap();
    manager.activate().await.unwrap();
    (manager, network)
}
