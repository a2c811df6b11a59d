//! Scripted asset source shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cloud_asset_count::{AssetSource, CountError, Provider, Scope, ScopeError};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Reply {
    Count(usize),
    Fail(CountError),
    Panic,
}

pub fn rate_limited() -> Reply {
    Reply::Fail(CountError::RateLimited {
        detail: "(RateLimitExceeded) too many requests".to_string(),
    })
}

pub fn denied() -> Reply {
    Reply::Fail(CountError::PermissionDenied {
        detail: "(AuthorizationFailed) no access".to_string(),
    })
}

pub fn malformed() -> Reply {
    Reply::Fail(CountError::Decode {
        detail: "expected value at line 1 column 1".to_string(),
    })
}

/// Replies per asset type are consumed in order; the last one repeats.
pub struct ScriptedSource {
    provider: Provider,
    scopes: Option<Vec<Scope>>,
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(provider: Provider, scopes: Vec<Scope>) -> Self {
        Self {
            provider,
            scopes: Some(scopes),
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// A source whose scope enumeration comes back empty
    pub fn without_scopes(provider: Provider) -> Self {
        Self {
            scopes: None,
            ..Self::new(provider, Vec::new())
        }
    }

    pub fn reply(self, asset_type: &str, replies: Vec<Reply>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(asset_type.to_string(), replies.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self, asset_type: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(asset_type)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, asset_type: &str) -> Reply {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(asset_type.to_string())
            .or_insert(0) += 1;

        let mut replies = self.replies.lock().unwrap();
        let queue = replies
            .get_mut(asset_type)
            .unwrap_or_else(|| panic!("no replies scripted for {:?}", asset_type));
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

#[async_trait]
impl AssetSource for ScriptedSource {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn list_scopes(&self) -> Result<Vec<Scope>, ScopeError> {
        match &self.scopes {
            Some(scopes) => Ok(scopes.clone()),
            None => Err(ScopeError::NoneFound),
        }
    }

    async fn count_assets(&self, _scope: &Scope, asset_type: &str) -> Result<usize, CountError> {
        let reply = self.next_reply(asset_type);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Reply::Count(n) => Ok(n),
            Reply::Fail(err) => Err(err),
            Reply::Panic => panic!("scripted panic for {}", asset_type),
        }
    }
}

/// Write an asset-type file into `dir`
pub fn asset_file(dir: &Path, types: &[&str]) -> PathBuf {
    let path = dir.join("asset_types.txt");
    let mut content = types.join("\n");
    content.push('\n');
    std::fs::write(&path, content).unwrap();
    path
}
