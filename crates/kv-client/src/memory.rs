//! In-process key-value store.
//!
//! Used by `--dry-run` and by tests. Supports the same operations as a real
//! deployment, plus fault injection for exercising error paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;

use crate::config::TargetConfig;
use crate::error::{ClientError, Result};
use crate::subscription::{ReceivedMessage, Subscription};
use crate::traits::{Connector, KvClient, ScanOutcome, ServerInfo};

#[derive(Debug, Clone)]
enum Entry {
    Str {
        value: String,
        expires_at: Option<Instant>,
    },
    Hash(BTreeMap<String, String>),
    List(Vec<String>),
    SortedSet(BTreeMap<String, f64>),
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self, Entry::Str { expires_at: Some(at), .. } if *at <= now)
    }
}

/// In-memory [`KvClient`].
pub struct MemoryClient {
    target: String,
    store: Mutex<HashMap<String, Entry>>,
    subscribers: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<ReceivedMessage>>>>,
    writes: AtomicU64,
    fail_after_writes: Option<u64>,
    unreachable: Option<String>,
    /// Accept publishes without delivering them.
    stalled_subscribers: bool,
    /// Keys whose deletion fails.
    undeletable: HashSet<String>,
    closed: AtomicBool,
}

impl MemoryClient {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            store: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            writes: AtomicU64::new(0),
            fail_after_writes: None,
            unreachable: None,
            stalled_subscribers: false,
            undeletable: HashSet::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Succeed for the first `writes` write operations, then fail every write.
    pub fn with_fail_after_writes(mut self, writes: u64) -> Self {
        self.fail_after_writes = Some(writes);
        self
    }

    /// Accept every publish but never deliver it, like a subscriber that
    /// stopped reading.
    pub fn with_stalled_subscribers(mut self) -> Self {
        self.stalled_subscribers = true;
        self
    }

    /// Fail every `DEL` of `key`.
    pub fn with_undeletable(mut self, key: impl Into<String>) -> Self {
        self.undeletable.insert(key.into());
        self
    }

    /// Behave like a target that was unreachable at connect time.
    pub fn unreachable(target: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut client = Self::new(target);
        client.unreachable = Some(reason.into());
        client
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock_store()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.lock_store()
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Remaining time-to-live of a string key.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        match self.lock_store().get(key) {
            Some(Entry::Str {
                expires_at: Some(at),
                ..
            }) => Some(at.saturating_duration_since(Instant::now())),
            _ => None,
        }
    }

    /// Successful write operations so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn lock_store(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_subscribers(
        &self,
    ) -> MutexGuard<'_, HashMap<String, Vec<mpsc::UnboundedSender<ReceivedMessage>>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_connected(&self) -> Result<()> {
        if let Some(reason) = &self.unreachable {
            return Err(ClientError::NotConnected {
                target: self.target.clone(),
                reason: reason.clone(),
            });
        }
        if self.is_closed() {
            return Err(ClientError::NotConnected {
                target: self.target.clone(),
                reason: "connection closed".to_string(),
            });
        }
        Ok(())
    }

    /// Reserve `count` writes, failing once the injected limit is reached.
    fn begin_writes(&self, count: u64) -> Result<()> {
        self.check_connected()?;
        if let Some(limit) = self.fail_after_writes {
            let done = self.writes.load(Ordering::SeqCst);
            if done + count > limit {
                return Err(ClientError::Injected(format!(
                    "write limit of {limit} reached on {}",
                    self.target
                )));
            }
        }
        self.writes.fetch_add(count, Ordering::SeqCst);
        Ok(())
    }

    fn put_string(store: &mut HashMap<String, Entry>, key: &str, value: &str, ttl: Option<Duration>) {
        store.insert(
            key.to_string(),
            Entry::Str {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
    }

    fn wrong_type(key: &str) -> ClientError {
        ClientError::Injected(format!(
            "WRONGTYPE Operation against a key holding the wrong kind of value: {key}"
        ))
    }
}

#[async_trait::async_trait]
impl KvClient for MemoryClient {
    fn target(&self) -> &str {
        &self.target
    }

    async fn set(&self, key: &str, value: &str, expiry: Option<Duration>) -> Result<()> {
        self.begin_writes(1)?;
        Self::put_string(&mut self.lock_store(), key, value, expiry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_connected()?;
        let now = Instant::now();
        let mut store = self.lock_store();
        match store.get(key) {
            Some(entry) if entry.is_expired(now) => {
                store.remove(key);
                Ok(None)
            }
            Some(Entry::Str { value, .. }) => Ok(Some(value.clone())),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        self.begin_writes(1)?;
        let mut store = self.lock_store();
        let entry = store
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(BTreeMap::new()));
        match entry {
            Entry::Hash(hash) => {
                hash.extend(fields.iter().cloned());
                Ok(())
            }
            _ => Err(Self::wrong_type(key)),
        }
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<()> {
        self.begin_writes(1)?;
        let mut store = self.lock_store();
        let entry = store
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(Vec::new()));
        match entry {
            Entry::List(list) => {
                list.push(value.to_string());
                Ok(())
            }
            _ => Err(Self::wrong_type(key)),
        }
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        self.begin_writes(1)?;
        let mut store = self.lock_store();
        let entry = store
            .entry(key.to_string())
            .or_insert_with(|| Entry::SortedSet(BTreeMap::new()));
        match entry {
            Entry::SortedSet(set) => {
                set.insert(member.to_string(), score);
                Ok(())
            }
            _ => Err(Self::wrong_type(key)),
        }
    }

    async fn batch_set(&self, entries: &[(String, String)]) -> Result<u64> {
        self.begin_writes(entries.len() as u64)?;
        let mut store = self.lock_store();
        for (key, value) in entries {
            Self::put_string(&mut store, key, value, None);
        }
        Ok(entries.len() as u64)
    }

    async fn transaction_set(&self, entries: &[(String, String)]) -> Result<()> {
        self.begin_writes(1)?;
        let mut store = self.lock_store();
        for (key, value) in entries {
            Self::put_string(&mut store, key, value, None);
        }
        Ok(())
    }

    async fn scan(&self, pattern: &str, _page_size: usize) -> Result<ScanOutcome> {
        self.check_connected()?;
        let now = Instant::now();
        let store = self.lock_store();
        let mut keys: Vec<String> = store
            .iter()
            .filter(|(key, entry)| !entry.is_expired(now) && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(ScanOutcome {
            keys,
            failures: Vec::new(),
        })
    }

    async fn del(&self, key: &str) -> Result<bool> {
        self.check_connected()?;
        if self.undeletable.contains(key) {
            return Err(ClientError::Injected(format!(
                "DEL of {key} refused on {}",
                self.target
            )));
        }
        Ok(self.lock_store().remove(key).is_some())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        self.check_connected()?;
        if self.stalled_subscribers {
            return Ok(());
        }
        let mut subscribers = self.lock_subscribers();
        if let Some(senders) = subscribers.get_mut(channel) {
            let message = ReceivedMessage {
                channel: channel.to_string(),
                payload: payload.to_string(),
                received_at: Utc::now(),
            };
            senders.retain(|sender| sender.send(message.clone()).is_ok());
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        self.check_connected()?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock_subscribers()
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::direct(channel, rx))
    }

    async fn server_info(&self) -> Result<Vec<ServerInfo>> {
        self.check_connected()?;
        Ok(vec![ServerInfo {
            endpoint: "memory".to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }])
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.lock_subscribers().clear();
    }
}

/// Redis-style glob matching supporting `*` and `?`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut star_text = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            star_text = t;
            p += 1;
        } else if let Some(star_pos) = star {
            p = star_pos + 1;
            star_text += 1;
            t = star_text;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Hands out one [`MemoryClient`] per target name.
///
/// Clients are kept so tests can inspect the store after a run.
#[derive(Default)]
pub struct MemoryConnector {
    clients: Mutex<HashMap<String, Arc<MemoryClient>>>,
    prepared: Mutex<HashMap<String, MemoryClient>>,
    unreachable: HashSet<String>,
    faults: HashMap<String, u64>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `target` as unreachable.
    pub fn with_unreachable(mut self, target: impl Into<String>) -> Self {
        self.unreachable.insert(target.into());
        self
    }

    /// Fail writes on `target` after `writes` successful ones.
    pub fn with_fault(mut self, target: impl Into<String>, writes: u64) -> Self {
        self.faults.insert(target.into(), writes);
        self
    }

    /// Hand out `client` on the next connect to its target.
    pub fn with_client(self, client: MemoryClient) -> Self {
        self.prepared
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(client.target.clone(), client);
        self
    }

    /// The client handed out for `target`, if any.
    pub fn client(&self, target: &str) -> Option<Arc<MemoryClient>> {
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(target)
            .cloned()
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, target: &TargetConfig) -> Result<Arc<dyn KvClient>> {
        let prepared = self
            .prepared
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&target.name);

        let client = if let Some(client) = prepared {
            client
        } else if self.unreachable.contains(&target.name) {
            let reason = format!("{} is unreachable", target.endpoint_list());
            if target.fail_fast {
                return Err(ClientError::NotConnected {
                    target: target.name.clone(),
                    reason,
                });
            }
            MemoryClient::unreachable(&target.name, reason)
        } else {
            match self.faults.get(&target.name) {
                Some(writes) => MemoryClient::new(&target.name).with_fail_after_writes(*writes),
                None => MemoryClient::new(&target.name),
            }
        };

        let client = Arc::new(client);
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(target.name.clone(), Arc::clone(&client));
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("{test}:*", "{test}:single:1"));
        assert!(glob_match("{test}:*", "{test}:"));
        assert!(!glob_match("{test}:*", "{test:1}:batch:1"));
        assert!(glob_match("{test:*}:*", "{test:1}:batch:1"));
        assert!(glob_match("h?llo", "hello"));
        assert!(!glob_match("h?llo", "hllo"));
        assert!(glob_match("*", ""));
    }

    #[tokio::test]
    async fn test_set_get_and_expiry() {
        let client = MemoryClient::new("memory");
        client.set("a", "1", None).await.unwrap();
        client
            .set("b", "2", Some(Duration::from_millis(1)))
            .await
            .unwrap();

        assert_eq!(client.get("a").await.unwrap(), Some("1".to_string()));
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(client.get("b").await.unwrap(), None);
        assert_eq!(client.len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let client = MemoryClient::new("memory");
        client.rpush("list", "x").await.unwrap();
        assert!(client.get("list").await.is_err());
        assert!(client.hset("list", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let client = MemoryClient::new("memory").with_fail_after_writes(2);
        client.set("a", "1", None).await.unwrap();
        client.set("b", "1", None).await.unwrap();

        let err = client.set("c", "1", None).await.unwrap_err();
        assert!(matches!(err, ClientError::Injected(_)));
        assert_eq!(client.write_count(), 2);
        assert!(!client.contains_key("c"));
    }

    #[tokio::test]
    async fn test_batch_counts_every_entry() {
        let client = MemoryClient::new("memory").with_fail_after_writes(150);
        let entries: Vec<(String, String)> =
            (0..100).map(|i| (format!("k{i}"), i.to_string())).collect();

        assert_eq!(client.batch_set(&entries).await.unwrap(), 100);
        assert!(client.batch_set(&entries).await.is_err());
        assert_eq!(client.write_count(), 100);
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let client = MemoryClient::new("memory");
        client.publish("chan", "dropped").await.unwrap();

        let mut subscription = client.subscribe("chan").await.unwrap();
        client.publish("chan", "hello").await.unwrap();

        let message = subscription.recv().await.unwrap();
        assert_eq!(message.payload, "hello");
        assert_eq!(message.channel, "chan");
        assert!(subscription.try_recv().is_none());

        subscription.unsubscribe().await.unwrap();
        client.publish("chan", "after").await.unwrap();
        assert!(client.lock_subscribers()["chan"].is_empty());
    }

    #[tokio::test]
    async fn test_stalled_subscribers_receive_nothing() {
        let client = MemoryClient::new("memory").with_stalled_subscribers();
        let mut subscription = client.subscribe("chan").await.unwrap();
        client.publish("chan", "hello").await.unwrap();
        assert!(subscription.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_undeletable_key() {
        let client = MemoryClient::new("memory").with_undeletable("pinned");
        client.set("pinned", "1", None).await.unwrap();
        client.set("other", "1", None).await.unwrap();

        assert!(matches!(
            client.del("pinned").await,
            Err(ClientError::Injected(_))
        ));
        assert!(client.del("other").await.unwrap());
        assert!(client.contains_key("pinned"));
    }

    #[tokio::test]
    async fn test_connector_hands_out_prepared_client() {
        let connector =
            MemoryConnector::new().with_client(MemoryClient::new("Redis").with_undeletable("k"));
        let target = TargetConfig::new("Redis", vec!["127.0.0.1:7001".to_string()]);

        let client = connector.connect(&target).await.unwrap();
        client.set("k", "1", None).await.unwrap();
        assert!(client.del("k").await.is_err());
        assert!(connector.client("Redis").unwrap().contains_key("k"));
    }

    #[tokio::test]
    async fn test_closed_client_rejects_operations() {
        let client = MemoryClient::new("memory");
        client.close().await;
        assert!(matches!(
            client.set("a", "1", None).await,
            Err(ClientError::NotConnected { .. })
        ));
    }

    #[tokio::test]
    async fn test_connector_unreachable_target() {
        let connector = MemoryConnector::new().with_unreachable("Redis");
        let lazy = TargetConfig::new("Redis", vec!["127.0.0.1:7001".to_string()]);

        let client = connector.connect(&lazy).await.unwrap();
        assert!(client.get("a").await.is_err());

        let strict = lazy.with_fail_fast(true);
        assert!(connector.connect(&strict).await.is_err());
    }
}
