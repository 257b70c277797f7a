use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::store::BackingStore;
use crate::Compare;
use crate::GetOptions;
use crate::KeyValue;
use crate::LeaseId;
use crate::NotificationKind;
use crate::Revision;
use crate::StoreConfig;
use crate::StoreError;
use crate::TxnOp;
use crate::TxnRequest;
use crate::TxnResponse;
use crate::TxnResult;
use crate::WatchNotification;
use crate::WatchOptions;
use crate::WatchSubscription;

/// Embedded, in-process [`BackingStore`].
///
/// Serves as the reference implementation for single-process deployments and
/// for tests: one mutex over a `BTreeMap` provides the transactional
/// isolation a replicated store would provide through consensus. Leases are
/// expired by a background sweeper task spawned lazily on the first grant.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
    sweep_interval: Duration,
}

#[derive(Debug, Default)]
struct StoreInner {
    revision: Revision,
    entries: BTreeMap<String, Entry>,
    leases: HashMap<LeaseId, Lease>,
    next_lease_id: LeaseId,
    watchers: Vec<WatcherHandle>,
    sweeper_running: bool,
}

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    mod_revision: Revision,
    version: i64,
    lease: LeaseId,
}

#[derive(Debug)]
struct Lease {
    ttl: Duration,
    deadline: Instant,
    keys: HashSet<String>,
}

#[derive(Debug)]
struct WatcherHandle {
    key: String,
    prefix: bool,
    tx: mpsc::UnboundedSender<Vec<WatchNotification>>,
}

impl WatcherHandle {
    fn matches(
        &self,
        key: &str,
    ) -> bool {
        if self.prefix {
            key.starts_with(&self.key)
        } else {
            key == self.key
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner::default())),
            sweep_interval: config.sweep_interval(),
        }
    }

    /// Drops every live watch sender, closing all raw subscriptions.
    /// Simulates a server-side connection loss for resilience testing.
    pub fn disconnect_watchers(&self) {
        self.inner.lock().watchers.clear();
    }

    /// Number of currently registered raw watch subscriptions.
    pub fn watcher_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.watchers.retain(|w| !w.tx.is_closed());
        inner.watchers.len()
    }

    fn ensure_sweeper(&self) {
        let mut inner = self.inner.lock();
        if inner.sweeper_running {
            return;
        }
        inner.sweeper_running = true;
        drop(inner);

        let weak: Weak<Mutex<StoreInner>> = Arc::downgrade(&self.inner);
        let sweep_interval = self.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    // Store dropped
                    return;
                };
                sweep_expired_leases(&inner);
            }
        });
    }
}

/// Deletes every key attached to a lease whose deadline has passed, then
/// forgets the lease. Runs entirely under the store lock so watchers observe
/// the deletes in applied order.
fn sweep_expired_leases(inner: &Mutex<StoreInner>) {
    let now = Instant::now();
    let mut inner = inner.lock();

    let expired: Vec<LeaseId> = inner
        .leases
        .iter()
        .filter(|(_, lease)| lease.deadline <= now)
        .map(|(id, _)| *id)
        .collect();

    for lease_id in expired {
        debug!(lease = lease_id, "lease expired, deleting attached keys");
        remove_lease(&mut inner, lease_id);
    }
}

/// Removes a lease and deletes its attached keys, notifying watchers.
fn remove_lease(
    inner: &mut StoreInner,
    lease_id: LeaseId,
) {
    let Some(lease) = inner.leases.remove(&lease_id) else {
        return;
    };
    let mut notifications = Vec::new();
    inner.revision += 1;
    let revision = inner.revision;
    for key in lease.keys {
        if let Some(entry) = inner.entries.remove(&key) {
            notifications.push(WatchNotification {
                kind: NotificationKind::Delete,
                key,
                value: entry.value,
                version: 0,
                mod_revision: revision,
            });
        }
    }
    notify(inner, notifications);
}

/// Fans a batch out to every watcher whose key selector matches, dropping
/// watchers whose receiver has gone away.
fn notify(
    inner: &mut StoreInner,
    notifications: Vec<WatchNotification>,
) {
    if notifications.is_empty() {
        return;
    }
    inner.watchers.retain(|watcher| {
        let batch: Vec<WatchNotification> = notifications
            .iter()
            .filter(|n| watcher.matches(&n.key))
            .cloned()
            .collect();
        if batch.is_empty() {
            !watcher.tx.is_closed()
        } else {
            watcher.tx.send(batch).is_ok()
        }
    });
}

fn check_compare(
    inner: &StoreInner,
    compare: &Compare,
) -> bool {
    match compare {
        Compare::Version { key, version } => {
            inner.entries.get(key).map(|e| e.version).unwrap_or(0) == *version
        }
        Compare::ModRevision { key, revision } => {
            inner
                .entries
                .get(key)
                .map(|e| e.mod_revision)
                .unwrap_or(0)
                == *revision
        }
    }
}

fn get_range(
    inner: &StoreInner,
    key: &str,
    options: GetOptions,
) -> Vec<KeyValue> {
    let mut results = Vec::new();
    if options.prefix {
        for (k, entry) in inner.entries.range(key.to_string()..) {
            if !k.starts_with(key) {
                break;
            }
            results.push(to_key_value(k, entry));
            if options.limit != 0 && results.len() == options.limit {
                break;
            }
        }
    } else if let Some(entry) = inner.entries.get(key) {
        results.push(to_key_value(key, entry));
    }
    results
}

fn to_key_value(
    key: &str,
    entry: &Entry,
) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: entry.value.clone(),
        mod_revision: entry.mod_revision,
        version: entry.version,
        lease: entry.lease,
    }
}

fn detach_from_lease(
    inner: &mut StoreInner,
    lease_id: LeaseId,
    key: &str,
) {
    if lease_id == 0 {
        return;
    }
    if let Some(lease) = inner.leases.get_mut(&lease_id) {
        lease.keys.remove(key);
    }
}

fn apply_ops(
    inner: &mut StoreInner,
    ops: &[TxnOp],
) -> Vec<TxnResult> {
    let mut responses = Vec::with_capacity(ops.len());
    let mut notifications = Vec::new();

    let mutates = ops
        .iter()
        .any(|op| !matches!(op, TxnOp::Get { .. }));
    if mutates {
        inner.revision += 1;
    }
    let revision = inner.revision;

    for op in ops {
        match op {
            TxnOp::Put { key, value, lease } => {
                let lease_id = lease.unwrap_or(0);
                let (previous_lease, previous_version) = inner
                    .entries
                    .get(key)
                    .map(|e| (e.lease, e.version))
                    .unwrap_or((0, 0));
                detach_from_lease(inner, previous_lease, key);
                let version = previous_version + 1;
                if lease_id != 0 {
                    if let Some(lease) = inner.leases.get_mut(&lease_id) {
                        lease.keys.insert(key.clone());
                    }
                }
                inner.entries.insert(
                    key.clone(),
                    Entry {
                        value: value.clone(),
                        mod_revision: revision,
                        version,
                        lease: lease_id,
                    },
                );
                notifications.push(WatchNotification {
                    kind: NotificationKind::Put,
                    key: key.clone(),
                    value: value.clone(),
                    version,
                    mod_revision: revision,
                });
                responses.push(TxnResult::Put);
            }
            TxnOp::Delete { key, prefix } => {
                let targets: Vec<String> = if *prefix {
                    get_range(inner, key, GetOptions::all_under())
                        .into_iter()
                        .map(|kv| kv.key)
                        .collect()
                } else if inner.entries.contains_key(key) {
                    vec![key.clone()]
                } else {
                    Vec::new()
                };
                let deleted = targets.len();
                for target in targets {
                    if let Some(entry) = inner.entries.remove(&target) {
                        detach_from_lease(inner, entry.lease, &target);
                        notifications.push(WatchNotification {
                            kind: NotificationKind::Delete,
                            key: target,
                            value: entry.value,
                            version: 0,
                            mod_revision: revision,
                        });
                    }
                }
                responses.push(TxnResult::Delete { deleted });
            }
            TxnOp::Get { key } => {
                let kvs = get_range(inner, key, GetOptions::default());
                responses.push(TxnResult::Get { kvs });
            }
        }
    }

    notify(inner, notifications);
    responses
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn get(
        &self,
        key: &str,
        options: GetOptions,
    ) -> std::result::Result<Vec<KeyValue>, StoreError> {
        let inner = self.inner.lock();
        Ok(get_range(&inner, key, options))
    }

    async fn txn(
        &self,
        request: TxnRequest,
    ) -> std::result::Result<TxnResponse, StoreError> {
        let mut inner = self.inner.lock();
        let succeeded = request.compare.iter().all(|c| check_compare(&inner, c));
        let branch = if succeeded {
            &request.success
        } else {
            &request.failure
        };
        let responses = apply_ops(&mut inner, branch);
        Ok(TxnResponse {
            succeeded,
            responses,
        })
    }

    async fn grant(
        &self,
        ttl: Duration,
    ) -> std::result::Result<LeaseId, StoreError> {
        self.ensure_sweeper();
        let mut inner = self.inner.lock();
        inner.next_lease_id += 1;
        let lease_id = inner.next_lease_id;
        inner.leases.insert(
            lease_id,
            Lease {
                ttl,
                deadline: Instant::now() + ttl,
                keys: HashSet::new(),
            },
        );
        Ok(lease_id)
    }

    async fn keep_alive_once(
        &self,
        lease: LeaseId,
    ) -> std::result::Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .leases
            .get_mut(&lease)
            .ok_or(StoreError::LeaseNotFound(lease))?;
        record.deadline = Instant::now() + record.ttl;
        Ok(())
    }

    async fn revoke(
        &self,
        lease: LeaseId,
    ) -> std::result::Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.leases.contains_key(&lease) {
            return Err(StoreError::LeaseNotFound(lease));
        }
        remove_lease(&mut inner, lease);
        Ok(())
    }

    async fn watch(
        &self,
        key: &str,
        options: WatchOptions,
    ) -> std::result::Result<WatchSubscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        inner.watchers.push(WatcherHandle {
            key: key.to_string(),
            prefix: options.prefix,
            tx,
        });
        Ok(WatchSubscription::new(rx))
    }
}
