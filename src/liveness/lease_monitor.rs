use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::constants::MONITOR_KEY_PREFIX;
use crate::store::BackingStore;
use crate::utils::async_task::run_cancellable;
use crate::Error;
use crate::GetOptions;
use crate::KeyValue;
use crate::LeaseId;
use crate::MonitorConfig;
use crate::MonitorError;
use crate::Result;
use crate::TxnOp;
use crate::TxnRequest;
use crate::WatchConfig;
use crate::WatchEventKind;
use crate::Watcher;

/// Receives the outcome of a monitored entity going silent.
///
/// `on_failure` runs exactly once per lease expiry with the event supplied
/// to [`LeaseMonitor::monitor`]; an error it returns is routed to
/// `on_error` and never aborts the monitor itself.
#[async_trait]
pub trait FailureHandler<E>: Send + Sync + 'static {
    async fn on_failure(
        &self,
        event: E,
    ) -> Result<()>;

    async fn on_error(
        &self,
        error: Error,
    );
}

/// Lease-based failure detector for monitored entities.
///
/// Each monitored name owns one marker key kept alive by a store lease.
/// While the entity keeps checking in, `monitor` renews the lease; once the
/// TTL elapses without renewal the store deletes the key, the watch task
/// observes the delete and fires the failure handler. A renewal from any
/// replica shows up as a Put on the same key and retires the watch task
/// without firing, so exactly one watch task is live per marker key.
pub struct LeaseMonitor<E> {
    store: Arc<dyn BackingStore>,
    handler: Arc<dyn FailureHandler<E>>,
    shutdown: CancellationToken,
    config: MonitorConfig,
    watch_config: WatchConfig,
}

impl<E> LeaseMonitor<E>
where
    E: Send + Sync + 'static,
{
    pub fn new(
        store: Arc<dyn BackingStore>,
        handler: Arc<dyn FailureHandler<E>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self::with_config(
            store,
            handler,
            shutdown,
            MonitorConfig::default(),
            WatchConfig::default(),
        )
    }

    pub fn with_config(
        store: Arc<dyn BackingStore>,
        handler: Arc<dyn FailureHandler<E>>,
        shutdown: CancellationToken,
        config: MonitorConfig,
        watch_config: WatchConfig,
    ) -> Self {
        Self {
            store,
            handler,
            shutdown,
            config,
            watch_config,
        }
    }

    /// Get-or-create-and-watch for the named monitor.
    ///
    /// A marker already carrying the requested TTL is renewed in place and
    /// no new watch is started. Otherwise (absent marker, or the TTL
    /// changed) a fresh lease is granted, the marker rewritten and one watch
    /// task spawned for it; an existing watch task sees the rewrite as a Put
    /// and retires itself.
    ///
    /// # Errors
    /// - [`MonitorError::InvalidTtl`] when `ttl` is below the configured
    ///   minimum
    pub async fn monitor(
        &self,
        cancel: &CancellationToken,
        name: &str,
        event: E,
        ttl: Duration,
    ) -> Result<()> {
        if ttl < self.config.min_ttl() {
            return Err(MonitorError::InvalidTtl(ttl).into());
        }
        let key = marker_key(name);

        let existing =
            run_cancellable(cancel, self.store.get(&key, GetOptions::default())).await?;
        if let Some(marker) = existing.into_iter().next() {
            match decode_ttl(&marker) {
                Ok(recorded) if recorded == ttl => {
                    debug!(%key, "renewing monitor lease");
                    run_cancellable(cancel, self.store.keep_alive_once(marker.lease)).await?;
                    return Ok(());
                }
                Ok(recorded) => {
                    debug!(%key, ?recorded, requested = ?ttl, "monitor ttl changed, re-creating lease");
                }
                Err(error) => {
                    warn!(%key, "re-creating unreadable monitor marker: {error}");
                }
            }
        }

        let lease = run_cancellable(cancel, self.store.grant(ttl)).await?;
        let request = TxnRequest::default().and_then(TxnOp::Put {
            key: key.clone(),
            value: encode_ttl(ttl),
            lease: Some(lease),
        });
        run_cancellable(cancel, self.store.txn(request)).await?;

        self.spawn_watch(key, lease, event);
        Ok(())
    }

    fn spawn_watch(
        &self,
        key: String,
        lease: LeaseId,
        event: E,
    ) {
        let store = Arc::clone(&self.store);
        let handler = Arc::clone(&self.handler);
        let shutdown = self.shutdown.clone();
        let session = shutdown.child_token();
        let mut watcher = Watcher::watch_with_config(
            Arc::clone(&store),
            session.clone(),
            key.clone(),
            false,
            self.watch_config.clone(),
        );

        tokio::spawn(async move {
            let outcome = loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break WatchOutcome::Shutdown,
                    observed = watcher.recv() => match observed {
                        Some(e) if e.kind == WatchEventKind::Delete => break WatchOutcome::Expired,
                        Some(e) if e.kind == WatchEventKind::Unknown => continue,
                        Some(_) => break WatchOutcome::Superseded,
                        None => break WatchOutcome::Superseded,
                    },
                }
            };

            match outcome {
                WatchOutcome::Expired => {
                    debug!(%key, "monitor lease expired, invoking failure handler");
                    if let Err(error) = handler.on_failure(event).await {
                        handler.on_error(error).await;
                    }
                }
                WatchOutcome::Superseded => {
                    debug!(%key, "monitor superseded by a newer lease");
                }
                WatchOutcome::Shutdown => {
                    // Proactive revoke so the marker disappears now instead
                    // of after the TTL. Best effort.
                    if let Err(error) = store.revoke(lease).await {
                        warn!(%key, "failed to revoke monitor lease on shutdown: {error}");
                    }
                }
            }
            session.cancel();
        });
    }
}

enum WatchOutcome {
    Expired,
    Superseded,
    Shutdown,
}

fn marker_key(name: &str) -> String {
    format!("{}/{}", MONITOR_KEY_PREFIX, name)
}

fn encode_ttl(ttl: Duration) -> Vec<u8> {
    ttl.as_millis().to_string().into_bytes()
}

fn decode_ttl(marker: &KeyValue) -> Result<Duration> {
    std::str::from_utf8(&marker.value)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .ok_or_else(|| MonitorError::MarkerCorrupt(marker.key.clone()).into())
}
