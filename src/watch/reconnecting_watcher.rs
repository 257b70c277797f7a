use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::constants::KEY_SEPARATOR;
use crate::store::BackingStore;
use crate::NotificationKind;
use crate::WatchConfig;
use crate::WatchNotification;
use crate::WatchOptions;
use crate::WatchSubscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Create,
    Update,
    Delete,
    /// Notification kinds this crate does not understand. Produced only by
    /// backing stores with a wider notification vocabulary than the embedded
    /// one; logged and dropped by the watcher, never forwarded.
    Unknown,
}

/// One normalized change event, in the order the store applied it.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub key: String,
    pub value: Vec<u8>,
}

impl From<WatchNotification> for WatchEvent {
    fn from(notification: WatchNotification) -> Self {
        let kind = match notification.kind {
            NotificationKind::Put if notification.version == 1 => WatchEventKind::Create,
            NotificationKind::Put => WatchEventKind::Update,
            NotificationKind::Delete => WatchEventKind::Delete,
        };
        Self {
            kind,
            key: notification.key,
            value: notification.value,
        }
    }
}

/// Resilient watch channel over one key or key prefix.
///
/// A single background task owns the raw subscription and the outgoing
/// channel: it forwards notifications one-for-one and, whenever the raw
/// stream breaks, reopens it under a rate limiter until the caller's token
/// is cancelled. Cancellation closes the result channel exactly once, with
/// no task left behind.
#[derive(Debug)]
pub struct Watcher {
    rx: mpsc::Receiver<WatchEvent>,
}

impl Watcher {
    /// Starts watching `key` and returns immediately. With `recursive` set,
    /// `key` is treated as a prefix (a trailing separator is appended if
    /// absent) so every descendant key is observed.
    pub fn watch(
        store: Arc<dyn BackingStore>,
        cancel: CancellationToken,
        key: impl Into<String>,
        recursive: bool,
    ) -> Self {
        Self::watch_with_config(store, cancel, key, recursive, WatchConfig::default())
    }

    pub fn watch_with_config(
        store: Arc<dyn BackingStore>,
        cancel: CancellationToken,
        key: impl Into<String>,
        recursive: bool,
        config: WatchConfig,
    ) -> Self {
        let mut key = key.into();
        if recursive && !key.ends_with(KEY_SEPARATOR) {
            key.push(KEY_SEPARATOR);
        }
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        tokio::spawn(run_watch(store, cancel, key, recursive, config, tx));
        Self { rx }
    }

    /// Next event, or `None` once the watcher has shut down.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    /// The underlying result channel, for callers that `select!` over it.
    pub fn results(&mut self) -> &mut mpsc::Receiver<WatchEvent> {
        &mut self.rx
    }

    pub fn into_stream(self) -> ReceiverStream<WatchEvent> {
        ReceiverStream::new(self.rx)
    }
}

/// Control task: the only owner of `tx`, so dropping it on return closes the
/// result channel exactly once.
async fn run_watch(
    store: Arc<dyn BackingStore>,
    cancel: CancellationToken,
    key: String,
    recursive: bool,
    config: WatchConfig,
    tx: mpsc::Sender<WatchEvent>,
) {
    let mut reconnect = tokio::time::interval(config.reconnect_interval());
    reconnect.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // The first tick fires immediately; later ones rate-limit reconnects.
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = reconnect.tick() => {}
        }

        // Per-attempt token: everything belonging to one subscription dies
        // with it, whether it broke on its own or the caller cancelled.
        let session = cancel.child_token();
        let options = WatchOptions { prefix: recursive };
        match store.watch(&key, options).await {
            Ok(subscription) => {
                forward(subscription, &tx, &session).await;
            }
            Err(error) => {
                warn!(%key, "failed to open watch subscription: {error}");
            }
        }
        session.cancel();

        if cancel.is_cancelled() || tx.is_closed() {
            break;
        }
        debug!(%key, "watch subscription interrupted, reconnecting");
    }
}

/// Forwards one raw subscription until it breaks, the session ends, or the
/// consumer goes away.
async fn forward(
    mut subscription: WatchSubscription,
    tx: &mpsc::Sender<WatchEvent>,
    session: &CancellationToken,
) {
    loop {
        let batch = tokio::select! {
            _ = session.cancelled() => return,
            batch = subscription.recv() => match batch {
                Some(batch) => batch,
                None => return,
            },
        };

        for notification in batch {
            let event = WatchEvent::from(notification);
            if event.kind == WatchEventKind::Unknown {
                warn!(key = %event.key, "dropping unrecognized watch notification");
                continue;
            }
            tokio::select! {
                _ = session.cancelled() => return,
                sent = tx.send(event) => {
                    if sent.is_err() {
                        // Consumer dropped the watcher
                        return;
                    }
                }
            }
        }
    }
}
