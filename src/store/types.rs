use tokio::sync::mpsc;

/// Handle for a store lease; 0 means "no lease".
pub type LeaseId = i64;

/// Store-assigned modification revision; monotonically increasing across
/// every applied mutation.
pub type Revision = i64;

/// One key's state as returned by [`crate::BackingStore::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
    /// Revision of the mutation that last touched this key
    pub mod_revision: Revision,
    /// Number of Puts this key has seen since it was last absent; 1 means
    /// the key was just created
    pub version: i64,
    /// Lease currently attached to this key, 0 if none
    pub lease: LeaseId,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
    /// Treat the key as a prefix and return every descendant, ordered
    /// ascending by key
    pub prefix: bool,
    /// Maximum number of results; 0 means unlimited
    pub limit: usize,
}

impl GetOptions {
    /// Every key under a prefix
    pub fn all_under() -> Self {
        Self {
            prefix: true,
            limit: 0,
        }
    }

    /// Only the lexicographically first key under a prefix
    pub fn first_under() -> Self {
        Self {
            prefix: true,
            limit: 1,
        }
    }
}

/// A transaction guard. The transaction's success branch applies only if
/// every compare holds at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compare {
    /// Key's version equals the given value; version 0 matches an absent key
    Version { key: String, version: i64 },
    /// Key's mod-revision equals the given value; revision 0 matches an
    /// absent key
    ModRevision { key: String, revision: Revision },
}

#[derive(Debug, Clone)]
pub enum TxnOp {
    Put {
        key: String,
        value: Vec<u8>,
        lease: Option<LeaseId>,
    },
    Delete {
        key: String,
        prefix: bool,
    },
    Get {
        key: String,
    },
}

/// If/Then/Else transaction request. All guards and all ops of the taken
/// branch are evaluated atomically.
#[derive(Debug, Clone, Default)]
pub struct TxnRequest {
    pub compare: Vec<Compare>,
    pub success: Vec<TxnOp>,
    pub failure: Vec<TxnOp>,
}

impl TxnRequest {
    pub fn when(mut self, compare: Compare) -> Self {
        self.compare.push(compare);
        self
    }

    pub fn and_then(mut self, op: TxnOp) -> Self {
        self.success.push(op);
        self
    }

    pub fn or_else(mut self, op: TxnOp) -> Self {
        self.failure.push(op);
        self
    }
}

#[derive(Debug, Clone)]
pub enum TxnResult {
    Put,
    Delete { deleted: usize },
    Get { kvs: Vec<KeyValue> },
}

#[derive(Debug, Clone)]
pub struct TxnResponse {
    /// Whether every compare held and the success branch was applied
    pub succeeded: bool,
    pub responses: Vec<TxnResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Put,
    Delete,
}

/// One raw change notification from the store's watch stream.
#[derive(Debug, Clone)]
pub struct WatchNotification {
    pub kind: NotificationKind,
    pub key: String,
    pub value: Vec<u8>,
    /// Post-Put version of the key; 0 for deletes
    pub version: i64,
    pub mod_revision: Revision,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Observe every key under the given prefix instead of one exact key
    pub prefix: bool,
}

/// One raw watch subscription. Notifications arrive batched, in the order
/// the store applied them; the channel closing means the subscription broke
/// (or the store shut down) and a new one must be opened to keep observing.
#[derive(Debug)]
pub struct WatchSubscription {
    rx: mpsc::UnboundedReceiver<Vec<WatchNotification>>,
}

impl WatchSubscription {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Vec<WatchNotification>>) -> Self {
        Self { rx }
    }

    /// Next batch, or `None` once the subscription broke.
    pub async fn recv(&mut self) -> Option<Vec<WatchNotification>> {
        self.rx.recv().await
    }
}
