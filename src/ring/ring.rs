use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::constants::RING_KEY_PREFIX;
use crate::store::BackingStore;
use crate::utils::async_task::run_cancellable;
use crate::utils::time::sortable_nanos;
use crate::Compare;
use crate::GetOptions;
use crate::KeyValue;
use crate::Result;
use crate::RingError;
use crate::TxnOp;
use crate::TxnRequest;

/// Distributed round-robin token ring.
///
/// The ring's entire state is the set of live entries under its key prefix,
/// each keyed by a fixed-width monotonic timestamp so entries sort in
/// insertion order. Every mutation is an optimistic compare-and-swap loop:
/// read a snapshot, pin each touched key at its observed revision, submit
/// one transaction, retry from the top if a concurrent writer got there
/// first. Replicas sharing a ring name therefore never lose or duplicate an
/// entry, without any coordination beyond the store itself.
#[derive(Clone)]
pub struct Ring {
    store: Arc<dyn BackingStore>,
    name: String,
    prefix: String,
}

impl Ring {
    pub fn new(
        store: Arc<dyn BackingStore>,
        name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let prefix = format!("{}/{}/", RING_KEY_PREFIX, name);
        Self {
            store,
            name,
            prefix,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A fresh tail key, sorting after every currently visible entry.
    fn tail_key(&self) -> String {
        format!("{}{}", self.prefix, sortable_nanos())
    }

    /// Inserts `value` at the tail. Entries already holding `value` are
    /// deleted in the same transaction, so a re-add moves the value to the
    /// tail and the ring keeps at most one live entry per distinct value.
    pub async fn add(
        &self,
        cancel: &CancellationToken,
        value: &str,
    ) -> Result<()> {
        loop {
            let entries =
                run_cancellable(cancel, self.store.get(&self.prefix, GetOptions::all_under()))
                    .await?;
            let tail_key = self.tail_key();

            let mut request = TxnRequest::default();
            for entry in entries.iter().filter(|e| e.value == value.as_bytes()) {
                request = request
                    .when(Compare::ModRevision {
                        key: entry.key.clone(),
                        revision: entry.mod_revision,
                    })
                    .and_then(TxnOp::Delete {
                        key: entry.key.clone(),
                        prefix: false,
                    });
            }
            if request.compare.is_empty() {
                request = request.when(Compare::Version {
                    key: tail_key.clone(),
                    version: 0,
                });
            }
            request = request.and_then(TxnOp::Put {
                key: tail_key,
                value: value.as_bytes().to_vec(),
                lease: None,
            });

            let response = run_cancellable(cancel, self.store.txn(request)).await?;
            if response.succeeded {
                return Ok(());
            }
            debug!(ring = %self.name, value, "add lost a concurrent update, retrying");
        }
    }

    /// Deletes every entry holding `value`. Succeeds without error when the
    /// ring holds none.
    pub async fn remove(
        &self,
        cancel: &CancellationToken,
        value: &str,
    ) -> Result<()> {
        loop {
            let entries =
                run_cancellable(cancel, self.store.get(&self.prefix, GetOptions::all_under()))
                    .await?;

            let mut request = TxnRequest::default();
            for entry in entries.iter().filter(|e| e.value == value.as_bytes()) {
                request = request
                    .when(Compare::ModRevision {
                        key: entry.key.clone(),
                        revision: entry.mod_revision,
                    })
                    .and_then(TxnOp::Delete {
                        key: entry.key.clone(),
                        prefix: false,
                    });
            }
            if request.success.is_empty() {
                return Ok(());
            }

            let response = run_cancellable(cancel, self.store.txn(request)).await?;
            if response.succeeded {
                return Ok(());
            }
            debug!(ring = %self.name, value, "remove lost a concurrent update, retrying");
        }
    }

    /// Dequeues the head entry and re-inserts its value at the tail, both in
    /// one transaction; returns the head value. The rotation makes `next` an
    /// infinite round-robin over the live value set.
    ///
    /// # Errors
    /// - [`RingError::Empty`] when no entries are queued
    pub async fn next(
        &self,
        cancel: &CancellationToken,
    ) -> Result<String> {
        loop {
            let head = self.head(cancel).await?;
            let value = decode_value(&head)?;

            let request = TxnRequest::default()
                .when(Compare::ModRevision {
                    key: head.key.clone(),
                    revision: head.mod_revision,
                })
                .and_then(TxnOp::Delete {
                    key: head.key,
                    prefix: false,
                })
                .and_then(TxnOp::Put {
                    key: self.tail_key(),
                    value: head.value,
                    lease: None,
                });

            let response = run_cancellable(cancel, self.store.txn(request)).await?;
            if response.succeeded {
                return Ok(value);
            }
            debug!(ring = %self.name, "next lost a concurrent rotation, retrying");
        }
    }

    /// The head entry's value, without rotating.
    ///
    /// # Errors
    /// - [`RingError::Empty`] when no entries are queued
    pub async fn peek(
        &self,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let head = self.head(cancel).await?;
        decode_value(&head)
    }

    async fn head(
        &self,
        cancel: &CancellationToken,
    ) -> Result<KeyValue> {
        let mut entries =
            run_cancellable(cancel, self.store.get(&self.prefix, GetOptions::first_under()))
                .await?;
        if entries.is_empty() {
            return Err(RingError::Empty.into());
        }
        Ok(entries.swap_remove(0))
    }
}

fn decode_value(entry: &KeyValue) -> Result<String> {
    String::from_utf8(entry.value.clone())
        .map_err(|_| RingError::InvalidEntry(entry.key.clone()).into())
}
