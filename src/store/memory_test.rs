use std::time::Duration;

use crate::store::BackingStore;
use crate::Compare;
use crate::GetOptions;
use crate::MemoryStore;
use crate::NotificationKind;
use crate::StoreError;
use crate::TxnOp;
use crate::TxnRequest;
use crate::TxnResult;
use crate::WatchOptions;

fn put_op(
    key: &str,
    value: &str,
) -> TxnOp {
    TxnOp::Put {
        key: key.to_string(),
        value: value.as_bytes().to_vec(),
        lease: None,
    }
}

async fn put(
    store: &MemoryStore,
    key: &str,
    value: &str,
) {
    let response = store
        .txn(TxnRequest::default().and_then(put_op(key, value)))
        .await
        .expect("txn should succeed");
    assert!(response.succeeded);
}

#[tokio::test]
async fn test_get_exact_and_prefix_ordering() {
    let store = MemoryStore::new();
    put(&store, "/t/b", "2").await;
    put(&store, "/t/a", "1").await;
    put(&store, "/t/c", "3").await;
    put(&store, "/u/d", "4").await;

    let exact = store.get("/t/b", GetOptions::default()).await.unwrap();
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].value, b"2");

    let all = store.get("/t/", GetOptions::all_under()).await.unwrap();
    let keys: Vec<&str> = all.iter().map(|kv| kv.key.as_str()).collect();
    assert_eq!(keys, vec!["/t/a", "/t/b", "/t/c"]);

    let first = store.get("/t/", GetOptions::first_under()).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].key, "/t/a");
}

#[tokio::test]
async fn test_version_tracks_puts_since_absent() {
    let store = MemoryStore::new();
    put(&store, "/k", "a").await;
    put(&store, "/k", "b").await;
    let kv = &store.get("/k", GetOptions::default()).await.unwrap()[0];
    assert_eq!(kv.version, 2);

    let response = store
        .txn(TxnRequest::default().and_then(TxnOp::Delete {
            key: "/k".to_string(),
            prefix: false,
        }))
        .await
        .unwrap();
    assert!(matches!(response.responses[0], TxnResult::Delete { deleted: 1 }));

    put(&store, "/k", "c").await;
    let kv = &store.get("/k", GetOptions::default()).await.unwrap()[0];
    assert_eq!(kv.version, 1, "version restarts after the key was absent");
}

#[tokio::test]
async fn test_txn_takes_failure_branch_on_stale_revision() {
    let store = MemoryStore::new();
    put(&store, "/k", "a").await;
    let observed = store.get("/k", GetOptions::default()).await.unwrap()[0].mod_revision;
    put(&store, "/k", "b").await;

    let response = store
        .txn(
            TxnRequest::default()
                .when(Compare::ModRevision {
                    key: "/k".to_string(),
                    revision: observed,
                })
                .and_then(put_op("/k", "lost"))
                .or_else(TxnOp::Get {
                    key: "/k".to_string(),
                }),
        )
        .await
        .unwrap();

    assert!(!response.succeeded);
    let TxnResult::Get { kvs } = &response.responses[0] else {
        panic!("expected a Get result");
    };
    assert_eq!(kvs[0].value, b"b", "success branch must not have applied");
}

#[tokio::test]
async fn test_version_zero_matches_absent_key() {
    let store = MemoryStore::new();
    let response = store
        .txn(
            TxnRequest::default()
                .when(Compare::Version {
                    key: "/absent".to_string(),
                    version: 0,
                })
                .and_then(put_op("/absent", "x")),
        )
        .await
        .unwrap();
    assert!(response.succeeded);

    // Now present, the same guard no longer holds.
    let response = store
        .txn(
            TxnRequest::default()
                .when(Compare::Version {
                    key: "/absent".to_string(),
                    version: 0,
                })
                .and_then(put_op("/absent", "y")),
        )
        .await
        .unwrap();
    assert!(!response.succeeded);
}

#[tokio::test(start_paused = true)]
async fn test_lease_expiry_deletes_key_and_notifies() {
    let store = MemoryStore::new();
    let lease = store.grant(Duration::from_millis(300)).await.unwrap();
    let response = store
        .txn(TxnRequest::default().and_then(TxnOp::Put {
            key: "/m/e1".to_string(),
            value: b"ttl".to_vec(),
            lease: Some(lease),
        }))
        .await
        .unwrap();
    assert!(response.succeeded);

    let mut subscription = store
        .watch("/m/e1", WatchOptions::default())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;

    assert!(store.get("/m/e1", GetOptions::default()).await.unwrap().is_empty());
    let batch = tokio::time::timeout(Duration::from_secs(1), subscription.recv())
        .await
        .expect("expiry notification should arrive")
        .expect("subscription should still be open");
    assert_eq!(batch[0].kind, NotificationKind::Delete);
    assert_eq!(batch[0].key, "/m/e1");
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_extends_deadline() {
    let store = MemoryStore::new();
    let lease = store.grant(Duration::from_millis(300)).await.unwrap();
    let response = store
        .txn(TxnRequest::default().and_then(TxnOp::Put {
            key: "/m/e2".to_string(),
            value: b"ttl".to_vec(),
            lease: Some(lease),
        }))
        .await
        .unwrap();
    assert!(response.succeeded);

    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(200)).await;
        store.keep_alive_once(lease).await.unwrap();
    }
    assert_eq!(store.get("/m/e2", GetOptions::default()).await.unwrap().len(), 1);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(store.get("/m/e2", GetOptions::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_revoke_deletes_attached_keys_immediately() {
    let store = MemoryStore::new();
    let lease = store.grant(Duration::from_secs(60)).await.unwrap();
    let response = store
        .txn(TxnRequest::default().and_then(TxnOp::Put {
            key: "/m/e3".to_string(),
            value: b"ttl".to_vec(),
            lease: Some(lease),
        }))
        .await
        .unwrap();
    assert!(response.succeeded);

    store.revoke(lease).await.unwrap();
    assert!(store.get("/m/e3", GetOptions::default()).await.unwrap().is_empty());

    let err = store.keep_alive_once(lease).await.unwrap_err();
    assert!(matches!(err, StoreError::LeaseNotFound(id) if id == lease));
}

#[tokio::test]
async fn test_keep_alive_of_unknown_lease_fails() {
    let store = MemoryStore::new();
    let err = store.keep_alive_once(42).await.unwrap_err();
    assert!(matches!(err, StoreError::LeaseNotFound(42)));
    let err = store.revoke(42).await.unwrap_err();
    assert!(matches!(err, StoreError::LeaseNotFound(42)));
}

#[tokio::test]
async fn test_prefix_watch_sees_applied_order() {
    let store = MemoryStore::new();
    let mut subscription = store
        .watch("/t/", WatchOptions { prefix: true })
        .await
        .unwrap();

    put(&store, "/t/a", "1").await;
    put(&store, "/other", "x").await;
    store
        .txn(TxnRequest::default().and_then(TxnOp::Delete {
            key: "/t/a".to_string(),
            prefix: false,
        }))
        .await
        .unwrap();

    let first = subscription.recv().await.unwrap();
    assert_eq!(first[0].kind, NotificationKind::Put);
    assert_eq!(first[0].key, "/t/a");
    let second = subscription.recv().await.unwrap();
    assert_eq!(second[0].kind, NotificationKind::Delete);
    assert_eq!(second[0].key, "/t/a");
}

#[tokio::test]
async fn test_disconnect_watchers_closes_subscriptions() {
    let store = MemoryStore::new();
    let mut subscription = store
        .watch("/t/", WatchOptions { prefix: true })
        .await
        .unwrap();
    assert_eq!(store.watcher_count(), 1);

    store.disconnect_watchers();
    assert_eq!(store.watcher_count(), 0);
    assert!(subscription.recv().await.is_none());
}
