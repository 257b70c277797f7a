use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;

use crate::constants::RING_SEQ_WIDTH;
use crate::utils::async_task::run_cancellable;
use crate::utils::time::monotonic_nanos;
use crate::utils::time::sortable_nanos;
use crate::Error;

#[test]
fn test_monotonic_nanos_strictly_increasing() {
    let mut previous = 0;
    for _ in 0..10_000 {
        let current = monotonic_nanos();
        assert!(current > previous, "{} should be > {}", current, previous);
        previous = current;
    }
}

#[test]
fn test_sortable_nanos_fixed_width() {
    for _ in 0..100 {
        assert_eq!(sortable_nanos().len(), RING_SEQ_WIDTH);
    }
}

#[test]
fn test_sortable_nanos_lexicographic_order_matches_issue_order() {
    let keys: Vec<String> = (0..1_000).map(|_| sortable_nanos()).collect();
    let sorted: BTreeSet<String> = keys.iter().cloned().collect();
    assert_eq!(sorted.len(), keys.len());
    assert!(sorted.iter().cloned().eq(keys.into_iter()));
}

#[tokio::test]
async fn test_run_cancellable_returns_cancelled() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let r = run_cancellable(&cancel, std::future::pending::<std::result::Result<(), crate::StoreError>>()).await;
    assert!(matches!(r, Err(Error::Cancelled)));
}
