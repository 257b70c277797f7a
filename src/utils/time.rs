use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use crate::constants::RING_SEQ_WIDTH;

static LAST_NANOS: AtomicU64 = AtomicU64::new(0);

/// Wall-clock nanoseconds, strictly increasing process-wide even when the
/// system clock stalls or steps backwards.
pub(crate) fn monotonic_nanos() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_nanos() as u64;

    let mut last = LAST_NANOS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_NANOS.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}

/// Fixed-width, zero-padded rendering of [`monotonic_nanos`] whose
/// lexicographic order matches its numeric order.
pub(crate) fn sortable_nanos() -> String {
    format!("{:0width$}", monotonic_nanos(), width = RING_SEQ_WIDTH)
}
