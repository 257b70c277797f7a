// -
// Key-space namespaces

/// Ring entries live under `<RING_KEY_PREFIX>/<ring name>/<sequence>`
pub(crate) const RING_KEY_PREFIX: &str = "/fleetsync/rings";

/// Monitor marker keys live under `<MONITOR_KEY_PREFIX>/<monitor name>`
pub(crate) const MONITOR_KEY_PREFIX: &str = "/fleetsync/monitors";

/// Separator appended to a watch key when subscribing recursively
pub(crate) const KEY_SEPARATOR: char = '/';

// -
// Tuning

/// Width of the zero-padded decimal sequence suffix on ring entry keys.
/// u64 nanoseconds need at most 20 decimal digits; fixed width keeps the
/// lexicographic order identical to the numeric order.
pub(crate) const RING_SEQ_WIDTH: usize = 20;
