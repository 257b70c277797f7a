mod lease_monitor;
mod shutdown;
pub use lease_monitor::*;
pub use shutdown::*;
