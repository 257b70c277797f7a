mod config;
mod constants;
mod errors;
mod liveness;
mod ring;
mod store;
mod utils;
mod watch;

pub use config::*;
pub use errors::*;
pub use liveness::*;
pub use ring::*;
pub use store::*;
pub use watch::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
