//! Logging setup shared by the relay binaries.
mod logger;
pub use logger::*;
