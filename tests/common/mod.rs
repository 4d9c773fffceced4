//! Common test utilities for media-relay integration tests

#[allow(dead_code)]
pub mod assertions;
#[allow(dead_code)]
pub mod client;
#[allow(dead_code)]
pub mod tools;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use client::*;
#[allow(unused_imports)]
pub use tools::*;
