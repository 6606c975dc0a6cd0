//! Common test utilities for vaultlift-migrate
//!
//! - In-memory fakes for the secret store, object store and key wrapper
//! - A client factory handing out those fakes
//! - Fixtures for secrets, configuration and input directories

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
