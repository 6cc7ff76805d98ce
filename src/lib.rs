// Public API for integration tests and the server binary

pub mod api;
pub mod clock;
pub mod code;
pub mod config;
pub mod error;
pub mod llm;
pub mod protocol;
pub mod questions;
pub mod state;
pub mod store;
pub mod types;

// Fixtures for unit and integration tests
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
