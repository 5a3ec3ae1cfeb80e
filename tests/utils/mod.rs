pub mod actions;
pub mod http;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use actions::Pair;
#[allow(unused_imports)]
pub use http::HttpClient;
pub use setup::{TestSetup, TestSetupBuilder};
