// Public API
pub use scoring::{score, Score};
pub use validation::{CodeError, CodeKind, CodeRules};

// Internal modules
mod scoring;
mod validation;
