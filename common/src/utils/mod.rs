//! Utility functions and helpers.

pub mod identifier;
pub mod sql_validator;

// Re-export commonly used types
pub use identifier::Identifier;
pub use sql_validator::SqlValidator;
