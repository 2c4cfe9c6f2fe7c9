//! Git operations for keeping working copies in sync.

pub mod auth;
pub mod parse;
pub mod repository;
pub mod types;

pub use parse::validate_ref;
pub use repository::GitRepository;
pub use types::*;
