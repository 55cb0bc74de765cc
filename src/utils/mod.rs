//! Shared utilities

pub mod cast;
pub mod error;
pub mod validation;

pub use error::{AppError, AppResult, ErrorResponse, FieldErrors, HostgroupError};
