//! Shared types for sofs components.
//!
//! Carries the status-code registry, the `Status` error type and `Result`
//! alias, strongly-typed ids, and the UTC timestamp wrapper used by
//! destructive object-store operations.

#[allow(non_snake_case)]
pub mod status_code;

pub mod result;
pub mod status;

#[macro_use]
pub mod strong_type;

pub mod ids;
pub mod time;

// Re-export commonly used items at the crate root.
pub use ids::*;
pub use result::{Result, Void, make_error, make_error_msg};
pub use status::Status;
pub use status_code::*;
pub use time::UtcTime;
