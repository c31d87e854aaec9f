//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! - **Snowflake**: time-sortable unique id used as the identity key

mod snowflake;

pub use snowflake::*;
