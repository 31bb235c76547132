//! Warehouse abstraction layer
//!
//! Implementations live in [`crate::adapters::postgresql`] and
//! [`crate::adapters::memory`].

pub mod traits;

pub use traits::{RowError, Warehouse};
