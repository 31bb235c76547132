//! Data transformation logic
//!
//! Pure transformations applied while decoding. Nothing here performs I/O.

pub mod flatten;

pub use flatten::flatten;
