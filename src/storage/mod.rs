//! File system storage operations
//!
//! Optional mirror of exported event bodies as one JSON array file per
//! object type.

mod json_array;

pub use json_array::JsonArrayWriter;
