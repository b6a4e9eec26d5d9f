//! # Fixed-Width Row Codec
//!
//! Rows in keeldb are fixed-width byte blobs whose layout is derived from a
//! caller-supplied schema. The B+tree itself never interprets row bytes; it
//! stores and returns blobs of exactly `Schema::row_size()` bytes. This
//! module owns the translation between typed values and those blobs.
//!
//! ## Row Layout
//!
//! Columns are laid out in declaration order at fixed offsets:
//!
//! - `INT` columns occupy 4 bytes, little-endian.
//! - `TEXT(n)` columns occupy exactly `n` bytes. Shorter strings are padded
//!   with NUL bytes; longer strings are truncated at the byte level.
//!
//! ```text
//! Schema (id INT, name TEXT(8)):
//!
//! Offset  Size  Column
//! ------  ----  ------
//! 0       4     id
//! 4       8     name
//!                        row_size = 12
//! ```
//!
//! Trailing NUL bytes are stripped when a TEXT column is read back, so the
//! padding is invisible to callers. A truncation that splits a multi-byte
//! character is repaired lossily on read.

mod row;
mod schema;

pub use row::{Row, Value};
pub use schema::{Column, DataType, Schema};
