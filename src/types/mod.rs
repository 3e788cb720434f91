//! # Routing Type System
//!
//! Types the partition router needs to turn a literal into hash input.
//!
//! ## Module Structure
//!
//! - `value`: `Literal<'a>`, a scalar as written in the statement
//! - `column`: `ColumnType` and `Collation` of a partition-key column
//! - `cast`: `ValueCaster` trait, `DefaultCaster`, and the coerced `CastValue`
//!
//! ## Usage
//!
//! ```ignore
//! use keyroute::types::{Collation, ColumnType, DefaultCaster, Literal, ValueCaster};
//!
//! let value = DefaultCaster.cast(&Literal::Str("42"), &ColumnType::bigint(), Collation::Binary)?;
//! ```

pub mod cast;
pub mod column;
pub mod value;

pub use cast::{decode_hex, CastValue, DefaultCaster, KeyBytes, ValueCaster};
pub use column::{Collation, ColumnType};
pub use value::Literal;
