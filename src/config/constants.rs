//! # keyroute Configuration Constants
//!
//! This module centralizes the numeric limits shared by the fragment parser,
//! the partition router and the decision engine. Values that depend on each
//! other are co-located and their relationships are checked at compile time.
//!
//! ## Dependency Graph
//!
//! ```text
//! PART_ID_BITS (28)
//!       │
//!       ├─> MAX_PHYSICAL_PART_ID (derived: 2^28 - 1)
//!       │     A physical id must fit below the part-space prefix.
//!       │
//!       └─> MAX_PART_SPACE (derived: u64::MAX >> 28)
//!             Largest prefix that survives `space << PART_ID_BITS`.
//!
//! MAX_RELATION_NUM (255)
//!       │
//!       └─> DEFAULT_MAX_RELATIONS (must be <=)
//!
//! DEFAULT_MAX_PARSE_NODES (4096)
//!       │
//!       └─> MIN_PARSE_NODES (must be <=)
//!             Smallest arena a caller may configure; a single
//!             `col = value` predicate needs five nodes.
//!
//! MAX_NESTING_DEPTH (256)
//!       Recursion bound of the fragment parser; deeper input is a
//!       syntax issue, never a stack overflow.
//! ```
//!
//! ## Critical Invariants
//!
//! 1. `DEFAULT_MAX_RELATIONS <= MAX_RELATION_NUM`
//! 2. `MIN_PARSE_NODES <= DEFAULT_MAX_PARSE_NODES`
//! 3. `MAX_PHYSICAL_PART_ID == (1 << PART_ID_BITS) - 1`
//!
//! ## Usage
//!
//! ```ignore
//! use crate::config::{PART_ID_BITS, MAX_RELATION_NUM};
//! ```

// ============================================================================
// PARTITION ID LAYOUT
// A global partition id is `(part_space << PART_ID_BITS) | physical_id`
// ============================================================================

/// Number of low bits reserved for the physical partition id.
pub const PART_ID_BITS: u32 = 28;

/// Largest physical partition id representable below the part-space prefix.
pub const MAX_PHYSICAL_PART_ID: u64 = (1u64 << PART_ID_BITS) - 1;

/// Largest part-space prefix that can be shifted without losing bits.
pub const MAX_PART_SPACE: u64 = u64::MAX >> PART_ID_BITS;

const _: () = assert!(
    MAX_PHYSICAL_PART_ID == (1u64 << PART_ID_BITS) - 1,
    "MAX_PHYSICAL_PART_ID derivation mismatch"
);

const _: () = assert!(
    PART_ID_BITS < 64,
    "PART_ID_BITS must leave room for the part-space prefix"
);

// ============================================================================
// PARSER LIMITS
// Per-request bounds on the fragment parser's arena and relation output
// ============================================================================

/// Hard upper bound on relations a single statement may produce.
pub const MAX_RELATION_NUM: usize = 255;

/// Relation cap used when the caller does not configure one.
pub const DEFAULT_MAX_RELATIONS: usize = MAX_RELATION_NUM;

/// Token, list and relation nodes a single parse may allocate by default.
pub const DEFAULT_MAX_PARSE_NODES: usize = 4096;

/// Smallest node budget accepted by `RouterConfigBuilder`.
pub const MIN_PARSE_NODES: usize = 16;

/// Deepest nesting of parentheses, `NOT` and unary operators the fragment
/// parser follows. Recursion does not allocate arena nodes, so this bounds
/// the parser's stack use independently of `max_parse_nodes`.
pub const MAX_NESTING_DEPTH: usize = 256;

const _: () = assert!(
    DEFAULT_MAX_RELATIONS <= MAX_RELATION_NUM,
    "DEFAULT_MAX_RELATIONS must not exceed MAX_RELATION_NUM"
);

const _: () = assert!(
    MIN_PARSE_NODES <= DEFAULT_MAX_PARSE_NODES,
    "MIN_PARSE_NODES must be <= DEFAULT_MAX_PARSE_NODES"
);

// ============================================================================
// NAMES
// ============================================================================

/// Pseudo-column that addresses the first partition key of a rowid-partitioned table.
pub const ROWID_COLUMN_NAME: &str = "ROWID";

/// First cluster major version that hashes every KEY partition with murmur.
pub const MURMUR_CLUSTER_MAJOR: u32 = 4;
