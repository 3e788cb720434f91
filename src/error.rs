//! # Routing Errors
//!
//! Every fallible operation in the crate returns `eyre::Result`. Failures the
//! caller needs to tell apart are raised as a [`RouteError`] inside the report
//! (`bail!(RouteError::...)`), so callers classify them with
//! [`RouteError::kind_of`] without string matching. Context added later with
//! `wrap_err` does not hide the typed error from `downcast_ref`.
//!
//! ## Taxonomy
//!
//! | Kind               | Raised by                    | Effect on the request              |
//! |--------------------|------------------------------|------------------------------------|
//! | InvalidArgument    | router entry, partition desc | request rejected                   |
//! | AllocationFailure  | parse arena                  | parse aborted, routes as scan-all  |
//! | Overflow           | literal parsing              | request rejected                   |
//! | NotSupported       | hashing, statement scan      | predicate or request not routable  |
//! | Cast / Accuracy    | value coercion               | single predicate degraded          |
//! | ShardNotFound      | shard map lookup             | request rejected                   |
//! | UnknownTable       | catalog lookup               | request rejected                   |
//! | Unexpected         | rewrite offset validation    | request rejected, never retried    |
//!
//! Syntax errors in the routed fragment are not errors: they are tolerated and
//! recorded on the parse result.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    AllocationFailure,
    Overflow,
    NotSupported,
    Cast,
    Accuracy,
    ShardNotFound,
    UnknownTable,
    Unexpected,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid-argument",
            ErrorKind::AllocationFailure => "allocation-failure",
            ErrorKind::Overflow => "overflow",
            ErrorKind::NotSupported => "not-supported",
            ErrorKind::Cast => "cast",
            ErrorKind::Accuracy => "accuracy",
            ErrorKind::ShardNotFound => "shard-not-found",
            ErrorKind::UnknownTable => "unknown-table",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    InvalidArgument { reason: String },
    AllocationFailure { limit: usize },
    Overflow { literal: String },
    NotSupported { what: String },
    Cast { value: String, target: String },
    Accuracy { value: String, target: String },
    ShardNotFound { partition_id: u64 },
    UnknownTable { database: String, table: String },
    Unexpected { reason: String },
}

impl RouteError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        RouteError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn not_supported(what: impl Into<String>) -> Self {
        RouteError::NotSupported { what: what.into() }
    }

    pub fn unexpected(reason: impl Into<String>) -> Self {
        RouteError::Unexpected {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RouteError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            RouteError::AllocationFailure { .. } => ErrorKind::AllocationFailure,
            RouteError::Overflow { .. } => ErrorKind::Overflow,
            RouteError::NotSupported { .. } => ErrorKind::NotSupported,
            RouteError::Cast { .. } => ErrorKind::Cast,
            RouteError::Accuracy { .. } => ErrorKind::Accuracy,
            RouteError::ShardNotFound { .. } => ErrorKind::ShardNotFound,
            RouteError::UnknownTable { .. } => ErrorKind::UnknownTable,
            RouteError::Unexpected { .. } => ErrorKind::Unexpected,
        }
    }

    /// Kind of the typed error carried by `report`, if any.
    pub fn kind_of(report: &eyre::Report) -> Option<ErrorKind> {
        report.downcast_ref::<RouteError>().map(RouteError::kind)
    }

    /// Cast and accuracy failures only disqualify the value being routed.
    pub fn degrades_predicate(&self) -> bool {
        matches!(self.kind(), ErrorKind::Cast | ErrorKind::Accuracy)
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::InvalidArgument { reason } => write!(f, "invalid argument: {}", reason),
            RouteError::AllocationFailure { limit } => {
                write!(f, "parse arena exhausted after {} nodes", limit)
            }
            RouteError::Overflow { literal } => {
                write!(f, "integer literal {} overflows a signed 64-bit value", literal)
            }
            RouteError::NotSupported { what } => write!(f, "not supported: {}", what),
            RouteError::Cast { value, target } => {
                write!(f, "cannot cast {} to {}", value, target)
            }
            RouteError::Accuracy { value, target } => {
                write!(f, "value {} does not fit {} exactly", value, target)
            }
            RouteError::ShardNotFound { partition_id } => {
                write!(f, "no shard is mapped to partition {}", partition_id)
            }
            RouteError::UnknownTable { database, table } => {
                write!(f, "no routing metadata for {}.{}", database, table)
            }
            RouteError::Unexpected { reason } => write!(f, "unexpected: {}", reason),
        }
    }
}

impl std::error::Error for RouteError {}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::{bail, Result, WrapErr};

    fn fails_with(err: RouteError) -> Result<()> {
        bail!(err)
    }

    #[test]
    fn test_kind_survives_report() {
        let report = fails_with(RouteError::AllocationFailure { limit: 16 }).unwrap_err();
        assert_eq!(
            RouteError::kind_of(&report),
            Some(ErrorKind::AllocationFailure)
        );
    }

    #[test]
    fn test_kind_survives_wrap_err() {
        let report = fails_with(RouteError::unexpected("offset 90 past end"))
            .wrap_err("rewriting statement for shard 3")
            .unwrap_err();
        assert_eq!(RouteError::kind_of(&report), Some(ErrorKind::Unexpected));
    }

    #[test]
    fn test_untyped_report_has_no_kind() {
        let report = eyre::eyre!("plain failure");
        assert_eq!(RouteError::kind_of(&report), None);
    }

    #[test]
    fn test_display_messages() {
        let err = RouteError::Overflow {
            literal: "99999999999999999999".into(),
        };
        assert!(err.to_string().contains("99999999999999999999"));
        assert_eq!(
            RouteError::ShardNotFound { partition_id: 7 }.to_string(),
            "no shard is mapped to partition 7"
        );
    }

    #[test]
    fn test_degrading_kinds() {
        let cast = RouteError::Cast {
            value: "'abc'".into(),
            target: "BIGINT".into(),
        };
        assert!(cast.degrades_predicate());
        assert!(!RouteError::not_supported("RANGE").degrades_predicate());
    }
}
