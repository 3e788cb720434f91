//! # keyroute Configuration Module
//!
//! Compile-time limits live in [`constants`]; the per-router runtime options
//! live in [`RouterConfig`], built either through [`RouterConfigBuilder`] or
//! deserialized by the external config layer (every field has a default, so
//! a partial document is accepted).
//!
//! ## Configuration Options
//!
//! | Option                  | Default      | Description                                        |
//! |-------------------------|--------------|----------------------------------------------------|
//! | name_case               | insensitive  | Folding policy for database and table qualifiers   |
//! | quote_mode              | mysql        | Identifier quote and backslash escapes, see below  |
//! | strict_accuracy         | false        | Always run the accuracy check after coercion       |
//! | max_parse_nodes         | 4096         | Arena node budget per statement                    |
//! | max_relations           | 255          | Relation cap per statement                         |
//! | default_cluster_version | 4.0.0        | Cluster version used when the caller supplies none |
//! | route_on_partial_parse  | true         | Route on relations reduced before a syntax error   |
//! | narrow_hash_ranges      | true         | Narrow `>=`/`<=` bounds that share one partition   |
//!
//! `mysql` quotes identifiers with back-quotes and reads `\` escapes in
//! strings; `ansi` quotes identifiers with `"` and takes backslash literally.
//!
//! ## Usage
//!
//! ```ignore
//! let config = RouterConfig::builder()
//!     .quote_mode(QuoteMode::Ansi)
//!     .max_relations(64)
//!     .build()?;
//! ```

pub mod constants;
pub use constants::*;

use eyre::{ensure, Result};
use serde::Deserialize;

use crate::partition::ClusterVersion;

/// How database and table qualifiers are compared against metadata names.
///
/// Column names are always compared with ASCII case folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameCase {
    Sensitive,
    #[default]
    Insensitive,
}

impl NameCase {
    pub fn eq(&self, a: &str, b: &str) -> bool {
        match self {
            NameCase::Sensitive => a == b,
            NameCase::Insensitive => a.eq_ignore_ascii_case(b),
        }
    }

    /// Normalized form used as a catalog key.
    pub fn fold(&self, name: &str) -> String {
        match self {
            NameCase::Sensitive => name.to_string(),
            NameCase::Insensitive => name.to_ascii_lowercase(),
        }
    }
}

/// Identifier quoting convention of the client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteMode {
    /// Back-quoted identifiers; `"` delimits strings.
    #[default]
    Mysql,
    /// Double-quoted identifiers (ANSI_QUOTES / Oracle-compatible tenants);
    /// backslash is an ordinary character inside strings.
    Ansi,
}

impl QuoteMode {
    pub fn identifier_quote(&self) -> u8 {
        match self {
            QuoteMode::Mysql => b'`',
            QuoteMode::Ansi => b'"',
        }
    }

    pub fn double_quote_is_identifier(&self) -> bool {
        matches!(self, QuoteMode::Ansi)
    }

    /// Backslash starts an escape sequence inside string literals.
    pub fn backslash_escapes(&self) -> bool {
        matches!(self, QuoteMode::Mysql)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    pub name_case: NameCase,
    pub quote_mode: QuoteMode,
    pub strict_accuracy: bool,
    pub max_parse_nodes: usize,
    pub max_relations: usize,
    pub default_cluster_version: ClusterVersion,
    pub route_on_partial_parse: bool,
    pub narrow_hash_ranges: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            name_case: NameCase::default(),
            quote_mode: QuoteMode::default(),
            strict_accuracy: false,
            max_parse_nodes: DEFAULT_MAX_PARSE_NODES,
            max_relations: DEFAULT_MAX_RELATIONS,
            default_cluster_version: ClusterVersion::V4,
            route_on_partial_parse: true,
            narrow_hash_ranges: true,
        }
    }
}

impl RouterConfig {
    pub fn builder() -> RouterConfigBuilder {
        RouterConfigBuilder::new()
    }

    /// Checks the limits of a config that did not come through the builder.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_parse_nodes >= MIN_PARSE_NODES,
            "max_parse_nodes {} is below the minimum of {}",
            self.max_parse_nodes,
            MIN_PARSE_NODES
        );
        ensure!(
            (1..=MAX_RELATION_NUM).contains(&self.max_relations),
            "max_relations {} must be within 1..={}",
            self.max_relations,
            MAX_RELATION_NUM
        );
        Ok(())
    }
}

/// Builder for [`RouterConfig`].
///
/// Unset options fall back to the defaults listed in the module docs.
pub struct RouterConfigBuilder {
    name_case: Option<NameCase>,
    quote_mode: Option<QuoteMode>,
    strict_accuracy: Option<bool>,
    max_parse_nodes: Option<usize>,
    max_relations: Option<usize>,
    default_cluster_version: Option<ClusterVersion>,
    route_on_partial_parse: Option<bool>,
    narrow_hash_ranges: Option<bool>,
}

impl Default for RouterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfigBuilder {
    pub fn new() -> Self {
        Self {
            name_case: None,
            quote_mode: None,
            strict_accuracy: None,
            max_parse_nodes: None,
            max_relations: None,
            default_cluster_version: None,
            route_on_partial_parse: None,
            narrow_hash_ranges: None,
        }
    }

    pub fn name_case(mut self, name_case: NameCase) -> Self {
        self.name_case = Some(name_case);
        self
    }

    pub fn quote_mode(mut self, mode: QuoteMode) -> Self {
        self.quote_mode = Some(mode);
        self
    }

    /// Forces the accuracy check for every routed value, regardless of what
    /// the request context asks for.
    pub fn strict_accuracy(mut self, strict: bool) -> Self {
        self.strict_accuracy = Some(strict);
        self
    }

    /// Sets the arena node budget. Exhausting it aborts the parse and the
    /// statement routes as scan-all.
    pub fn max_parse_nodes(mut self, nodes: usize) -> Self {
        self.max_parse_nodes = Some(nodes);
        self
    }

    pub fn max_relations(mut self, relations: usize) -> Self {
        self.max_relations = Some(relations);
        self
    }

    pub fn default_cluster_version(mut self, version: ClusterVersion) -> Self {
        self.default_cluster_version = Some(version);
        self
    }

    /// When disabled, any syntax error in the routed fragment forces scan-all
    /// instead of routing on the relations reduced before it.
    pub fn route_on_partial_parse(mut self, enabled: bool) -> Self {
        self.route_on_partial_parse = Some(enabled);
        self
    }

    pub fn narrow_hash_ranges(mut self, enabled: bool) -> Self {
        self.narrow_hash_ranges = Some(enabled);
        self
    }

    pub fn build(self) -> Result<RouterConfig> {
        let defaults = RouterConfig::default();
        let config = RouterConfig {
            name_case: self.name_case.unwrap_or(defaults.name_case),
            quote_mode: self.quote_mode.unwrap_or(defaults.quote_mode),
            strict_accuracy: self.strict_accuracy.unwrap_or(defaults.strict_accuracy),
            max_parse_nodes: self.max_parse_nodes.unwrap_or(defaults.max_parse_nodes),
            max_relations: self.max_relations.unwrap_or(defaults.max_relations),
            default_cluster_version: self
                .default_cluster_version
                .unwrap_or(defaults.default_cluster_version),
            route_on_partial_parse: self
                .route_on_partial_parse
                .unwrap_or(defaults.route_on_partial_parse),
            narrow_hash_ranges: self.narrow_hash_ranges.unwrap_or(defaults.narrow_hash_ranges),
        };
        config.validate()?;
        Ok(config)
    }
}
