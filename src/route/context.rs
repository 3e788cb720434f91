//! Per-request routing inputs supplied by the session layer.

use crate::config::RouterConfig;
use crate::partition::ClusterVersion;
use crate::types::Literal;

#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'p> {
    pub cluster_version: ClusterVersion,
    /// Reject values that coercion would clamp or truncate.
    pub need_accurate: bool,
    /// Values bound to `?` / `:n` placeholders, in parameter order.
    pub params: &'p [Literal<'p>],
    /// Session database, used when the statement does not qualify the table.
    pub default_database: Option<&'p str>,
}

impl<'p> RouteContext<'p> {
    pub fn new(cluster_version: ClusterVersion) -> Self {
        Self {
            cluster_version,
            need_accurate: false,
            params: &[],
            default_database: None,
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(config.default_cluster_version).with_need_accurate(config.strict_accuracy)
    }

    pub fn with_need_accurate(mut self, need_accurate: bool) -> Self {
        self.need_accurate = need_accurate;
        self
    }

    pub fn with_params(mut self, params: &'p [Literal<'p>]) -> Self {
        self.params = params;
        self
    }

    pub fn with_default_database(mut self, database: &'p str) -> Self {
        self.default_database = Some(database);
        self
    }

    pub fn param(&self, index: usize) -> Option<&Literal<'p>> {
        self.params.get(index)
    }
}
