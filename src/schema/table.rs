//! # Table Routing Metadata
//!
//! Everything the router needs to know about one sharded table: its
//! partition-key columns, one or two partitioning levels, and the map from
//! partition id to the physical shard that serves it.
//!
//! ## Partition Keys
//!
//! Keys are listed in declaration order. Each key names the levels it takes
//! part in; its position among the keys of the same level is derived here so
//! callers never have to keep the two in sync.
//!
//! | Key     | Level | first_position | second_position |
//! |---------|-------|----------------|-----------------|
//! | tenant  | One   | 0              | -               |
//! | id      | Both  | 1              | 0               |
//! | region  | Two   | -              | 1               |
//!
//! ## Example
//!
//! ```rust,ignore
//! let meta = TableRouteMeta::builder("shop", "orders", first_level)
//!     .part_key("id", 0, PartLevel::One)
//!     .shard(0, ShardLocation::new("shop_00", "orders_0"))
//!     .shard(1, ShardLocation::new("shop_01", "orders_1"))
//!     .build()?;
//! ```

use std::fmt;

use eyre::{bail, ensure, Result};
use hashbrown::HashMap;
use serde::Deserialize;

use crate::error::RouteError;
use crate::partition::PartDescKey;
use crate::sql::relation::PartLevel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionKeyColumn {
    pub name: String,
    /// Ordinal of the column in the table definition.
    pub schema_index: usize,
    pub level: PartLevel,
    pub first_position: Option<usize>,
    pub second_position: Option<usize>,
}

/// Physical database and table backing one or more partitions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub struct ShardLocation {
    pub database: String,
    pub table: String,
}

impl ShardLocation {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for ShardLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

#[derive(Debug)]
pub struct TableRouteMeta {
    schema_name: String,
    table_name: String,
    part_keys: Vec<PartitionKeyColumn>,
    first: PartDescKey,
    sub: Option<PartDescKey>,
    rowid_partitioned: bool,
    shards: HashMap<u64, ShardLocation>,
}

impl TableRouteMeta {
    pub fn builder(
        schema_name: impl Into<String>,
        table_name: impl Into<String>,
        first: PartDescKey,
    ) -> TableRouteMetaBuilder {
        TableRouteMetaBuilder::new(schema_name.into(), table_name.into(), first)
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn part_keys(&self) -> &[PartitionKeyColumn] {
        &self.part_keys
    }

    pub fn first_level(&self) -> &PartDescKey {
        &self.first
    }

    pub fn sub_level(&self) -> Option<&PartDescKey> {
        self.sub.as_ref()
    }

    pub fn is_rowid_partitioned(&self) -> bool {
        self.rowid_partitioned
    }

    /// Keys taking part in the first (`first == true`) or second level.
    pub fn keys_at_level(&self, first: bool) -> impl Iterator<Item = (usize, &PartitionKeyColumn)> {
        self.part_keys.iter().enumerate().filter(move |(_, key)| {
            if first {
                key.level.covers_first()
            } else {
                key.level.covers_second()
            }
        })
    }

    pub fn shard_for(&self, partition_id: u64) -> Result<&ShardLocation> {
        match self.shards.get(&partition_id) {
            Some(location) => Ok(location),
            None => bail!(RouteError::ShardNotFound { partition_id }),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard map entries ordered by partition id.
    pub fn shards(&self) -> impl Iterator<Item = (u64, &ShardLocation)> {
        let mut entries: Vec<(u64, &ShardLocation)> =
            self.shards.iter().map(|(&id, location)| (id, location)).collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        entries.into_iter()
    }
}

pub struct TableRouteMetaBuilder {
    schema_name: String,
    table_name: String,
    first: PartDescKey,
    sub: Option<PartDescKey>,
    keys: Vec<(String, usize, PartLevel)>,
    rowid_partitioned: bool,
    shards: HashMap<u64, ShardLocation>,
}

impl TableRouteMetaBuilder {
    fn new(schema_name: String, table_name: String, first: PartDescKey) -> Self {
        Self {
            schema_name,
            table_name,
            first,
            sub: None,
            keys: Vec::new(),
            rowid_partitioned: false,
            shards: HashMap::new(),
        }
    }

    pub fn part_key(mut self, name: impl Into<String>, schema_index: usize, level: PartLevel) -> Self {
        self.keys.push((name.into(), schema_index, level));
        self
    }

    pub fn sub_partition(mut self, sub: PartDescKey) -> Self {
        self.sub = Some(sub);
        self
    }

    pub fn rowid_partitioned(mut self, enabled: bool) -> Self {
        self.rowid_partitioned = enabled;
        self
    }

    pub fn shard(mut self, partition_id: u64, location: ShardLocation) -> Self {
        self.shards.insert(partition_id, location);
        self
    }

    pub fn shards(mut self, shards: impl IntoIterator<Item = (u64, ShardLocation)>) -> Self {
        self.shards.extend(shards);
        self
    }

    pub fn build(self) -> Result<TableRouteMeta> {
        ensure!(!self.schema_name.is_empty(), "schema name must not be empty");
        ensure!(!self.table_name.is_empty(), "table name must not be empty");
        ensure!(
            self.first.level() == PartLevel::One,
            "first-level descriptor of {}.{} is declared at {:?}",
            self.schema_name,
            self.table_name,
            self.first.level()
        );
        if let Some(sub) = &self.sub {
            ensure!(
                sub.level() == PartLevel::Two,
                "sub-partition descriptor of {}.{} is declared at {:?}",
                self.schema_name,
                self.table_name,
                sub.level()
            );
        }
        ensure!(
            !self.shards.is_empty(),
            "{}.{} has no shards",
            self.schema_name,
            self.table_name
        );

        let mut part_keys = Vec::with_capacity(self.keys.len());
        let (mut first_count, mut second_count) = (0usize, 0usize);
        for (name, schema_index, level) in self.keys {
            ensure!(
                level.is_partitioned(),
                "partition key '{}' has no partition level",
                name
            );
            ensure!(
                !part_keys
                    .iter()
                    .any(|key: &PartitionKeyColumn| key.name.eq_ignore_ascii_case(&name)),
                "partition key '{}' declared twice",
                name
            );
            let first_position = level.covers_first().then(|| {
                first_count += 1;
                first_count - 1
            });
            let second_position = level.covers_second().then(|| {
                second_count += 1;
                second_count - 1
            });
            part_keys.push(PartitionKeyColumn {
                name,
                schema_index,
                level,
                first_position,
                second_position,
            });
        }

        ensure!(
            first_count > 0,
            "{}.{} declares no first-level partition key",
            self.schema_name,
            self.table_name
        );
        ensure!(
            (second_count > 0) == self.sub.is_some(),
            "{}.{} second-level keys and sub-partition descriptor disagree",
            self.schema_name,
            self.table_name
        );

        Ok(TableRouteMeta {
            schema_name: self.schema_name,
            table_name: self.table_name,
            part_keys,
            first: self.first,
            sub: self.sub,
            rowid_partitioned: self.rowid_partitioned,
            shards: self.shards,
        })
    }
}
