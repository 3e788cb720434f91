//! # Route Catalog
//!
//! Registry of [`TableRouteMeta`] keyed by `(schema, table)`. The external
//! schema layer installs and evicts entries; request threads only read.
//!
//! Entries are handed out as `Arc`, so a reload that replaces a table's
//! metadata never invalidates a request that already resolved the old one.
//! The lock is held only for the map operation itself.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::table::TableRouteMeta;
use crate::config::NameCase;

#[derive(Debug)]
pub struct RouteCatalog {
    tables: RwLock<HashMap<(String, String), Arc<TableRouteMeta>>>,
    name_case: NameCase,
}

impl RouteCatalog {
    pub fn new(name_case: NameCase) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            name_case,
        }
    }

    pub fn name_case(&self) -> NameCase {
        self.name_case
    }

    fn key(&self, schema: &str, table: &str) -> (String, String) {
        (self.name_case.fold(schema), self.name_case.fold(table))
    }

    /// Installs or replaces the metadata of one table, returning the previous entry.
    pub fn install(&self, meta: TableRouteMeta) -> Option<Arc<TableRouteMeta>> {
        let key = self.key(meta.schema_name(), meta.table_name());
        debug!(
            schema = meta.schema_name(),
            table = meta.table_name(),
            shards = meta.shard_count(),
            "installing table route metadata"
        );
        self.tables.write().insert(key, Arc::new(meta))
    }

    pub fn get(&self, schema: &str, table: &str) -> Option<Arc<TableRouteMeta>> {
        self.tables.read().get(&self.key(schema, table)).cloned()
    }

    pub fn evict(&self, schema: &str, table: &str) -> Option<Arc<TableRouteMeta>> {
        let removed = self.tables.write().remove(&self.key(schema, table));
        if removed.is_some() {
            debug!(schema, table, "evicted table route metadata");
        }
        removed
    }

    /// Swaps the whole catalog in one step.
    pub fn replace_all(&self, metas: impl IntoIterator<Item = TableRouteMeta>) {
        let fresh: HashMap<_, _> = metas
            .into_iter()
            .map(|meta| (self.key(meta.schema_name(), meta.table_name()), Arc::new(meta)))
            .collect();
        debug!(tables = fresh.len(), "replacing route catalog");
        *self.tables.write() = fresh;
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}

impl Default for RouteCatalog {
    fn default() -> Self {
        Self::new(NameCase::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{PartDescKey, PartFuncType};
    use crate::schema::ShardLocation;
    use crate::sql::relation::PartLevel;
    use crate::types::ColumnType;

    fn meta(schema: &str, table: &str, part_num: u64) -> TableRouteMeta {
        let first = PartDescKey::builder(part_num, PartFuncType::Key, ColumnType::bigint())
            .build()
            .unwrap();
        TableRouteMeta::builder(schema, table, first)
            .part_key("id", 0, PartLevel::One)
            .shard(0, ShardLocation::new(schema, table))
            .build()
            .unwrap()
    }

    #[test]
    fn test_install_get_evict() {
        let catalog = RouteCatalog::default();
        assert!(catalog.is_empty());
        assert!(catalog.install(meta("Shop", "Orders", 4)).is_none());
        assert!(catalog.get("shop", "orders").is_some());
        assert_eq!(catalog.len(), 1);
        assert!(catalog.evict("SHOP", "ORDERS").is_some());
        assert!(catalog.get("shop", "orders").is_none());
    }

    #[test]
    fn test_case_sensitive_catalog() {
        let catalog = RouteCatalog::new(NameCase::Sensitive);
        catalog.install(meta("Shop", "Orders", 4));
        assert!(catalog.get("shop", "orders").is_none());
        assert!(catalog.get("Shop", "Orders").is_some());
    }

    #[test]
    fn test_reload_keeps_old_arc_alive() {
        let catalog = RouteCatalog::default();
        catalog.install(meta("db", "t", 4));
        let held = catalog.get("db", "t").unwrap();
        let previous = catalog.install(meta("db", "t", 8)).unwrap();
        assert!(Arc::ptr_eq(&held, &previous));
        assert_eq!(held.first_level().part_num(), 4);
        assert_eq!(catalog.get("db", "t").unwrap().first_level().part_num(), 8);
    }

    #[test]
    fn test_replace_all() {
        let catalog = RouteCatalog::default();
        catalog.install(meta("db", "old", 4));
        catalog.replace_all([meta("db", "a", 2), meta("db", "b", 2)]);
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("db", "old").is_none());
    }
}
