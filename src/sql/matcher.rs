//! # Partition-Key Matcher
//!
//! Resolves a column reference from the statement to a position in the
//! table's partition-key list.
//!
//! ## Rules
//!
//! Applied in order; the first failing rule means "not a partition key":
//!
//! 1. A database qualifier must equal the table's schema name under the
//!    configured [`NameCase`].
//! 2. A table qualifier must equal the real table name or the statement alias.
//! 3. The column name is compared with ASCII case folding against each key.
//! 4. `ROWID` resolves to the first key when the table is rowid-partitioned.
//!
//! A match marks the key as seen and records the order in which keys were
//! first matched. This state is per statement; the metadata stays shared and
//! read-only.

use smallvec::{smallvec, SmallVec};

use super::relation::PartLevel;
use super::statement::{IdentSite, QualifiedRef};
use crate::config::{NameCase, ROWID_COLUMN_NAME};
use crate::schema::TableRouteMeta;

#[derive(Debug, Clone)]
pub struct PartKeyMatcher<'a> {
    meta: &'a TableRouteMeta,
    alias: Option<&'a str>,
    name_case: NameCase,
    seen: SmallVec<[Option<u32>; 8]>,
    next_ordinal: u32,
}

impl<'a> PartKeyMatcher<'a> {
    pub fn new(meta: &'a TableRouteMeta, alias: Option<&'a str>, name_case: NameCase) -> Self {
        Self {
            meta,
            alias,
            name_case,
            seen: smallvec![None; meta.part_keys().len()],
            next_ordinal: 0,
        }
    }

    pub fn meta(&self) -> &'a TableRouteMeta {
        self.meta
    }

    fn database_matches(&self, database: Option<&str>) -> bool {
        database.map_or(true, |db| self.name_case.eq(db, self.meta.schema_name()))
    }

    fn table_matches(&self, table: Option<&str>) -> bool {
        table.map_or(true, |t| {
            self.name_case.eq(t, self.meta.table_name())
                || self.alias.is_some_and(|alias| self.name_case.eq(t, alias))
        })
    }

    fn key_by_name(&self, column: &str) -> Option<usize> {
        let declared = self
            .meta
            .part_keys()
            .iter()
            .position(|key| key.name.eq_ignore_ascii_case(column));
        declared.or_else(|| {
            (self.meta.is_rowid_partitioned() && column.eq_ignore_ascii_case(ROWID_COLUMN_NAME))
                .then_some(0)
        })
    }

    fn mark(&mut self, key: usize) {
        if let Some(slot) = self.seen.get_mut(key) {
            if slot.is_none() {
                *slot = Some(self.next_ordinal);
                self.next_ordinal += 1;
            }
        }
    }

    pub fn match_column(&mut self, database: Option<&str>, table: Option<&str>, column: &str) -> Option<usize> {
        if !self.database_matches(database) || !self.table_matches(table) {
            return None;
        }
        let key = self.key_by_name(column)?;
        self.mark(key);
        Some(key)
    }

    /// Column named in an INSERT column list or `SET` assignment.
    pub fn match_insert_column(&mut self, column: &str) -> Option<usize> {
        let key = self.key_by_name(column)?;
        self.mark(key);
        Some(key)
    }

    /// Key stored at `schema_index`, for INSERT tuples without a column list.
    pub fn key_at_schema_index(&mut self, schema_index: usize) -> Option<usize> {
        let key = self
            .meta
            .part_keys()
            .iter()
            .position(|key| key.schema_index == schema_index)?;
        self.mark(key);
        Some(key)
    }

    pub fn key_name(&self, key: usize) -> Option<&'a str> {
        self.meta.part_keys().get(key).map(|k| k.name.as_str())
    }

    /// Level and same-level positions of a key.
    pub fn classify(&self, key: usize) -> (PartLevel, Option<usize>, Option<usize>) {
        match self.meta.part_keys().get(key) {
            Some(k) => (k.level, k.first_position, k.second_position),
            None => (PartLevel::Zero, None, None),
        }
    }

    pub fn is_seen(&self, key: usize) -> bool {
        self.seen.get(key).is_some_and(Option::is_some)
    }

    /// Order in which the key was first matched in this statement.
    pub fn ordinal(&self, key: usize) -> Option<u32> {
        self.seen.get(key).copied().flatten()
    }

    pub fn seen_keys(&self) -> SmallVec<[bool; 8]> {
        self.seen.iter().map(Option::is_some).collect()
    }

    /// Rewrite sites of a qualifier that names the routed table.
    ///
    /// An alias is never rewritten; a foreign database disqualifies the
    /// whole reference.
    pub fn qualifier_sites(&self, reference: &QualifiedRef<'_>) -> SmallVec<[IdentSite; 2]> {
        let mut sites = SmallVec::new();
        if let Some(db) = &reference.database {
            if !self.name_case.eq(db.text, self.meta.schema_name()) {
                return sites;
            }
            sites.push(IdentSite::database(db));
        }
        if self.name_case.eq(reference.table.text, self.meta.table_name()) {
            sites.push(IdentSite::table(&reference.table));
        }
        sites
    }
}
