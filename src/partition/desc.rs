//! # Partition Descriptors
//!
//! A [`PartDescKey`] describes one partitioning level of a table: how many
//! partitions it has, which function maps a key value to one of them, and the
//! optional indirection tables left behind by split/merge reorganizations.
//! Descriptors are built once by the schema loader and shared read-only.
//!
//! ## Routing One Value
//!
//! ```text
//! literal ──cast──> CastValue ──hash/abs──> logical index in [0, part_num)
//!                                                │
//!                                   part_ids? ───┴──> physical id
//!                                                │
//!                  (part_space << PART_ID_BITS) | physical id = partition id
//!                                                │
//!                                 tablet_ids? ───┴──> tablet id
//! ```
//!
//! HASH descriptors reduce the integer value itself; KEY descriptors hash the
//! canonical bytes with the generation picked by `select_hash_algorithm`.
//! RANGE and LIST descriptors are not routed here.

use eyre::{bail, ensure, Result};
use serde::Deserialize;
use tracing::warn;

use super::hash::{reduce_hash, select_hash_algorithm};
use crate::config::{MAX_PART_SPACE, MAX_PHYSICAL_PART_ID, PART_ID_BITS};
use crate::error::RouteError;
use crate::route::RouteContext;
use crate::sql::relation::PartLevel;
use crate::types::{Collation, ColumnType, Literal, ValueCaster};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartFuncType {
    Hash,
    HashV2,
    Key,
    KeyV2,
    KeyV3,
    KeyImplicit,
    KeyImplicitV2,
    Range,
    RangeColumns,
    List,
    ListColumns,
}

impl PartFuncType {
    pub fn is_hash(&self) -> bool {
        matches!(self, PartFuncType::Hash | PartFuncType::HashV2)
    }

    pub fn is_key(&self) -> bool {
        matches!(
            self,
            PartFuncType::Key
                | PartFuncType::KeyV2
                | PartFuncType::KeyV3
                | PartFuncType::KeyImplicit
                | PartFuncType::KeyImplicitV2
        )
    }

    pub fn is_range_or_list(&self) -> bool {
        !self.is_hash() && !self.is_key()
    }
}

/// Where one value lands on one partitioning level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartRoute {
    /// `(part_space << PART_ID_BITS) | physical_id`.
    pub partition_id: u64,
    pub physical_id: u64,
    pub logical_index: u64,
    pub tablet_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartDescKey {
    part_num: u64,
    part_space: u64,
    first_part_id: u64,
    level: PartLevel,
    func_type: PartFuncType,
    column_type: ColumnType,
    collation: Collation,
    part_ids: Option<Vec<u64>>,
    tablet_ids: Option<Vec<u64>>,
}

impl PartDescKey {
    pub fn builder(part_num: u64, func_type: PartFuncType, column_type: ColumnType) -> PartDescKeyBuilder {
        PartDescKeyBuilder::new(part_num, func_type, column_type)
    }

    pub fn part_num(&self) -> u64 {
        self.part_num
    }

    pub fn part_space(&self) -> u64 {
        self.part_space
    }

    /// Lowest partition id of the level as recorded by the schema; not used for routing.
    pub fn first_part_id(&self) -> u64 {
        self.first_part_id
    }

    pub fn level(&self) -> PartLevel {
        self.level
    }

    pub fn func_type(&self) -> PartFuncType {
        self.func_type
    }

    pub fn column_type(&self) -> &ColumnType {
        &self.column_type
    }

    pub fn collation(&self) -> Collation {
        self.collation
    }

    pub fn part_ids(&self) -> Option<&[u64]> {
        self.part_ids.as_deref()
    }

    pub fn tablet_ids(&self) -> Option<&[u64]> {
        self.tablet_ids.as_deref()
    }

    /// Routes exactly one literal.
    ///
    /// Cast and accuracy failures come back as `RouteError::Cast` /
    /// `RouteError::Accuracy`; the caller degrades the predicate.
    pub fn route(
        &self,
        values: &[Literal<'_>],
        ctx: &RouteContext<'_>,
        caster: &dyn ValueCaster,
    ) -> Result<PartRoute> {
        let [value] = values else {
            warn!(count = values.len(), "partition route called without exactly one value");
            bail!(RouteError::invalid_argument(format!(
                "expected exactly one value to route, got {}",
                values.len()
            )));
        };

        if self.func_type.is_range_or_list() {
            bail!(RouteError::not_supported(format!(
                "routing {:?} partitioned tables",
                self.func_type
            )));
        }

        let cast = caster.cast(value, &self.column_type, self.collation)?;
        if ctx.need_accurate {
            caster.check_accuracy(value, &self.column_type)?;
        }

        let logical = if self.func_type.is_hash() {
            let Some(magnitude) = cast.integer_magnitude() else {
                bail!(RouteError::Cast {
                    value: value.to_string(),
                    target: self.column_type.to_string(),
                });
            };
            magnitude % self.part_num
        } else {
            let algorithm = select_hash_algorithm(ctx.cluster_version, self.func_type)?;
            reduce_hash(algorithm.hash(&cast.canonical_bytes()), self.part_num)
        };

        self.route_by_logical_index(logical)
    }

    /// Maps an already reduced logical index to its partition and tablet.
    pub fn route_by_logical_index(&self, logical: u64) -> Result<PartRoute> {
        ensure!(
            logical < self.part_num,
            RouteError::invalid_argument(format!(
                "logical partition index {} out of range for {} partitions",
                logical, self.part_num
            ))
        );

        let physical_id = match (&self.part_ids, self.level) {
            (Some(ids), PartLevel::One) => lookup(ids, logical, "partition id")?,
            _ => logical,
        };

        let tablet_id = match &self.tablet_ids {
            Some(ids) => Some(lookup(ids, logical, "tablet id")?),
            None => None,
        };

        Ok(PartRoute {
            partition_id: (self.part_space << PART_ID_BITS) | physical_id,
            physical_id,
            logical_index: logical,
            tablet_id,
        })
    }

    /// Every partition of the level in logical order.
    pub fn all_routes(&self) -> Result<Vec<PartRoute>> {
        (0..self.part_num).map(|idx| self.route_by_logical_index(idx)).collect()
    }
}

fn lookup(ids: &[u64], logical: u64, what: &str) -> Result<u64> {
    match usize::try_from(logical).ok().and_then(|idx| ids.get(idx)) {
        Some(&id) => Ok(id),
        None => bail!(RouteError::unexpected(format!(
            "{} table has no entry for logical index {}",
            what, logical
        ))),
    }
}

/// Global id of a two-level partition: first-level id above the
/// second-level physical id.
pub fn combine_part_ids(first: &PartRoute, second: &PartRoute) -> Result<u64> {
    ensure!(
        first.partition_id <= MAX_PART_SPACE,
        RouteError::unexpected(format!(
            "first-level partition id {} does not leave room for a sub-partition",
            first.partition_id
        ))
    );
    Ok((first.partition_id << PART_ID_BITS) | second.physical_id)
}

pub struct PartDescKeyBuilder {
    part_num: u64,
    func_type: PartFuncType,
    column_type: ColumnType,
    part_space: u64,
    first_part_id: u64,
    level: PartLevel,
    collation: Collation,
    part_ids: Option<Vec<u64>>,
    tablet_ids: Option<Vec<u64>>,
}

impl PartDescKeyBuilder {
    pub fn new(part_num: u64, func_type: PartFuncType, column_type: ColumnType) -> Self {
        Self {
            part_num,
            func_type,
            column_type,
            part_space: 0,
            first_part_id: 0,
            level: PartLevel::One,
            collation: Collation::default(),
            part_ids: None,
            tablet_ids: None,
        }
    }

    pub fn part_space(mut self, space: u64) -> Self {
        self.part_space = space;
        self
    }

    pub fn first_part_id(mut self, id: u64) -> Self {
        self.first_part_id = id;
        self
    }

    pub fn level(mut self, level: PartLevel) -> Self {
        self.level = level;
        self
    }

    pub fn collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    pub fn part_ids(mut self, ids: Vec<u64>) -> Self {
        self.part_ids = Some(ids);
        self
    }

    pub fn tablet_ids(mut self, ids: Vec<u64>) -> Self {
        self.tablet_ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<PartDescKey> {
        ensure!(self.part_num > 0, "part_num must be positive");
        ensure!(
            self.part_num <= MAX_PHYSICAL_PART_ID + 1,
            "part_num {} exceeds the {} partitions a level can address",
            self.part_num,
            MAX_PHYSICAL_PART_ID + 1
        );
        ensure!(
            matches!(self.level, PartLevel::One | PartLevel::Two),
            "descriptor level must be One or Two, got {:?}",
            self.level
        );
        ensure!(
            self.part_space <= MAX_PART_SPACE,
            "part_space {} exceeds {}",
            self.part_space,
            MAX_PART_SPACE
        );
        if let Some(ids) = &self.part_ids {
            ensure!(
                ids.len() as u64 == self.part_num,
                "partition id table has {} entries for {} partitions",
                ids.len(),
                self.part_num
            );
            ensure!(
                ids.iter().all(|&id| id <= MAX_PHYSICAL_PART_ID),
                "partition id table holds an id above {}",
                MAX_PHYSICAL_PART_ID
            );
        }
        if let Some(ids) = &self.tablet_ids {
            ensure!(
                ids.len() as u64 == self.part_num,
                "tablet id table has {} entries for {} partitions",
                ids.len(),
                self.part_num
            );
        }

        Ok(PartDescKey {
            part_num: self.part_num,
            part_space: self.part_space,
            first_part_id: self.first_part_id,
            level: self.level,
            func_type: self.func_type,
            column_type: self.column_type,
            collation: self.collation,
            part_ids: self.part_ids,
            tablet_ids: self.tablet_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::partition::ClusterVersion;
    use crate::types::DefaultCaster;

    fn key_desc(part_num: u64) -> PartDescKey {
        PartDescKey::builder(part_num, PartFuncType::Key, ColumnType::bigint())
            .build()
            .unwrap()
    }

    #[test]
    fn test_route_single_value_murmur() {
        let desc = key_desc(4);
        let ctx = RouteContext::new(ClusterVersion::V4);
        let route = desc.route(&[Literal::Int(1001)], &ctx, &DefaultCaster).unwrap();
        assert_eq!(route.logical_index, 3);
        assert_eq!(route.partition_id, 3);
        assert_eq!(route.tablet_id, None);
    }

    #[test]
    fn test_route_rejects_zero_or_many_values() {
        let desc = key_desc(4);
        let ctx = RouteContext::new(ClusterVersion::V4);
        let err = desc.route(&[], &ctx, &DefaultCaster).unwrap_err();
        assert_eq!(RouteError::kind_of(&err), Some(ErrorKind::InvalidArgument));
        let err = desc
            .route(&[Literal::Int(1), Literal::Int(2)], &ctx, &DefaultCaster)
            .unwrap_err();
        assert_eq!(RouteError::kind_of(&err), Some(ErrorKind::InvalidArgument));
    }

    #[test]
    fn test_range_descriptor_not_supported() {
        let desc = PartDescKey::builder(4, PartFuncType::Range, ColumnType::bigint())
            .build()
            .unwrap();
        let ctx = RouteContext::new(ClusterVersion::V4);
        let err = desc.route(&[Literal::Int(1)], &ctx, &DefaultCaster).unwrap_err();
        assert_eq!(RouteError::kind_of(&err), Some(ErrorKind::NotSupported));
    }

    #[test]
    fn test_hash_function_routes_by_value() {
        let desc = PartDescKey::builder(8, PartFuncType::Hash, ColumnType::bigint())
            .build()
            .unwrap();
        let ctx = RouteContext::new(ClusterVersion::V4);
        let route = desc.route(&[Literal::Int(-13)], &ctx, &DefaultCaster).unwrap();
        assert_eq!(route.logical_index, 5);
        let route = desc.route(&[Literal::Null], &ctx, &DefaultCaster).unwrap();
        assert_eq!(route.logical_index, 0);
    }

    #[test]
    fn test_part_space_and_indirection() {
        let desc = PartDescKey::builder(3, PartFuncType::Hash, ColumnType::bigint())
            .part_space(2)
            .part_ids(vec![10, 11, 15])
            .tablet_ids(vec![200_001, 200_002, 200_003])
            .build()
            .unwrap();
        let route = desc.route_by_logical_index(2).unwrap();
        assert_eq!(route.physical_id, 15);
        assert_eq!(route.partition_id, (2 << PART_ID_BITS) | 15);
        assert_eq!(route.tablet_id, Some(200_003));
    }

    #[test]
    fn test_indirection_ignored_on_second_level() {
        let desc = PartDescKey::builder(2, PartFuncType::Hash, ColumnType::bigint())
            .level(PartLevel::Two)
            .part_ids(vec![7, 9])
            .build()
            .unwrap();
        assert_eq!(desc.route_by_logical_index(1).unwrap().physical_id, 1);
    }

    #[test]
    fn test_logical_index_out_of_range() {
        let desc = key_desc(4);
        let err = desc.route_by_logical_index(4).unwrap_err();
        assert_eq!(RouteError::kind_of(&err), Some(ErrorKind::InvalidArgument));
    }

    #[test]
    fn test_builder_validation() {
        assert!(PartDescKey::builder(0, PartFuncType::Key, ColumnType::bigint())
            .build()
            .is_err());
        assert!(PartDescKey::builder(2, PartFuncType::Key, ColumnType::bigint())
            .part_ids(vec![1])
            .build()
            .is_err());
        assert!(PartDescKey::builder(2, PartFuncType::Key, ColumnType::bigint())
            .part_space(MAX_PART_SPACE + 1)
            .build()
            .is_err());
        assert!(PartDescKey::builder(2, PartFuncType::Key, ColumnType::bigint())
            .level(PartLevel::Both)
            .build()
            .is_err());
    }

    #[test]
    fn test_part_num_capped_at_addressable_ids() {
        let err = PartDescKey::builder(MAX_PHYSICAL_PART_ID + 2, PartFuncType::Key, ColumnType::bigint())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("part_num"));
        assert!(PartDescKey::builder(MAX_PHYSICAL_PART_ID + 1, PartFuncType::Hash, ColumnType::bigint())
            .build()
            .is_ok());
    }

    #[test]
    fn test_accuracy_failure_surfaces_when_requested() {
        let desc = PartDescKey::builder(4, PartFuncType::Key, ColumnType::int())
            .build()
            .unwrap();
        let ctx = RouteContext::new(ClusterVersion::V4).with_need_accurate(true);
        let err = desc
            .route(&[Literal::Int(i64::MAX)], &ctx, &DefaultCaster)
            .unwrap_err();
        assert_eq!(RouteError::kind_of(&err), Some(ErrorKind::Accuracy));
    }

    #[test]
    fn test_combine_part_ids() {
        let first = PartRoute {
            partition_id: 3,
            physical_id: 3,
            logical_index: 3,
            tablet_id: None,
        };
        let second = PartRoute {
            partition_id: 1,
            physical_id: 1,
            logical_index: 1,
            tablet_id: Some(9),
        };
        assert_eq!(combine_part_ids(&first, &second).unwrap(), (3 << PART_ID_BITS) | 1);
    }
}
