//! # Partition Hash Functions
//!
//! Two hash generations coexist in a cluster that has been upgraded in place:
//!
//! - **Murmur** (MurmurHash64A, seed 0): every KEY table on a cluster at
//!   version 4 or later, and the newer KEY function flavors on older clusters.
//! - **Legacy**: the original multiplicative byte hash, kept for KEY tables
//!   created before the murmur switch on a pre-4 cluster.
//!
//! Both hash the canonical bytes of the coerced value (see `types::cast`).
//! Changing either function, its seed, or the selection rule silently
//! re-routes existing rows, so the vectors in `tests/hash_compat.rs` are the
//! contract.
//!
//! ## Selection
//!
//! ```text
//! version >= 4.0.0                         -> Murmur
//! version <  4.0.0, KEY_V3 / KEY_IMPLICIT_V2 -> Murmur
//! version <  4.0.0, any other KEY flavor     -> Legacy
//! ```

use std::fmt;
use std::str::FromStr;

use eyre::{bail, ensure, Result, WrapErr};
use serde::Deserialize;

use super::desc::PartFuncType;
use crate::config::MURMUR_CLUSTER_MAJOR;

/// Version of the storage cluster the table metadata was produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct ClusterVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ClusterVersion {
    pub const V3: ClusterVersion = ClusterVersion::new(3, 0, 0);
    pub const V4: ClusterVersion = ClusterVersion::new(MURMUR_CLUSTER_MAJOR, 0, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn is_before_v4(&self) -> bool {
        *self < Self::V4
    }
}

impl fmt::Display for ClusterVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ClusterVersion {
    type Err = eyre::Report;

    /// Accepts `major`, `major.minor` or `major.minor.patch`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = [0u32; 3];
        let mut count = 0;
        for piece in s.trim().split('.') {
            ensure!(count < 3, "cluster version '{}' has more than three components", s);
            parts[count] = piece
                .parse()
                .wrap_err_with(|| format!("invalid cluster version component '{}' in '{}'", piece, s))?;
            count += 1;
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl TryFrom<String> for ClusterVersion {
    type Error = eyre::Report;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Murmur,
    Legacy,
}

impl HashAlgorithm {
    pub fn hash(&self, data: &[u8]) -> u64 {
        match self {
            HashAlgorithm::Murmur => murmurhash64a(data, 0),
            HashAlgorithm::Legacy => legacy_hash(data),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Murmur => "murmur",
            HashAlgorithm::Legacy => "legacy",
        }
    }
}

/// Hash generation for a KEY-partitioned table.
///
/// HASH and range/list function types do not hash and are rejected.
pub fn select_hash_algorithm(version: ClusterVersion, func: PartFuncType) -> Result<HashAlgorithm> {
    if !func.is_key() {
        bail!(crate::error::RouteError::not_supported(format!(
            "hash selection for partition function {:?}",
            func
        )));
    }
    let newer_flavor = matches!(func, PartFuncType::KeyV3 | PartFuncType::KeyImplicitV2);
    if !version.is_before_v4() || newer_flavor {
        Ok(HashAlgorithm::Murmur)
    } else {
        Ok(HashAlgorithm::Legacy)
    }
}

const MURMUR_M: u64 = 0xc6a4_a793_5bd1_e995;
const MURMUR_R: u32 = 47;

/// MurmurHash64A over little-endian 8-byte blocks.
pub fn murmurhash64a(data: &[u8], seed: u64) -> u64 {
    let mut h = seed ^ (data.len() as u64).wrapping_mul(MURMUR_M);

    let mut blocks = data.chunks_exact(8);
    for block in &mut blocks {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(block);
        let mut k = u64::from_le_bytes(buf);
        k = k.wrapping_mul(MURMUR_M);
        k ^= k >> MURMUR_R;
        k = k.wrapping_mul(MURMUR_M);
        h ^= k;
        h = h.wrapping_mul(MURMUR_M);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        for (i, &b) in tail.iter().enumerate() {
            h ^= (b as u64) << (8 * i);
        }
        h = h.wrapping_mul(MURMUR_M);
    }

    h ^= h >> MURMUR_R;
    h = h.wrapping_mul(MURMUR_M);
    h ^= h >> MURMUR_R;
    h
}

/// Pre-murmur byte hash.
pub fn legacy_hash(data: &[u8]) -> u64 {
    let mut nr1: u64 = 1;
    let mut nr2: u64 = 4;
    for &b in data {
        nr1 ^= ((nr1 & 63).wrapping_add(nr2))
            .wrapping_mul(b as u64)
            .wrapping_add(nr1 << 8);
        nr2 = nr2.wrapping_add(3);
    }
    nr1
}

/// Logical partition index of a hash, treating it as signed.
pub fn reduce_hash(hash: u64, part_num: u64) -> u64 {
    (hash as i64).unsigned_abs() % part_num
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmur_empty_input_is_zero() {
        assert_eq!(murmurhash64a(b"", 0), 0);
    }

    #[test]
    fn test_murmur_known_vectors() {
        assert_eq!(murmurhash64a(b"a", 0), 0x0717_17d2_d36b_6b11);
        assert_eq!(murmurhash64a(b"hello", 0), 0x1e68_d17c_457b_f117);
        assert_eq!(murmurhash64a(&1i64.to_le_bytes(), 0), 0x8fbb_8d81_5c9e_092e);
    }

    #[test]
    fn test_legacy_known_vectors() {
        assert_eq!(legacy_hash(b""), 1);
        assert_eq!(legacy_hash(b"a"), 0x2e4);
        assert_eq!(legacy_hash(&0i64.to_le_bytes()), 1);
    }

    #[test]
    fn test_reduce_hash_uses_signed_magnitude() {
        assert_eq!(reduce_hash(u64::MAX, 4), 1);
        assert_eq!(reduce_hash(7, 4), 3);
        assert_eq!(reduce_hash(0x8000_0000_0000_0000, 3), (1u64 << 63) % 3);
    }

    #[test]
    fn test_selection_matrix() {
        let v3 = ClusterVersion::V3;
        let v4 = ClusterVersion::V4;
        assert_eq!(select_hash_algorithm(v3, PartFuncType::Key).unwrap(), HashAlgorithm::Legacy);
        assert_eq!(select_hash_algorithm(v3, PartFuncType::KeyV2).unwrap(), HashAlgorithm::Legacy);
        assert_eq!(select_hash_algorithm(v3, PartFuncType::KeyV3).unwrap(), HashAlgorithm::Murmur);
        assert_eq!(
            select_hash_algorithm(v3, PartFuncType::KeyImplicit).unwrap(),
            HashAlgorithm::Legacy
        );
        assert_eq!(
            select_hash_algorithm(v3, PartFuncType::KeyImplicitV2).unwrap(),
            HashAlgorithm::Murmur
        );
        assert_eq!(select_hash_algorithm(v4, PartFuncType::Key).unwrap(), HashAlgorithm::Murmur);
        assert!(select_hash_algorithm(v4, PartFuncType::Range).is_err());
        assert!(select_hash_algorithm(v4, PartFuncType::Hash).is_err());
    }

    #[test]
    fn test_cluster_version_parse_and_order() {
        let v: ClusterVersion = "3.2.4".parse().unwrap();
        assert_eq!(v, ClusterVersion::new(3, 2, 4));
        assert!(v.is_before_v4());
        assert!(!"4".parse::<ClusterVersion>().unwrap().is_before_v4());
        assert_eq!("4.1".parse::<ClusterVersion>().unwrap().to_string(), "4.1.0");
        assert!("4.x".parse::<ClusterVersion>().is_err());
        assert!("1.2.3.4".parse::<ClusterVersion>().is_err());
    }

    #[test]
    fn test_cluster_version_deserializes_from_string() {
        let v: ClusterVersion = serde_json::from_str("\"3.1.0\"").unwrap();
        assert_eq!(v, ClusterVersion::new(3, 1, 0));
        assert!(serde_json::from_str::<ClusterVersion>("\"abc\"").is_err());
    }
}
