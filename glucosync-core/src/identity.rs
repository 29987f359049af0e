//! Identifier backfill
//!
//! NFC and Bluetooth reads report the device UID and patch info
//! inconsistently. The history call needs both, so identifiers seen on a
//! complete snapshot are cached and later promoted into snapshots that
//! arrive without them.
//!
//! ```text
//!                 snapshot has uid + patch info
//!   ┌──────────────────────────────────────────────► SnapshotProvided (cache updated)
//!   │
//!   │             snapshot has no uid, cache filled
//! snapshot ─────────────────────────────────────────► CachedOnly (both from cache)
//!   │
//!   │             snapshot uid == cached uid, no patch info
//!   ├──────────────────────────────────────────────► Reconciled (patch info from cache)
//!   │
//!   └── anything else ─────────────────────────────► NoIdentifiers (history call skipped)
//! ```
//!
//! Backfill only flows from the cache into the snapshot. A snapshot whose
//! UID disagrees with the cache is never completed from it.

use serde::{Deserialize, Serialize};

use crate::snapshot::SensorSnapshot;

/// Identifiers required by the history call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorIdentifiers {
    /// Device UID
    pub uid: Vec<u8>,
    /// Patch / model info
    pub patch_info: Vec<u8>,
}

/// How the identifiers for a cycle were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentifierResolution {
    /// Neither the snapshot nor the cache could supply both identifiers
    NoIdentifiers,
    /// Snapshot reported nothing; both identifiers came from the cache
    CachedOnly,
    /// Snapshot reported both identifiers itself
    SnapshotProvided,
    /// Snapshot reported a UID matching the cache; patch info came from the cache
    Reconciled,
}

impl IdentifierResolution {
    /// History call can be issued
    pub const fn is_resolved(&self) -> bool {
        !matches!(self, IdentifierResolution::NoIdentifiers)
    }
}

/// Process-wide cache of the last complete identifier pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierCache {
    cached: Option<SensorIdentifiers>,
}

impl IdentifierCache {
    /// Cache pre-seeded with persisted identifiers
    pub fn with_identifiers(identifiers: SensorIdentifiers) -> Self {
        Self { cached: Some(identifiers) }
    }

    /// Currently cached identifiers
    pub fn cached(&self) -> Option<&SensorIdentifiers> {
        self.cached.as_ref()
    }

    /// Resolve the identifiers for `snapshot`, backfilling it from the cache
    ///
    /// A snapshot with both identifiers populated replaces the cache.
    pub fn resolve(&mut self, snapshot: &mut SensorSnapshot) -> IdentifierResolution {
        let has_uid = !snapshot.device_uid.is_empty();
        let has_patch = !snapshot.patch_info.is_empty();

        if has_uid && has_patch {
            self.cached = Some(SensorIdentifiers {
                uid: snapshot.device_uid.clone(),
                patch_info: snapshot.patch_info.clone(),
            });
            return IdentifierResolution::SnapshotProvided;
        }

        let Some(cached) = &self.cached else {
            return IdentifierResolution::NoIdentifiers;
        };

        if !has_uid {
            snapshot.device_uid = cached.uid.clone();
            snapshot.patch_info = cached.patch_info.clone();
            IdentifierResolution::CachedOnly
        } else if snapshot.device_uid == cached.uid {
            snapshot.patch_info = cached.patch_info.clone();
            IdentifierResolution::Reconciled
        } else {
            IdentifierResolution::NoIdentifiers
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const UID: [u8; 8] = [0xe0, 0x07, 0xa0, 0x00, 0x00, 0x12, 0x34, 0x56];
    const PATCH: [u8; 6] = [0x9d, 0x08, 0x30, 0x01, 0x76, 0x25];

    fn snapshot(uid: &[u8], patch: &[u8]) -> SensorSnapshot {
        SensorSnapshot {
            raw_memory: vec![0; 344],
            device_uid: uid.to_vec(),
            patch_info: patch.to_vec(),
            age_minutes: 1000,
            last_reading_time: Utc::now(),
        }
    }

    #[test]
    fn complete_snapshot_fills_cache() {
        let mut cache = IdentifierCache::default();
        let mut snap = snapshot(&UID, &PATCH);
        assert_eq!(cache.resolve(&mut snap), IdentifierResolution::SnapshotProvided);
        assert_eq!(cache.cached().unwrap().uid, UID.to_vec());
    }

    #[test]
    fn empty_snapshot_without_cache_is_unresolved() {
        let mut cache = IdentifierCache::default();
        let mut snap = snapshot(&[], &[]);
        assert_eq!(cache.resolve(&mut snap), IdentifierResolution::NoIdentifiers);
        assert!(snap.device_uid.is_empty());
        assert!(cache.cached().is_none());
    }

    #[test]
    fn empty_snapshot_takes_cached_pair() {
        let mut cache = IdentifierCache::default();
        cache.resolve(&mut snapshot(&UID, &PATCH));

        let mut snap = snapshot(&[], &[]);
        assert_eq!(cache.resolve(&mut snap), IdentifierResolution::CachedOnly);
        assert_eq!(snap.device_uid, UID.to_vec());
        assert_eq!(snap.patch_info, PATCH.to_vec());
    }

    #[test]
    fn matching_uid_gets_cached_patch_info() {
        let mut cache = IdentifierCache::with_identifiers(SensorIdentifiers {
            uid: UID.to_vec(),
            patch_info: PATCH.to_vec(),
        });
        let mut snap = snapshot(&UID, &[]);
        assert_eq!(cache.resolve(&mut snap), IdentifierResolution::Reconciled);
        assert_eq!(snap.patch_info, PATCH.to_vec());
    }

    #[test]
    fn disagreeing_uid_is_not_backfilled() {
        let mut cache = IdentifierCache::with_identifiers(SensorIdentifiers {
            uid: UID.to_vec(),
            patch_info: PATCH.to_vec(),
        });
        let other = [1u8; 8];
        let mut snap = snapshot(&other, &[]);
        assert_eq!(cache.resolve(&mut snap), IdentifierResolution::NoIdentifiers);
        assert!(snap.patch_info.is_empty());
        // The cache keeps the previous sensor's identifiers
        assert_eq!(cache.cached().unwrap().uid, UID.to_vec());
    }

    #[test]
    fn patch_info_without_uid_and_no_cache_is_unresolved() {
        let mut cache = IdentifierCache::default();
        let mut snap = snapshot(&[], &PATCH);
        assert_eq!(cache.resolve(&mut snap), IdentifierResolution::NoIdentifiers);
        assert!(!IdentifierResolution::NoIdentifiers.is_resolved());
    }
}
