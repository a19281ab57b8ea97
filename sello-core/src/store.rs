//! Fingerprint index storage.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::fingerprint::AudioFingerprint;

/// One indexed occurrence of a hash.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub track_id: String,
    /// Frame offset of the hash's anchor within the indexed track.
    pub track_time_offset: u32,
}

/// Backend-agnostic hash index.
///
/// Implementations map a 32-bit landmark hash to every (track, offset)
/// it was seen at. Shared across threads during batch indexing, hence
/// `&self` methods and the `Send + Sync` bound.
pub trait FingerprintStore: Send + Sync {
    /// Index every hash of a fingerprint.
    fn insert(&self, fingerprint: &AudioFingerprint) -> Result<()>;

    /// All indexed occurrences of `hash`; empty when unseen.
    fn query(&self, hash: u32) -> Result<Vec<MatchCandidate>>;
}

/// Process-local store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryFingerprintStore {
    index: RwLock<HashMap<u32, Vec<MatchCandidate>>>,
}

impl MemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct hashes indexed.
    pub fn len(&self) -> usize {
        self.index.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FingerprintStore for MemoryFingerprintStore {
    fn insert(&self, fingerprint: &AudioFingerprint) -> Result<()> {
        let mut index = self
            .index
            .write()
            .map_err(|_| Error::StoreUnavailable("index lock poisoned".into()))?;
        for h in &fingerprint.hashes {
            index.entry(h.hash).or_default().push(MatchCandidate {
                track_id: fingerprint.track_id.clone(),
                track_time_offset: h.time_offset,
            });
        }
        Ok(())
    }

    fn query(&self, hash: u32) -> Result<Vec<MatchCandidate>> {
        let index = self
            .index
            .read()
            .map_err(|_| Error::StoreUnavailable("index lock poisoned".into()))?;
        Ok(index.get(&hash).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::FingerprintHash;

    fn fp(track_id: &str, hashes: &[(u32, u32)]) -> AudioFingerprint {
        AudioFingerprint {
            track_id: track_id.to_string(),
            hashes: hashes
                .iter()
                .map(|&(hash, time_offset)| FingerprintHash { hash, time_offset })
                .collect(),
            duration_seconds: 1.0,
        }
    }

    #[test]
    fn insert_then_query() {
        let store = MemoryFingerprintStore::new();
        store.insert(&fp("a", &[(100, 0), (200, 5)])).unwrap();
        store.insert(&fp("b", &[(100, 12)])).unwrap();

        let hits = store.query(100).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.contains(&MatchCandidate {
            track_id: "a".into(),
            track_time_offset: 0
        }));
        assert!(hits.contains(&MatchCandidate {
            track_id: "b".into(),
            track_time_offset: 12
        }));
    }

    #[test]
    fn unseen_hash_is_empty_not_error() {
        let store = MemoryFingerprintStore::new();
        assert!(store.query(0xDEAD_BEEF).unwrap().is_empty());
    }

    #[test]
    fn duplicate_hash_within_track_keeps_both_offsets() {
        let store = MemoryFingerprintStore::new();
        store.insert(&fp("a", &[(7, 1), (7, 9)])).unwrap();
        let hits = store.query(7).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn shared_across_threads() {
        use std::sync::Arc;

        let store = Arc::new(MemoryFingerprintStore::new());
        let handles: Vec<_> = (0u32..4)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .insert(&fp(&format!("t{t}"), &[(t, 0)]))
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 4);
    }
}
