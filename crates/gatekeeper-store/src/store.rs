//! The store facade: URL-keyed writes, index lookups, and record reads.

use std::fs;

use gatekeeper_error::Result;
use gatekeeper_types::{Location, StoreConfig, normalize_url};
use parking_lot::RwLock;

use crate::recovery;
use crate::segment::SegmentStore;
use crate::trie::PrefixIndex;

/// URL-keyed content store over a directory of append-only segments.
///
/// Every method takes `&self` and is safe to call from many threads:
/// lookups share a read lock on the index, writes serialize on the active
/// segment and take the index lock only for the tree mutation, and reads of
/// flushed records touch no shared state at all.
#[derive(Debug)]
pub struct Gatekeeper {
    index: RwLock<PrefixIndex>,
    segments: SegmentStore,
}

impl Gatekeeper {
    /// Open the store under `config.dir`, creating the directory if needed.
    ///
    /// Replays every segment to rebuild the index and deletes segments with
    /// no live records before serving anything. Replay failures (corrupt
    /// records, foreign file names, undeletable dead segments) abort the
    /// open; the store never serves from a partially rebuilt index.
    pub fn open(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.dir)?;
        let recovered = recovery::recover(&config.dir)?;
        Ok(Self {
            index: RwLock::new(recovered.index),
            segments: SegmentStore::new(&config, recovered.next_id),
        })
    }

    /// Persist `payload` under `url` and return where it landed.
    ///
    /// The record on disk carries the raw URL; the index is keyed by its
    /// normalized form. Overwriting a key leaves the superseded record as
    /// dead space that the next restart's replay reclaims.
    pub fn write(&self, url: &str, payload: &[u8]) -> Result<Location> {
        let key = normalize_url(url)?;
        let location = self.segments.append(url.as_bytes(), payload)?;
        self.index.write().insert(key.as_bytes(), location);
        Ok(location)
    }

    /// Resolve `url` to the location of its latest record, if any.
    /// Pure index lookup; never touches disk.
    pub fn find(&self, url: &str) -> Result<Option<Location>> {
        let key = normalize_url(url)?;
        Ok(self.index.read().lookup(key.as_bytes()))
    }

    /// Fetch the payload of the record at `location`, as previously returned
    /// by [`write`](Self::write) or [`find`](Self::find).
    pub fn read(&self, location: &Location) -> Result<Vec<u8>> {
        self.segments.read_at(location)
    }

    /// Flush and release the active segment. Already-written records stay
    /// readable; a later write opens a fresh segment id.
    pub fn close(&self) -> Result<()> {
        self.segments.close()
    }

    /// Number of distinct keys currently resolvable.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.index.read().len()
    }

    /// Number of nodes in the prefix index; a gauge for its memory weight.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.index.read().node_count()
    }
}
