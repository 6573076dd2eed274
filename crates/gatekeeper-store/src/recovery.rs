//! Startup replay: rebuild the in-memory index from the segment files and
//! drop segments that no longer hold a single live record.
//!
//! Replay is the only garbage collection the store has. Overwrites during
//! normal operation leave dead records behind; the next restart walks every
//! segment in id order, keeps a live-record count per segment as newer
//! records supersede older ones, and deletes the segments whose count ends
//! at zero. There is no background compaction.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use gatekeeper_error::{GatekeeperError, Result};
use gatekeeper_types::{Location, normalize_url};
use tracing::{debug, info, warn};

use crate::lenval;
use crate::segment;
use crate::trie::PrefixIndex;

/// What a completed replay hands to the store.
#[derive(Debug)]
pub struct Recovered {
    /// Index over every live record on disk.
    pub index: PrefixIndex,
    /// Id the next created segment will take.
    pub next_id: u64,
}

/// Replay every segment under `dir` and garbage-collect the dead ones.
///
/// Runs strictly before the store serves requests, so it takes no locks. Any
/// corruption, foreign file name, or deletion failure aborts the open: the
/// store never starts from a partially rebuilt index.
pub fn recover(dir: &Path) -> Result<Recovered> {
    let segments = segment::list_segments(dir)?;
    let next_id = segments.last().map_or(0, |&(id, _)| id + 1);

    let mut index = PrefixIndex::new();
    let mut live: BTreeMap<u64, u64> = BTreeMap::new();

    for (id, path) in &segments {
        live.insert(*id, 0);
        if let Err(err) = replay_segment(path, *id, &mut index, &mut live) {
            warn!(segment = id, error = %err, "replay aborted");
            return Err(err);
        }
    }

    for (&id, &count) in &live {
        if count == 0 {
            debug!(segment = id, "deleting dead segment");
            segment::delete_segment(dir, id)?;
        }
    }

    info!(
        segments = segments.len(),
        keys = index.len(),
        next_segment = next_id,
        "replay complete"
    );
    Ok(Recovered { index, next_id })
}

/// Scan one segment from front to back, installing each record's key and
/// maintaining the per-segment live counts.
fn replay_segment(
    path: &Path,
    id: u64,
    index: &mut PrefixIndex,
    live: &mut BTreeMap<u64, u64>,
) -> Result<()> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut cursor = 0_u64;

    debug!(segment = id, size = len, "replaying segment");

    while cursor < len {
        let Some((url_len, url)) = lenval::read_field(&mut reader)? else {
            break;
        };
        let url = std::str::from_utf8(&url).map_err(|_| {
            GatekeeperError::corrupt(format!(
                "segment {id}: url at offset {cursor} is not valid utf-8"
            ))
        })?;
        let key = normalize_url(url)?;
        let record_len = url_len + lenval::skip_field(&mut reader)?;

        // A skip seeks blindly, so a payload running past the end of the
        // file only shows up here.
        if cursor + record_len > len {
            return Err(GatekeeperError::corrupt(format!(
                "segment {id}: record at offset {cursor} runs past end of file"
            )));
        }

        if let Some(previous) = index.insert(key.as_bytes(), Location::new(id, cursor, record_len))
        {
            if let Some(count) = live.get_mut(&previous.segment) {
                *count = count.saturating_sub(1);
            }
        }
        *live.entry(id).or_insert(0) += 1;
        cursor += record_len;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use gatekeeper_types::StoreConfig;
    use tempfile::tempdir;

    use super::*;
    use crate::segment::{SegmentStore, segment_path};

    fn key_of(url: &str) -> Vec<u8> {
        normalize_url(url).expect("url should normalize").into_bytes()
    }

    #[test]
    fn empty_directory_recovers_to_a_fresh_store() {
        let dir = tempdir().expect("tempdir should be created");
        let recovered = recover(dir.path()).expect("recovery should succeed");
        assert_eq!(recovered.next_id, 0);
        assert!(recovered.index.is_empty());
    }

    #[test]
    fn replay_rebuilds_the_index() {
        let dir = tempdir().expect("tempdir should be created");
        let store = SegmentStore::new(&StoreConfig::new(dir.path()), 0);
        let one = store.append(b"http://a.example/1", b"one").expect("append should succeed");
        let two = store.append(b"http://b.example/2", b"two").expect("append should succeed");
        store.close().expect("close should succeed");

        let recovered = recover(dir.path()).expect("recovery should succeed");
        assert_eq!(recovered.index.len(), 2);
        assert_eq!(recovered.index.lookup(&key_of("http://a.example/1")), Some(one));
        assert_eq!(recovered.index.lookup(&key_of("http://b.example/2")), Some(two));
        assert_eq!(recovered.next_id, 1);
    }

    #[test]
    fn later_records_supersede_earlier_ones() {
        let dir = tempdir().expect("tempdir should be created");
        let store = SegmentStore::new(&StoreConfig::new(dir.path()), 0);
        store.append(b"http://a.example/", b"old").expect("append should succeed");
        let newest = store.append(b"http://a.example/", b"new").expect("append should succeed");
        store.close().expect("close should succeed");

        let recovered = recover(dir.path()).expect("recovery should succeed");
        assert_eq!(recovered.index.len(), 1);
        assert_eq!(recovered.index.lookup(&key_of("http://a.example/")), Some(newest));
    }

    #[test]
    fn fully_superseded_segment_is_deleted() {
        let dir = tempdir().expect("tempdir should be created");
        let store = SegmentStore::new(&StoreConfig::new(dir.path()), 0);
        store.append(b"http://a.example/", b"old").expect("append should succeed");
        store.close().expect("close should succeed");
        // Segment 1 rewrites the only key segment 0 holds.
        let newest = store.append(b"http://a.example/", b"new").expect("append should succeed");
        store.close().expect("close should succeed");
        assert_eq!(newest.segment, 1);

        let recovered = recover(dir.path()).expect("recovery should succeed");
        assert!(!segment_path(dir.path(), 0).exists());
        assert!(segment_path(dir.path(), 1).exists());
        assert_eq!(recovered.index.lookup(&key_of("http://a.example/")), Some(newest));
        assert_eq!(recovered.next_id, 2);
    }

    #[test]
    fn partially_live_segment_survives() {
        let dir = tempdir().expect("tempdir should be created");
        let store = SegmentStore::new(&StoreConfig::new(dir.path()), 0);
        store.append(b"http://a.example/", b"old").expect("append should succeed");
        let kept = store.append(b"http://b.example/", b"kept").expect("append should succeed");
        store.close().expect("close should succeed");
        store.append(b"http://a.example/", b"new").expect("append should succeed");
        store.close().expect("close should succeed");

        recover(dir.path()).expect("recovery should succeed");
        assert!(segment_path(dir.path(), 0).exists());
        assert_eq!(kept.segment, 0);
    }

    #[test]
    fn empty_segment_file_is_deleted() {
        let dir = tempdir().expect("tempdir should be created");
        fs::write(segment_path(dir.path(), 0), b"").expect("file should be written");

        let recovered = recover(dir.path()).expect("recovery should succeed");
        assert!(!segment_path(dir.path(), 0).exists());
        // The id is still consumed; the next segment does not reuse 0.
        assert_eq!(recovered.next_id, 1);
    }

    #[test]
    fn next_id_skips_gaps_to_max_plus_one() {
        let dir = tempdir().expect("tempdir should be created");
        let store = SegmentStore::new(&StoreConfig::new(dir.path()), 0);
        store.append(b"http://a.example/", b"zero").expect("append should succeed");
        store.close().expect("close should succeed");
        let store = SegmentStore::new(&StoreConfig::new(dir.path()), 7);
        store.append(b"http://b.example/", b"seven").expect("append should succeed");
        store.close().expect("close should succeed");

        let recovered = recover(dir.path()).expect("recovery should succeed");
        assert_eq!(recovered.next_id, 8);
    }

    #[test]
    fn truncated_record_fails_recovery() {
        let dir = tempdir().expect("tempdir should be created");
        let store = SegmentStore::new(&StoreConfig::new(dir.path()), 0);
        store.append(b"http://a.example/", b"a payload worth keeping").expect("append should succeed");
        store.close().expect("close should succeed");

        let path = segment_path(dir.path(), 0);
        let bytes = fs::read(&path).expect("segment should be readable");
        fs::write(&path, &bytes[..bytes.len() - 4]).expect("truncation should succeed");

        let err = recover(dir.path()).expect_err("truncated segment should fail");
        assert!(matches!(err, GatekeeperError::Corrupt(_)));
    }

    #[test]
    fn record_cut_mid_prefix_fails_recovery() {
        let dir = tempdir().expect("tempdir should be created");
        // One good record followed by a dangling continuation byte.
        let mut bytes = Vec::new();
        lenval::write_field(&mut bytes, b"http://a.example/").expect("write should succeed");
        lenval::write_field(&mut bytes, b"payload").expect("write should succeed");
        bytes.push(0x80);
        fs::write(segment_path(dir.path(), 0), &bytes).expect("file should be written");

        let err = recover(dir.path()).expect_err("dangling prefix should fail");
        assert!(matches!(err, GatekeeperError::Corrupt(_)));
    }

    #[test]
    fn non_utf8_url_fails_recovery() {
        let dir = tempdir().expect("tempdir should be created");
        let mut bytes = Vec::new();
        lenval::write_field(&mut bytes, &[0xff, 0xfe, 0xfd]).expect("write should succeed");
        lenval::write_field(&mut bytes, b"payload").expect("write should succeed");
        fs::write(segment_path(dir.path(), 0), &bytes).expect("file should be written");

        let err = recover(dir.path()).expect_err("binary url should fail");
        assert!(matches!(err, GatekeeperError::Corrupt(_)));
    }

    #[test]
    fn unparseable_stored_url_fails_recovery() {
        let dir = tempdir().expect("tempdir should be created");
        let mut bytes = Vec::new();
        lenval::write_field(&mut bytes, b"::not a url::").expect("write should succeed");
        lenval::write_field(&mut bytes, b"payload").expect("write should succeed");
        fs::write(segment_path(dir.path(), 0), &bytes).expect("file should be written");

        let err = recover(dir.path()).expect_err("unparseable url should fail");
        assert!(matches!(err, GatekeeperError::MalformedUrl { .. }));
    }

    #[test]
    fn foreign_file_fails_recovery() {
        let dir = tempdir().expect("tempdir should be created");
        fs::write(dir.path().join("segment.bak"), b"").expect("file should be written");
        let err = recover(dir.path()).expect_err("foreign name should fail");
        assert!(matches!(err, GatekeeperError::InvalidSegmentName { .. }));
    }
}
