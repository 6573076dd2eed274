//! Segment file lifecycle: lazy creation, size-triggered rotation, interval
//! flushes, point reads, and directory maintenance.
//!
//! Segments are named by bare decimal id (`0`, `1`, `17`) inside the store
//! directory. A segment is created the moment the first record needs it,
//! fills until it crosses the configured size, and is then flushed and closed
//! for good; ids only ever move forward. Reads open their own short-lived
//! handle against any segment, active or sealed, and take no lock.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use gatekeeper_error::{GatekeeperError, Result};
use gatekeeper_types::{Location, StoreConfig};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::lenval;

/// The segment currently accepting appends.
#[derive(Debug)]
struct ActiveSegment {
    id: u64,
    file: File,
    offset: u64,
    sync_deadline: Instant,
}

/// Append-side state, guarded as one unit so rotation, the append itself,
/// and the offset advance are a single critical section.
#[derive(Debug)]
struct AppendState {
    next_id: u64,
    active: Option<ActiveSegment>,
}

/// Owns the segment files of one store directory.
#[derive(Debug)]
pub struct SegmentStore {
    dir: PathBuf,
    max_segment_size: u64,
    sync_interval: Duration,
    append: Mutex<AppendState>,
}

impl SegmentStore {
    /// Prepare for appends into the configured directory, with fresh segment
    /// ids starting from `next_id`. No file is opened until the first append.
    #[must_use]
    pub fn new(config: &StoreConfig, next_id: u64) -> Self {
        Self {
            dir: config.dir.clone(),
            max_segment_size: config.max_segment_size,
            sync_interval: config.sync_interval,
            append: Mutex::new(AppendState {
                next_id,
                active: None,
            }),
        }
    }

    /// Append one record, the raw `url` field followed by the `payload`
    /// field, and return where it landed.
    ///
    /// The record is assembled in memory and lands in one write, so the file
    /// never holds a half-written field between appends.
    pub fn append(&self, url: &[u8], payload: &[u8]) -> Result<Location> {
        let mut record =
            Vec::with_capacity(url.len() + payload.len() + 2 * lenval::MAX_UVARINT_LEN);
        lenval::write_field(&mut record, url)?;
        lenval::write_field(&mut record, payload)?;

        let mut state = self.append.lock();
        let mut segment = self.take_writable_segment(&mut state)?;

        let offset = segment.offset;
        segment.file.write_all(&record)?;
        segment.offset += record.len() as u64;

        let location = Location::new(segment.id, offset, record.len() as u64);
        trace!(
            segment = location.segment,
            offset = location.offset,
            len = location.len,
            "appended record"
        );
        state.active = Some(segment);
        Ok(location)
    }

    /// Read the payload field of the record at `location`.
    ///
    /// Opens a fresh read-only handle each call; concurrent reads never
    /// contend with each other or with the writer.
    pub fn read_at(&self, location: &Location) -> Result<Vec<u8>> {
        let file = File::open(segment_path(&self.dir, location.segment))?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(location.offset))?;
        lenval::skip_field(&mut reader)?;
        let Some((_, payload)) = lenval::read_field(&mut reader)? else {
            return Err(GatekeeperError::corrupt(format!(
                "segment {}: record at offset {} has no payload field",
                location.segment, location.offset
            )));
        };
        Ok(payload)
    }

    /// Flush and release the active segment, if any. Data already written
    /// stays readable; the next append opens a brand-new segment id.
    pub fn close(&self) -> Result<()> {
        let mut state = self.append.lock();
        if let Some(segment) = state.active.take() {
            segment.file.sync_all()?;
            debug!(segment = segment.id, size = segment.offset, "closed active segment");
        }
        Ok(())
    }

    /// Hand out the segment the next record belongs in, rotating a full one
    /// or flushing a stale one first.
    ///
    /// The segment is moved out of `state` while the caller writes; the
    /// caller puts it back only after a successful append, so a failed write
    /// abandons the handle and the next append starts a clean segment.
    fn take_writable_segment(&self, state: &mut AppendState) -> Result<ActiveSegment> {
        if let Some(mut segment) = state.active.take() {
            if segment.offset < self.max_segment_size {
                if Instant::now() >= segment.sync_deadline {
                    segment.file.sync_all()?;
                    segment.sync_deadline = Instant::now() + self.sync_interval;
                    trace!(segment = segment.id, "flushed active segment");
                }
                return Ok(segment);
            }
            segment.file.sync_all()?;
            debug!(segment = segment.id, size = segment.offset, "rotated full segment");
        }

        let id = state.next_id;
        let path = segment_path(&self.dir, id);
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        state.next_id = id + 1;
        debug!(segment = id, "opened segment for append");
        Ok(ActiveSegment {
            id,
            file,
            offset: 0,
            sync_deadline: Instant::now() + self.sync_interval,
        })
    }
}

/// Path of segment `id` inside `dir`.
#[must_use]
pub fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(id.to_string())
}

/// Enumerate the segment files of `dir` in ascending id order.
///
/// Every entry in a store directory must be named by a decimal segment id;
/// anything else makes the directory unusable and fails the listing.
pub fn list_segments(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let mut segments = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let id = name
            .to_str()
            .and_then(|name| name.parse::<u64>().ok())
            .ok_or_else(|| GatekeeperError::InvalidSegmentName {
                name: name.to_string_lossy().into_owned(),
            })?;
        segments.push((id, entry.path()));
    }
    segments.sort_unstable_by_key(|&(id, _)| id);
    Ok(segments)
}

/// Remove the file of segment `id` from `dir`.
pub fn delete_segment(dir: &Path, id: u64) -> Result<()> {
    fs::remove_file(segment_path(dir, id))?;
    Ok(())
}
