//! Log-structured content store for crawled documents.
//!
//! Payloads are appended to integer-named segment files as length-prefixed
//! records and indexed in memory by a prefix tree over normalized URLs.
//! Startup replays every segment to rebuild the index, then deletes the
//! segments whose records were all superseded; that replay is the only
//! compaction the store performs.

pub mod lenval;
pub mod recovery;
pub mod segment;
pub mod store;
pub mod trie;

pub use recovery::{Recovered, recover};
pub use segment::SegmentStore;
pub use store::Gatekeeper;
pub use trie::PrefixIndex;
