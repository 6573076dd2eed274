//! Record pointer into the segment log.

use serde::{Deserialize, Serialize};

/// Where one record lives: which segment file, at which byte offset, and how
/// many bytes the record spans on disk.
///
/// `len` counts both length-prefixed fields of the record (URL field plus
/// payload field, prefixes included). Startup replay advances its cursor by
/// `len`; point reads ignore it and re-derive field boundaries from the
/// on-disk prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Id of the segment file holding the record.
    pub segment: u64,
    /// Byte offset of the record's first length prefix within the segment.
    pub offset: u64,
    /// Total on-disk byte length of the record.
    pub len: u64,
}

impl Location {
    /// Build a location from its parts.
    #[must_use]
    pub const fn new(segment: u64, offset: u64, len: u64) -> Self {
        Self {
            segment,
            offset,
            len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_flat_json() {
        let loc = Location::new(3, 128, 76);
        let json = serde_json::to_string(&loc).expect("location serializes");
        assert_eq!(json, r#"{"segment":3,"offset":128,"len":76}"#);

        let back: Location = serde_json::from_str(&json).expect("location deserializes");
        assert_eq!(back, loc);
    }
}
