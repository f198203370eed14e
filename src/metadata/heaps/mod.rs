//! # Metadata Heaps
//!
//! The four content-addressed heaps of one generation: #Strings (virtual indices
//! plus suffix folding), #US (eager UTF-16 user strings), #Blob (length-prefixed
//! dedup blobs) and #GUID (flat 16-byte records). [`MetadataHeaps`] bundles them
//! for the pipeline and freezes them together when streams close.

mod blobs;
mod guids;
mod strings;
mod userstrings;

pub use blobs::BlobHeap;
pub use guids::GuidHeap;
pub use strings::{StringHeap, StringIndex, NAME_LENGTH_LIMIT, PATH_LENGTH_LIMIT};
pub use userstrings::UserStringHeap;

/// Rounds a byte size up to the next 4-byte boundary.
#[must_use]
pub fn aligned_size(size: usize) -> usize {
    (size + 3) & !3
}

/// All four heaps of one emission pass.
pub struct MetadataHeaps {
    /// #Strings
    pub strings: StringHeap,
    /// #US
    pub user_strings: UserStringHeap,
    /// #Blob
    pub blobs: BlobHeap,
    /// #GUID
    pub guids: GuidHeap,
}

impl MetadataHeaps {
    /// Creates the empty heap set of a fresh generation.
    #[must_use]
    pub fn new() -> Self {
        MetadataHeaps {
            strings: StringHeap::new(),
            user_strings: UserStringHeap::new(),
            blobs: BlobHeap::new(),
            guids: GuidHeap::new(),
        }
    }

    /// Freezes every heap; part of the streams-close transition.
    pub fn freeze(&mut self) {
        self.strings.freeze();
        self.user_strings.freeze();
        self.blobs.freeze();
        self.guids.freeze();
    }
}

impl Default for MetadataHeaps {
    fn default() -> Self {
        MetadataHeaps::new()
    }
}
