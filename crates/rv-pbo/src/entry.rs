/// One record in a PBO archive's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Original byte sequence, case preserved.
    pub filename: String,
    /// Raw packing discriminator (0 = stored, non-zero = compressed).
    pub packing_method: u32,
    /// Uncompressed size, or 0 for stored entries.
    pub original_size: u32,
    pub reserved: u32,
    pub timestamp: u32,
    /// Size of the entry's payload as stored in the archive.
    pub data_size: u32,
    /// Absolute offset of the entry's payload within the archive stream.
    pub data_offset: u64,
}

impl ArchiveEntry {
    /// Mirrors the original reader's compressed-entry test: a non-zero
    /// packing method alone isn't sufficient, since legacy archives reuse
    /// it inconsistently; the stored size must also disagree with the
    /// declared original size.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.packing_method != 0 && self.original_size > 0 && self.data_size != self.original_size
    }
}
