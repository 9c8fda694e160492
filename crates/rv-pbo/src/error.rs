use thiserror::Error;

/// PBO-specific error type
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying I/O failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Extension ("Vers") header appeared somewhere other than the first record
    #[error("extension header not in first position")]
    MisplacedExtensionHeader,

    /// An entry's stored payload failed to decompress to its declared size
    #[error("entry {name:?} failed to decompress: {source}")]
    Decompress {
        /// Entry filename
        name: String,
        /// Underlying LZSS failure
        #[source]
        source: rv_lzss::Error,
    },

    /// Requested entry not present in the archive directory
    #[error("entry not found: {0:?}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
