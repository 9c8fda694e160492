use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("LZO input exhausted before the end-of-stream marker")]
    InputOverrun,

    #[error("LZO back-reference points before the start of the output")]
    LookbehindOverrun,

    #[error("LZO decompression produced more bytes than expected")]
    OutputOverrun,

    #[error("LZO stream hit its end-of-stream marker before producing the expected output size")]
    OutputUnderrunAtEos,
}

pub type Result<T> = std::result::Result<T, Error>;
