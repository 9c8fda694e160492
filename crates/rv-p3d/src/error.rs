use thiserror::Error;

/// Errors raised while reading a P3D model file.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] rv_binio::Error),

    #[error("lzss error: {0}")]
    Lzss(#[from] rv_lzss::Error),

    #[error("lzo error: {0}")]
    Lzo(#[from] rv_lzo::Error),

    #[error("not a P3D file (signature {0:02x?})")]
    NotAP3dFile([u8; 4]),

    #[error("odol: invalid lod count {0}")]
    InvalidLodCount(i64),

    #[error("odol28: unknown AnimType {anim_type} at anim class {index}")]
    UnknownAnimType { anim_type: u32, index: usize },

    #[error("mlod: expected P3DM or SP3X signature, got {0:02x?}")]
    BadMlodSignature([u8; 4]),

    #[error("mlod: face {face} has invalid vertex count {count}")]
    InvalidFaceVertexCount { face: usize, count: i32 },

    #[error("mlod: expected TAGG signature, got {0:02x?}")]
    BadTaggSignature([u8; 4]),
}

pub type Result<T> = std::result::Result<T, Error>;
