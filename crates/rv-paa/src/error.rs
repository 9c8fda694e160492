use thiserror::Error;

/// Errors raised while decoding or encoding a PAA/PAC texture.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] rv_binio::Error),

    #[error(transparent)]
    Lzss(#[from] rv_lzss::Error),

    #[error(transparent)]
    Lzo(#[from] rv_lzo::Error),

    #[error("unsupported pixel format tag {0:#06x}")]
    UnsupportedFormat(u16),

    #[error("texture dimensions {width}x{height} exceed the configured ceiling of {max}")]
    DimensionTooLarge { width: u32, height: u32, max: u32 },

    #[error("texture dimensions must be non-zero, got {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },

    #[error("texture dimensions must be power-of-two to encode, got {width}x{height}")]
    NotPowerOfTwo { width: u32, height: u32 },

    #[error("unsupported encode format {0:?}")]
    UnsupportedEncodeFormat(crate::Format),

    #[error("encoded mipmap of {0} bytes exceeds the 24-bit data-length field")]
    MipmapTooLarge(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
