/// Pixel format discriminator, dispatched from the leading two-byte type
/// tag (or its absence, for the legacy palette-indexed variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Dxt1,
    Dxt2,
    Dxt3,
    Dxt4,
    Dxt5,
    Argb4444,
    Argb1555,
    Ai88,
    Argb8888,
    /// Legacy OFP palette-indexed texture: no type tag, one byte per pixel
    /// indexing a BGR palette.
    Indexed,
}

impl Format {
    #[must_use]
    pub fn from_tag(tag: u16) -> Option<Self> {
        Some(match tag {
            0xFF01 => Self::Dxt1,
            0xFF02 => Self::Dxt2,
            0xFF03 => Self::Dxt3,
            0xFF04 => Self::Dxt4,
            0xFF05 => Self::Dxt5,
            0x4444 => Self::Argb4444,
            0x1555 => Self::Argb1555,
            0x8080 => Self::Ai88,
            0x8888 => Self::Argb8888,
            _ => return None,
        })
    }

    #[must_use]
    pub fn tag(self) -> Option<u16> {
        Some(match self {
            Self::Dxt1 => 0xFF01,
            Self::Dxt2 => 0xFF02,
            Self::Dxt3 => 0xFF03,
            Self::Dxt4 => 0xFF04,
            Self::Dxt5 => 0xFF05,
            Self::Argb4444 => 0x4444,
            Self::Argb1555 => 0x1555,
            Self::Ai88 => 0x8080,
            Self::Argb8888 => 0x8888,
            Self::Indexed => return None,
        })
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Dxt1 => "DXT1",
            Self::Dxt2 => "DXT2",
            Self::Dxt3 => "DXT3",
            Self::Dxt4 => "DXT4",
            Self::Dxt5 => "DXT5",
            Self::Argb4444 => "ARGB4444",
            Self::Argb1555 => "ARGB1555",
            Self::Ai88 => "AI88",
            Self::Argb8888 => "ARGB8888",
            Self::Indexed => "INDEX",
        }
    }

    #[must_use]
    pub fn is_dxt(self) -> bool {
        matches!(self, Self::Dxt1 | Self::Dxt2 | Self::Dxt3 | Self::Dxt4 | Self::Dxt5)
    }

    /// Expected uncompressed mipmap payload size for `width x height`.
    #[must_use]
    pub fn expected_pixel_size(self, width: u32, height: u32) -> usize {
        let bw = (width as usize / 4).max(1);
        let bh = (height as usize / 4).max(1);
        match self {
            Self::Dxt1 => bw * bh * 8,
            Self::Dxt2 | Self::Dxt3 | Self::Dxt4 | Self::Dxt5 => bw * bh * 16,
            Self::Argb4444 | Self::Argb1555 | Self::Ai88 => width as usize * height as usize * 2,
            Self::Argb8888 => width as usize * height as usize * 4,
            Self::Indexed => width as usize * height as usize,
        }
    }
}

/// Discovered format name and dimensions, without the decoded pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaaHeader {
    pub format: Format,
    pub width: u32,
    pub height: u32,
}

/// A decoded texture: top-to-bottom, row-major RGBA, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub format: Format,
    pub pixels: Vec<u8>,
}

impl Texture {
    /// # Panics
    /// In debug builds, if `pixels.len() != 4 * width * height`.
    #[must_use]
    pub fn new(width: u32, height: u32, format: Format, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), 4 * width as usize * height as usize);
        Self { width, height, format, pixels }
    }

    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> [u8; 4] {
        let off = (y as usize * self.width as usize + x as usize) * 4;
        [self.pixels[off], self.pixels[off + 1], self.pixels[off + 2], self.pixels[off + 3]]
    }

    pub fn set(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let off = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[off..off + 4].copy_from_slice(&rgba);
    }
}
