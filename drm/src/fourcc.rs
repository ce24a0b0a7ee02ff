//! Pixel formats and format modifiers
//!
//! Four-character codes identify the byte layout of a framebuffer, 64-bit
//! modifiers describe vendor tiling or compression applied on top of it.
//! [`FormatInfo`] carries the per-format metadata the validator needs
//! (plane count, bytes per block, chroma subsampling) and
//! [`FormatInfoProvider`] is the seam through which the device resolves a
//! code to its metadata.

use core::fmt;

/// Maximum number of planes per framebuffer
pub const MAX_PLANES: usize = 4;

/// Build a fourcc code from its four characters.
pub const fn fourcc_code(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

// ---------------------------------------------------------------------------
// Format codes
// ---------------------------------------------------------------------------

/// 8-bit color index
pub const DRM_FORMAT_C8: u32 = fourcc_code(b'C', b'8', b' ', b' ');
/// 16-bit RGB 5:6:5
pub const DRM_FORMAT_RGB565: u32 = fourcc_code(b'R', b'G', b'1', b'6');
/// 16-bit xRGB 1:5:5:5
pub const DRM_FORMAT_XRGB1555: u32 = fourcc_code(b'X', b'R', b'1', b'5');
/// 24-bit RGB (8:8:8) -- packed, no padding
pub const DRM_FORMAT_RGB888: u32 = fourcc_code(b'R', b'G', b'2', b'4');
/// 24-bit BGR (8:8:8) -- packed, no padding
pub const DRM_FORMAT_BGR888: u32 = fourcc_code(b'B', b'G', b'2', b'4');
/// 32-bit XRGB (8:8:8:8) -- opaque RGB with unused alpha byte
pub const DRM_FORMAT_XRGB8888: u32 = fourcc_code(b'X', b'R', b'2', b'4');
/// 32-bit ARGB (8:8:8:8)
pub const DRM_FORMAT_ARGB8888: u32 = fourcc_code(b'A', b'R', b'2', b'4');
/// 32-bit XBGR (8:8:8:8)
pub const DRM_FORMAT_XBGR8888: u32 = fourcc_code(b'X', b'B', b'2', b'4');
/// 32-bit ABGR (8:8:8:8)
pub const DRM_FORMAT_ABGR8888: u32 = fourcc_code(b'A', b'B', b'2', b'4');
/// 32-bit xRGB 2:10:10:10
pub const DRM_FORMAT_XRGB2101010: u32 = fourcc_code(b'X', b'R', b'3', b'0');
/// YUYV packed YUV 4:2:2
pub const DRM_FORMAT_YUYV: u32 = fourcc_code(b'Y', b'U', b'Y', b'V');
/// NV12 semi-planar YUV 4:2:0
pub const DRM_FORMAT_NV12: u32 = fourcc_code(b'N', b'V', b'1', b'2');
/// NV21 semi-planar YVU 4:2:0
pub const DRM_FORMAT_NV21: u32 = fourcc_code(b'N', b'V', b'2', b'1');
/// NV16 semi-planar YUV 4:2:2
pub const DRM_FORMAT_NV16: u32 = fourcc_code(b'N', b'V', b'1', b'6');
/// Three-plane YUV 4:2:0
pub const DRM_FORMAT_YUV420: u32 = fourcc_code(b'Y', b'U', b'1', b'2');
/// Three-plane YVU 4:2:0
pub const DRM_FORMAT_YVU420: u32 = fourcc_code(b'Y', b'V', b'1', b'2');
/// Packed 10-bit YUV 4:2:0, single plane, compressed layouts only
pub const DRM_FORMAT_YUV420_10BIT: u32 = fourcc_code(b'Y', b'U', b'1', b'0');
/// Packed 10-bit YUV with X alpha, 2x2 blocks of 8 bytes
pub const DRM_FORMAT_X0L2: u32 = fourcc_code(b'X', b'0', b'L', b'2');

// ---------------------------------------------------------------------------
// Format modifiers
// ---------------------------------------------------------------------------

/// Format modifiers describe vendor-specific memory layouts.
pub mod modifiers {
    pub const DRM_FORMAT_MOD_VENDOR_NONE: u64 = 0;
    pub const DRM_FORMAT_MOD_VENDOR_INTEL: u64 = 0x01;
    pub const DRM_FORMAT_MOD_VENDOR_SAMSUNG: u64 = 0x04;
    pub const DRM_FORMAT_MOD_VENDOR_ARM: u64 = 0x08;

    /// Combine a vendor namespace and a vendor-local value.
    pub const fn fourcc_mod_code(vendor: u64, val: u64) -> u64 {
        (vendor << 56) | (val & 0x00FF_FFFF_FFFF_FFFF)
    }

    /// Vendor namespace of a modifier.
    pub const fn vendor(modifier: u64) -> u64 {
        modifier >> 56
    }

    /// Invalid modifier (unspecified layout)
    pub const DRM_FORMAT_MOD_INVALID: u64 = 0x00FF_FFFF_FFFF_FFFF;
    /// Linear (row-major, no tiling)
    pub const DRM_FORMAT_MOD_LINEAR: u64 = 0;
    /// Intel X-tiling (legacy)
    pub const I915_FORMAT_MOD_X_TILED: u64 = fourcc_mod_code(DRM_FORMAT_MOD_VENDOR_INTEL, 1);
    /// Intel Y-tiling
    pub const I915_FORMAT_MOD_Y_TILED: u64 = fourcc_mod_code(DRM_FORMAT_MOD_VENDOR_INTEL, 2);
    /// Samsung 64x32 macroblock tiling, NV12 only
    pub const DRM_FORMAT_MOD_SAMSUNG_64_32_TILE: u64 =
        fourcc_mod_code(DRM_FORMAT_MOD_VENDOR_SAMSUNG, 1);

    /// ARM framebuffer compression feature bits
    pub const AFBC_FORMAT_MOD_BLOCK_SIZE_16X16: u64 = 1;
    pub const AFBC_FORMAT_MOD_YTR: u64 = 1 << 4;
    pub const AFBC_FORMAT_MOD_SPLIT: u64 = 1 << 5;
    pub const AFBC_FORMAT_MOD_SPARSE: u64 = 1 << 6;

    /// ARM framebuffer compression modifier with the given feature bits.
    pub const fn arm_afbc(mode: u64) -> u64 {
        fourcc_mod_code(DRM_FORMAT_MOD_VENDOR_ARM, mode)
    }
}

// ---------------------------------------------------------------------------
// Format metadata
// ---------------------------------------------------------------------------

/// Per-format layout metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    /// Fourcc code
    pub format: u32,
    /// Color depth for legacy clients, 0 for formats without one
    pub depth: u8,
    /// Number of memory planes
    pub num_planes: u8,
    /// Bytes per block for each plane; 0 means the layout is opaque
    pub char_per_block: [u8; MAX_PLANES],
    /// Block width in pixels for each plane (0 reads as 1)
    pub block_w: [u8; MAX_PLANES],
    /// Block height in pixels for each plane (0 reads as 1)
    pub block_h: [u8; MAX_PLANES],
    /// Horizontal chroma subsampling of planes 1..
    pub hsub: u8,
    /// Vertical chroma subsampling of planes 1..
    pub vsub: u8,
    pub has_alpha: bool,
    pub is_yuv: bool,
}

impl FormatInfo {
    const fn packed(format: u32, depth: u8, cpp: u8, has_alpha: bool) -> Self {
        Self {
            format,
            depth,
            num_planes: 1,
            char_per_block: [cpp, 0, 0, 0],
            block_w: [1, 0, 0, 0],
            block_h: [1, 0, 0, 0],
            hsub: 1,
            vsub: 1,
            has_alpha,
            is_yuv: false,
        }
    }

    const fn yuv(format: u32, num_planes: u8, cpp: [u8; MAX_PLANES], hsub: u8, vsub: u8) -> Self {
        Self {
            format,
            depth: 0,
            num_planes,
            char_per_block: cpp,
            block_w: [1, 1, 1, 0],
            block_h: [1, 1, 1, 0],
            hsub,
            vsub,
            has_alpha: false,
            is_yuv: true,
        }
    }

    /// Number of planes as an index bound, never past [`MAX_PLANES`].
    pub fn plane_count(&self) -> usize {
        usize::from(self.num_planes).min(MAX_PLANES)
    }

    /// Horizontal subsampling applied to `plane`.
    pub fn hsub_for(&self, plane: usize) -> u32 {
        if plane == 0 {
            1
        } else {
            self.hsub.max(1) as u32
        }
    }

    /// Vertical subsampling applied to `plane`.
    pub fn vsub_for(&self, plane: usize) -> u32 {
        if plane == 0 {
            1
        } else {
            self.vsub.max(1) as u32
        }
    }

    /// Width in pixels of `plane` for a framebuffer `width` pixels wide.
    pub fn plane_width(&self, width: u32, plane: usize) -> u32 {
        width.div_ceil(self.hsub_for(plane))
    }

    /// Height in rows of `plane` for a framebuffer `height` rows tall.
    pub fn plane_height(&self, height: u32, plane: usize) -> u32 {
        height.div_ceil(self.vsub_for(plane))
    }

    pub fn block_width(&self, plane: usize) -> u32 {
        self.block_w.get(plane).map_or(1, |&w| w.max(1) as u32)
    }

    pub fn block_height(&self, plane: usize) -> u32 {
        self.block_h.get(plane).map_or(1, |&h| h.max(1) as u32)
    }

    /// Bytes per block of `plane`, 0 for opaque layouts.
    pub fn block_size(&self, plane: usize) -> u32 {
        self.char_per_block.get(plane).map_or(0, |&c| c as u32)
    }

    /// Whether `plane` has no linear byte layout of its own.
    pub fn is_opaque_block(&self, plane: usize) -> bool {
        self.block_size(plane) == 0
    }

    /// Smallest legal stride for `plane` when that plane is
    /// `plane_width` pixels wide.
    pub fn min_pitch(&self, plane: usize, plane_width: u32) -> u64 {
        if plane >= self.plane_count() {
            return 0;
        }
        let block_pixels = (self.block_width(plane) * self.block_height(plane)) as u64;
        (plane_width as u64 * self.block_size(plane) as u64).div_ceil(block_pixels)
    }
}

static CORE_FORMATS: &[FormatInfo] = &[
    FormatInfo::packed(DRM_FORMAT_C8, 8, 1, false),
    FormatInfo::packed(DRM_FORMAT_RGB565, 16, 2, false),
    FormatInfo::packed(DRM_FORMAT_XRGB1555, 15, 2, false),
    FormatInfo::packed(DRM_FORMAT_RGB888, 24, 3, false),
    FormatInfo::packed(DRM_FORMAT_BGR888, 24, 3, false),
    FormatInfo::packed(DRM_FORMAT_XRGB8888, 24, 4, false),
    FormatInfo::packed(DRM_FORMAT_ARGB8888, 32, 4, true),
    FormatInfo::packed(DRM_FORMAT_XBGR8888, 24, 4, false),
    FormatInfo::packed(DRM_FORMAT_ABGR8888, 32, 4, true),
    FormatInfo::packed(DRM_FORMAT_XRGB2101010, 30, 4, false),
    FormatInfo::yuv(DRM_FORMAT_YUYV, 1, [2, 0, 0, 0], 2, 1),
    FormatInfo::yuv(DRM_FORMAT_NV12, 2, [1, 2, 0, 0], 2, 2),
    FormatInfo::yuv(DRM_FORMAT_NV21, 2, [1, 2, 0, 0], 2, 2),
    FormatInfo::yuv(DRM_FORMAT_NV16, 2, [1, 2, 0, 0], 2, 1),
    FormatInfo::yuv(DRM_FORMAT_YUV420, 3, [1, 1, 1, 0], 2, 2),
    FormatInfo::yuv(DRM_FORMAT_YVU420, 3, [1, 1, 1, 0], 2, 2),
    FormatInfo::yuv(DRM_FORMAT_YUV420_10BIT, 1, [0, 0, 0, 0], 2, 2),
    FormatInfo {
        format: DRM_FORMAT_X0L2,
        depth: 0,
        num_planes: 1,
        char_per_block: [8, 0, 0, 0],
        block_w: [2, 0, 0, 0],
        block_h: [2, 0, 0, 0],
        hsub: 2,
        vsub: 2,
        has_alpha: true,
        is_yuv: true,
    },
];

/// Resolves a fourcc code to its layout metadata.
pub trait FormatInfoProvider: Send + Sync {
    /// Metadata for `format`, or `None` when the code is unknown.
    fn format_info(&self, format: u32) -> Option<&'static FormatInfo>;
}

/// The core format table shared by every device.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreFormats;

impl CoreFormats {
    /// All formats in the core table.
    pub fn all() -> &'static [FormatInfo] {
        CORE_FORMATS
    }
}

impl FormatInfoProvider for CoreFormats {
    fn format_info(&self, format: u32) -> Option<&'static FormatInfo> {
        if format == 0 {
            return None;
        }
        CORE_FORMATS.iter().find(|info| info.format == format)
    }
}

/// Printable form of a fourcc code, e.g. `AB24 (0x34324241)`.
pub struct FourccName(pub u32);

impl fmt::Display for FourccName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.to_le_bytes() {
            let c = if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '?'
            };
            write!(f, "{}", c)?;
        }
        write!(f, " (0x{:08x})", self.0)
    }
}
